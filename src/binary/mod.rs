// Copyright Amazon.com, Inc. or its affiliates.

//! This module provides the structures and logic needed to write values to a binary Ion
//! data stream.

pub mod block;
pub mod constants;
pub mod write_buffer;

pub mod binary_writer;
pub mod imported_symbols;
pub mod managed_writer;
pub mod raw_binary_writer;
pub(crate) mod type_code;
mod user_symbol_table;
pub mod var_uint;

pub use binary_writer::{AllocatorMode, ManagedBinaryWriterBuilder};
pub use block::{
    BasicBlockAllocator, BasicBlockAllocatorProvider, Block, BlockAllocator,
    BlockAllocatorProvider, PooledBlockAllocator, PooledBlockAllocatorProvider,
};
pub use imported_symbols::{ImportedSymbolContext, ImportedSymbolResolverMode};
pub use managed_writer::ManagedBinaryWriter;
pub use raw_binary_writer::{
    PreallocationMode, RawBinaryWriter, RawBinaryWriterBuilder, StreamCloseMode,
    StreamFlushMode,
};
pub use type_code::IonTypeCode;
pub use write_buffer::WriteBuffer;
