//! A streaming encoder for the binary [Ion 1.0](https://amazon-ion.github.io/ion-docs/) format.
//!
//! [RawBinaryWriter] encodes values whose symbols are already symbol IDs.
//! [ManagedBinaryWriter] accepts symbol text, maintains the local symbol table the text maps to,
//! and emits that table ahead of the values that need it.
//!
//! ```
//! use ion_binary_writer::{IonType, IonWriter, ManagedBinaryWriterBuilder};
//! # fn main() -> ion_binary_writer::IonResult<()> {
//! let mut writer = ManagedBinaryWriterBuilder::new().build(Vec::new())?;
//! writer.step_in(IonType::Struct)?;
//! writer.set_field_name("greeting")?;
//! writer.write_string("hello")?;
//! writer.step_out()?;
//! writer.finish()?;
//! assert!(writer.output().map(|bytes| !bytes.is_empty()).unwrap_or(false));
//! # Ok(())
//! # }
//! ```

pub mod result;

pub mod binary;
pub mod catalog;
pub mod constants;
pub mod raw_symbol_token_ref;
pub mod shared_symbol_table;
pub mod symbol_table;
pub mod symbol_token;
pub mod types;
mod writer;

pub use binary::{
    AllocatorMode, ManagedBinaryWriter, ManagedBinaryWriterBuilder, PreallocationMode,
    RawBinaryWriter, RawBinaryWriterBuilder, StreamCloseMode, StreamFlushMode,
};
pub use catalog::{Catalog, EmptyCatalog, MapCatalog};
pub use raw_symbol_token_ref::{AsRawSymbolTokenRef, RawSymbolTokenRef};
pub use result::{IonError, IonResult};
pub use shared_symbol_table::SharedSymbolTable;
pub use symbol_table::{LocalSymbolTable, SymbolTableView};
pub use symbol_token::SymbolToken;
pub use types::{Decimal, Int, IonType, SymbolId, Timestamp, UInt};
pub use writer::IonWriter;
