use std::io::Write;
use std::sync::Arc;

use crate::binary::block::{
    pooled_block_allocator_provider, BasicBlockAllocatorProvider, BlockAllocatorProvider,
};
use crate::binary::imported_symbols::{ImportedSymbolContext, ImportedSymbolResolverMode};
use crate::binary::managed_writer::ManagedBinaryWriter;
use crate::binary::raw_binary_writer::{
    PreallocationMode, StreamCloseMode, StreamFlushMode, DEFAULT_BLOCK_SIZE,
};
use crate::catalog::{Catalog, EmptyCatalog};
use crate::result::{illegal_operation, IonResult};
use crate::shared_symbol_table::SharedSymbolTable;
use crate::symbol_table::LocalSymbolTable;

/// Where a writer's buffer blocks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorMode {
    /// Blocks are recycled through a process-wide pool shared by every writer with the same
    /// block size.
    #[default]
    Pooled,
    /// Every block is a fresh allocation that is freed when the writer releases it.
    Basic,
}

/// Configures and builds [ManagedBinaryWriter]s. A builder can be cloned and reused; every
/// writer it builds starts from the same configuration.
///
/// ```
/// use ion_binary_writer::{IonWriter, ManagedBinaryWriterBuilder};
/// # fn main() -> ion_binary_writer::IonResult<()> {
/// let mut writer = ManagedBinaryWriterBuilder::new()
///     .with_local_symbol_table_append_enabled()
///     .build(Vec::new())?;
/// writer.write_symbol("hello")?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ManagedBinaryWriterBuilder {
    pub(crate) symbols_block_size: usize,
    pub(crate) user_block_size: usize,
    pub(crate) allocator_provider: Arc<dyn BlockAllocatorProvider>,
    pub(crate) preallocation_mode: PreallocationMode,
    pub(crate) imports: Arc<ImportedSymbolContext>,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) initial_symbol_table: Option<LocalSymbolTable>,
    pub(crate) is_float_binary32_enabled: bool,
    pub(crate) is_local_symbol_table_append_enabled: bool,
    pub(crate) is_stream_copy_optimized: bool,
    pub(crate) stream_flush_mode: StreamFlushMode,
    pub(crate) stream_close_mode: StreamCloseMode,
}

impl ManagedBinaryWriterBuilder {
    pub fn new() -> Self {
        ManagedBinaryWriterBuilder {
            symbols_block_size: DEFAULT_BLOCK_SIZE,
            user_block_size: DEFAULT_BLOCK_SIZE,
            allocator_provider: pooled_block_allocator_provider(),
            preallocation_mode: PreallocationMode::default(),
            imports: ImportedSymbolContext::system_only(),
            catalog: Arc::new(EmptyCatalog {}),
            initial_symbol_table: None,
            is_float_binary32_enabled: false,
            is_local_symbol_table_append_enabled: false,
            is_stream_copy_optimized: false,
            stream_flush_mode: StreamFlushMode::Flush,
            stream_close_mode: StreamCloseMode::NoClose,
        }
    }

    /// Sets the block size of the buffer that holds local symbol table declarations.
    pub fn with_symbols_block_size(mut self, block_size: usize) -> Self {
        self.symbols_block_size = block_size;
        self
    }

    /// Sets the block size of the buffer that holds values.
    pub fn with_user_block_size(mut self, block_size: usize) -> Self {
        self.user_block_size = block_size;
        self
    }

    pub fn with_allocator_mode(mut self, mode: AllocatorMode) -> Self {
        self.allocator_provider = match mode {
            AllocatorMode::Pooled => pooled_block_allocator_provider(),
            AllocatorMode::Basic => Arc::new(BasicBlockAllocatorProvider),
        };
        self
    }

    pub fn with_block_allocator_provider(
        mut self,
        provider: Arc<dyn BlockAllocatorProvider>,
    ) -> Self {
        self.allocator_provider = provider;
        self
    }

    pub fn with_preallocation_mode(mut self, mode: PreallocationMode) -> Self {
        self.preallocation_mode = mode;
        self
    }

    /// Reserves `pad` bytes (0, 1 or 2) for the length of each container.
    pub fn with_padded_length_preallocation(mut self, pad: usize) -> IonResult<Self> {
        self.preallocation_mode = PreallocationMode::with_pad_size(pad)?;
        Ok(self)
    }

    /// Declares `imports` in every stream segment. Lookups consult each table in turn.
    pub fn with_imports(mut self, imports: &[Arc<SharedSymbolTable>]) -> Self {
        self.imports = Arc::new(ImportedSymbolContext::new(
            ImportedSymbolResolverMode::Delegate,
            imports,
        ));
        self
    }

    /// Like [with_imports](Self::with_imports), but resolves imported symbols through a single
    /// precomputed map. Worth it when many writers are built from this builder.
    pub fn with_flat_imports(mut self, imports: &[Arc<SharedSymbolTable>]) -> Self {
        self.imports = Arc::new(ImportedSymbolContext::new(
            ImportedSymbolResolverMode::Flat,
            imports,
        ));
        self
    }

    pub fn with_imported_symbol_context(mut self, imports: Arc<ImportedSymbolContext>) -> Self {
        self.imports = imports;
        self
    }

    /// The catalog consulted when a local symbol table written as a value imports shared tables.
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Emits `table` at the start of the output and interns its symbols before anything else is
    /// written. Only applies to the first stream segment.
    pub fn with_initial_symbol_table(mut self, table: LocalSymbolTable) -> Self {
        self.initial_symbol_table = Some(table);
        self
    }

    /// Writes `f64` values that survive a round trip through `f32` as 4-byte floats.
    pub fn with_float_binary32_enabled(mut self) -> Self {
        self.is_float_binary32_enabled = true;
        self
    }

    pub fn with_float_binary32_disabled(mut self) -> Self {
        self.is_float_binary32_enabled = false;
        self
    }

    /// Symbols added after a flush extend the previous local symbol table instead of
    /// re-declaring it.
    pub fn with_local_symbol_table_append_enabled(mut self) -> Self {
        self.is_local_symbol_table_append_enabled = true;
        self
    }

    pub fn with_local_symbol_table_append_disabled(mut self) -> Self {
        self.is_local_symbol_table_append_enabled = false;
        self
    }

    /// Allows pre-encoded values to be written with
    /// [write_raw_value_bytes](ManagedBinaryWriter::write_raw_value_bytes).
    pub fn with_stream_copy_optimization(mut self, enabled: bool) -> Self {
        self.is_stream_copy_optimized = enabled;
        self
    }

    pub fn with_stream_flush_mode(mut self, mode: StreamFlushMode) -> Self {
        self.stream_flush_mode = mode;
        self
    }

    pub fn with_stream_close_mode(mut self, mode: StreamCloseMode) -> Self {
        self.stream_close_mode = mode;
        self
    }

    pub fn build<W: Write>(self, out: W) -> IonResult<ManagedBinaryWriter<W>> {
        if self.symbols_block_size == 0 || self.user_block_size == 0 {
            return illegal_operation("block sizes must be at least 1 byte");
        }
        if let Some(table) = &self.initial_symbol_table {
            if let Some(substitute) = table.imports().iter().find(|t| t.is_substitute()) {
                return illegal_operation(format!(
                    "the initial symbol table imports a substitute for '{}' version {}",
                    substitute.name(),
                    substitute.version()
                ));
            }
        }
        ManagedBinaryWriter::new(self, out)
    }
}

impl Default for ManagedBinaryWriterBuilder {
    fn default() -> Self {
        ManagedBinaryWriterBuilder::new()
    }
}
