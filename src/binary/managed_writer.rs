use std::io::{self, Write};
use std::sync::Arc;

use delegate::delegate;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::binary::binary_writer::ManagedBinaryWriterBuilder;
use crate::binary::imported_symbols::{ImportedSymbolContext, ImportedSymbolResolverMode};
use crate::binary::raw_binary_writer::{
    RawBinaryWriter, RawBinaryWriterBuilder, StreamCloseMode, StreamFlushMode,
};
use crate::binary::user_symbol_table::{
    CapturedSymbolTable, UserState, UserSymbolTableInterceptor, WriterContext,
};
use crate::catalog::Catalog;
use crate::constants::v1_0::{system_symbol_ids, ION_1_0_MAX_ID};
use crate::raw_symbol_token_ref::{AsRawSymbolTokenRef, RawSymbolTokenRef};
use crate::result::{encoding_error_raw, illegal_operation, illegal_operation_raw, IonResult};
use crate::symbol_table::SymbolTableView;
use crate::symbol_token::{symbol, SymbolToken};
use crate::types::{Decimal, Int, IonType, SymbolId, Timestamp};
use crate::writer::IonWriter;

/// How much of the current local symbol table has been written to the symbols writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolState {
    /// Nothing has been emitted for the current context, not even an IVM.
    SystemSymbols,
    /// An IVM has been emitted, but no local symbol table has followed it.
    IvmOnly,
    /// The symbol table struct is open and its imports (if any) have been written.
    LocalSymbolsWithImportsOnly,
    /// The symbol table struct and its `symbols` list are both open.
    LocalSymbols,
    /// A local symbol table was emitted and closed. New symbols need an append (or a full
    /// re-declaration).
    LocalSymbolsFlushed,
}

impl SymbolState {
    fn close_table<S: Write>(self, symbols: &mut RawBinaryWriter<S>) -> IonResult<()> {
        match self {
            // No table was ever needed, but the stream still has to start with an IVM.
            SymbolState::SystemSymbols => symbols.write_ion_version_marker(1, 0),
            SymbolState::LocalSymbolsWithImportsOnly => symbols.step_out(),
            SymbolState::LocalSymbols => {
                symbols.step_out()?;
                symbols.step_out()
            }
            SymbolState::IvmOnly | SymbolState::LocalSymbolsFlushed => Ok(()),
        }
    }

    fn is_table_open(self) -> bool {
        matches!(
            self,
            SymbolState::LocalSymbolsWithImportsOnly | SymbolState::LocalSymbols
        )
    }

    // The state once `close_table` has been applied and the output drained.
    fn after_close(self) -> SymbolState {
        match self {
            SymbolState::SystemSymbols | SymbolState::IvmOnly => SymbolState::IvmOnly,
            _ => SymbolState::LocalSymbolsFlushed,
        }
    }
}

/// A binary Ion writer that manages its own local symbol table.
///
/// Field names, annotations and symbol values may be given as text. Text that the system table
/// or one of the configured imports already defines is written using that symbol ID; anything
/// else is assigned the next local symbol ID and added to a local symbol table that is emitted
/// ahead of the values that use it.
///
/// The symbol table and the values are encoded by two separate [RawBinaryWriter]s and are only
/// stitched together, symbol table first, when the writer is flushed.
///
/// Local symbol tables written through this writer as ordinary values are intercepted and
/// re-declared as if each of their symbols had been interned directly.
pub struct ManagedBinaryWriter<W: Write> {
    catalog: Arc<dyn Catalog>,
    // The imports each new context starts with.
    bootstrap_imports: Arc<ImportedSymbolContext>,
    imports: Arc<ImportedSymbolContext>,
    // Local symbol text in symbol ID order, starting at `imports.local_sid_start()`.
    locals: Vec<Arc<str>>,
    local_ids: FxHashMap<Arc<str>, SymbolId>,
    locals_locked: bool,
    // Only ever drained into the user writer's sink.
    symbols: RawBinaryWriter<io::Sink>,
    user: RawBinaryWriter<W>,
    symbol_state: SymbolState,
    interceptor: UserSymbolTableInterceptor,
    is_local_symbol_table_append_enabled: bool,
    is_stream_copy_optimized: bool,
    // Set when an IVM was requested before any values, so that one is still emitted.
    force_system_output: bool,
    closed: bool,
}

impl<W: Write> ManagedBinaryWriter<W> {
    pub(crate) fn new(builder: ManagedBinaryWriterBuilder, out: W) -> IonResult<Self> {
        let symbols = RawBinaryWriterBuilder::new()
            .with_block_size(builder.symbols_block_size)
            .with_block_allocator_provider(Arc::clone(&builder.allocator_provider))
            .with_preallocation_mode(builder.preallocation_mode)
            .with_float_binary32_enabled(builder.is_float_binary32_enabled)
            .with_stream_flush_mode(StreamFlushMode::NoFlush)
            .with_stream_close_mode(StreamCloseMode::NoClose)
            .build(io::sink())?;
        let user = RawBinaryWriterBuilder::new()
            .with_block_size(builder.user_block_size)
            .with_block_allocator_provider(Arc::clone(&builder.allocator_provider))
            .with_preallocation_mode(builder.preallocation_mode)
            .with_float_binary32_enabled(builder.is_float_binary32_enabled)
            .with_stream_flush_mode(builder.stream_flush_mode)
            .with_stream_close_mode(builder.stream_close_mode)
            .build(out)?;

        let mut writer = ManagedBinaryWriter {
            catalog: builder.catalog,
            bootstrap_imports: Arc::clone(&builder.imports),
            imports: builder.imports,
            locals: Vec::new(),
            local_ids: FxHashMap::default(),
            locals_locked: false,
            symbols,
            user,
            symbol_state: SymbolState::SystemSymbols,
            interceptor: UserSymbolTableInterceptor::new(),
            is_local_symbol_table_append_enabled: builder.is_local_symbol_table_append_enabled,
            is_stream_copy_optimized: builder.is_stream_copy_optimized,
            force_system_output: false,
            closed: false,
        };

        if let Some(initial) = builder.initial_symbol_table {
            writer.imports = Arc::new(ImportedSymbolContext::new(
                ImportedSymbolResolverMode::Delegate,
                initial.imports(),
            ));
            for text in initial.symbols() {
                writer.intern(text)?;
            }
            // The seeded table is emitted even if it turns out to be empty.
            writer.declare_imports()?;
        }
        Ok(writer)
    }

    fn user_context(&self) -> WriterContext {
        WriterContext {
            depth: self.user.depth(),
            field_id: self.user.field_id(),
            position: self.user.position(),
            has_top_level_symbol_table_annotation: self
                .user
                .has_top_level_symbol_table_annotation(),
        }
    }

    fn is_intercepting(&self) -> bool {
        self.interceptor.state() != UserState::Normal
    }

    // Opens a new local symbol table struct in the symbols writer, declaring the current imports
    // and any locals that already exist.
    fn open_local_symbol_table(&mut self) -> IonResult<()> {
        self.symbols
            .add_annotation(system_symbol_ids::ION_SYMBOL_TABLE)?;
        self.symbols.step_in(IonType::Struct)?;
        if !self.imports.imports().is_empty() {
            self.symbols.set_field_name(system_symbol_ids::IMPORTS)?;
            self.symbols.step_in(IonType::List)?;
            for table in self.imports.imports() {
                self.symbols.step_in(IonType::Struct)?;
                self.symbols.set_field_name(system_symbol_ids::NAME)?;
                self.symbols.write_string(table.name())?;
                self.symbols.set_field_name(system_symbol_ids::VERSION)?;
                self.symbols.write_i64(table.version() as i64)?;
                self.symbols.set_field_name(system_symbol_ids::MAX_ID)?;
                self.symbols.write_i64(table.max_id() as i64)?;
                self.symbols.step_out()?;
            }
            self.symbols.step_out()?;
        }
        self.symbol_state = SymbolState::LocalSymbolsWithImportsOnly;
        if !self.locals.is_empty() {
            self.open_symbol_list()?;
            for text in &self.locals {
                self.symbols.write_string(text)?;
            }
        }
        log::debug!(
            "opened local symbol table with {} imports and {} existing symbols",
            self.imports.imports().len(),
            self.locals.len()
        );
        Ok(())
    }

    // Opens a symbol table that extends the one already in effect.
    fn open_local_symbol_table_append(&mut self) -> IonResult<()> {
        self.symbols
            .add_annotation(system_symbol_ids::ION_SYMBOL_TABLE)?;
        self.symbols.step_in(IonType::Struct)?;
        self.symbols.set_field_name(system_symbol_ids::IMPORTS)?;
        self.symbols
            .write_symbol(system_symbol_ids::ION_SYMBOL_TABLE)?;
        self.symbol_state = SymbolState::LocalSymbolsWithImportsOnly;
        log::debug!("opened local symbol table append");
        Ok(())
    }

    fn open_symbol_list(&mut self) -> IonResult<()> {
        self.symbols.set_field_name(system_symbol_ids::SYMBOLS)?;
        self.symbols.step_in(IonType::List)?;
        self.symbol_state = SymbolState::LocalSymbols;
        Ok(())
    }

    // Makes sure the current imports are declared in the output, starting a local symbol table
    // (and, for a fresh context, an IVM) if needed.
    fn declare_imports(&mut self) -> IonResult<()> {
        match self.symbol_state {
            SymbolState::SystemSymbols => {
                self.symbols.write_ion_version_marker(1, 0)?;
                self.open_local_symbol_table()
            }
            SymbolState::IvmOnly => self.open_local_symbol_table(),
            _ => Ok(()),
        }
    }

    // Makes sure a `symbols` list is open in the symbols writer so a new local can be added.
    fn prepare_symbol_list(&mut self) -> IonResult<()> {
        match self.symbol_state {
            SymbolState::SystemSymbols | SymbolState::IvmOnly => self.declare_imports()?,
            SymbolState::LocalSymbolsFlushed if self.is_local_symbol_table_append_enabled => {
                self.open_local_symbol_table_append()?
            }
            // Without appends, the whole table (including every existing local) is re-declared.
            SymbolState::LocalSymbolsFlushed => self.open_local_symbol_table()?,
            SymbolState::LocalSymbolsWithImportsOnly | SymbolState::LocalSymbols => {}
        }
        if self.symbol_state == SymbolState::LocalSymbolsWithImportsOnly {
            self.open_symbol_list()?;
        }
        Ok(())
    }

    /// Resolves `text` to a symbol ID, adding it to the local symbol table if neither the system
    /// table, the imports, nor the existing locals define it.
    ///
    /// Returns an error if `text` is empty, or if it is new and the local symbol table has been
    /// [locked](Self::lock_local_symbols).
    pub fn intern(&mut self, text: &str) -> IonResult<SymbolToken> {
        if text.is_empty() {
            return illegal_operation("symbols must have text of at least one character");
        }
        if let Some(sid) = self.imports.sid_for(text) {
            if sid > ION_1_0_MAX_ID {
                // Using an imported symbol requires the imports to be declared.
                self.declare_imports()?;
            }
            return symbol(text, sid);
        }
        if let Some(sid) = self.local_ids.get(text) {
            return symbol(text, *sid);
        }
        if self.locals_locked {
            return illegal_operation(format!(
                "cannot add '{text}' to a locked (read-only) local symbol table"
            ));
        }
        self.prepare_symbol_list()?;
        self.symbols.write_string(text)?;
        let sid = self.imports.local_sid_start() + self.locals.len();
        let text: Arc<str> = Arc::from(text);
        self.locals.push(Arc::clone(&text));
        self.local_ids.insert(Arc::clone(&text), sid);
        log::trace!("interned local symbol '{text}' as ${sid}");
        Ok(SymbolToken::new(Some(text), Some(sid)))
    }

    fn resolve<A: AsRawSymbolTokenRef>(&mut self, token: A) -> IonResult<SymbolId> {
        match token.as_raw_symbol_token_ref() {
            RawSymbolTokenRef::Text(text) => self
                .intern(text.as_ref())?
                .local_sid()
                .ok_or_else(|| illegal_operation_raw("interned symbol has no symbol ID")),
            RawSymbolTokenRef::SymbolId(sid) => {
                let max_id = self.imports.imported_max_id() + self.locals.len();
                if sid > max_id {
                    return illegal_operation(format!(
                        "symbol ID ${sid} is undefined; the current symbol table ends at ${max_id}"
                    ));
                }
                if sid > ION_1_0_MAX_ID && sid <= self.imports.imported_max_id() {
                    self.declare_imports()?;
                }
                Ok(sid)
            }
        }
    }

    /// Returns a snapshot of the symbol table that values are currently being encoded against.
    pub fn symbol_table(&self) -> SymbolTableView {
        SymbolTableView::new(
            self.imports.imports().to_vec(),
            self.locals.clone(),
            self.locals_locked,
        )
    }

    /// Prevents any further symbols from being added to the current local symbol table. The lock
    /// is released when the writer is [finished](IonWriter::finish).
    pub fn lock_local_symbols(&mut self) {
        self.locals_locked = true;
    }

    pub fn is_local_symbol_table_locked(&self) -> bool {
        self.locals_locked
    }

    /// Writes an already-encoded value verbatim. The bytes must be a single, complete value whose
    /// symbol IDs are valid in the current symbol table.
    ///
    /// Requires the writer to have been built with stream copy optimization enabled.
    pub fn write_raw_value_bytes(&mut self, bytes: &[u8]) -> IonResult<()> {
        if !self.is_stream_copy_optimized {
            return illegal_operation("writing raw value bytes requires stream copy optimization");
        }
        // Without knowing which symbols the bytes use, the whole context has to be declared.
        self.declare_imports()?;
        self.user.write_bytes(bytes)
    }

    /// Flushes any buffered data and releases every resource the writer holds. Calling `close()`
    /// more than once has no further effect.
    pub fn close(&mut self) -> IonResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = match self.finish() {
            Err(e) if e.is_illegal_operation() => Ok(()),
            other => other,
        };
        let symbols_closed = self.symbols.close();
        let user_closed = self.user.close();
        log::debug!("closed managed binary writer");
        result.and(symbols_closed).and(user_closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // Emits everything written so far without resetting the symbol context.
    fn flush_symbols_and_values(&mut self) -> IonResult<()> {
        if self.user.has_written_values_since_finished()
            || self.force_system_output
            || self.symbol_state.is_table_open()
        {
            self.symbol_state.close_table(&mut self.symbols)?;
            self.symbol_state = self.symbol_state.after_close();
        }
        self.force_system_output = false;
        let out = self
            .user
            .output_mut()
            .ok_or_else(|| illegal_operation_raw("the writer's output has already been closed"))?;
        self.symbols.finish_to(out)?;
        self.user.finish()
    }

    fn apply_user_symbol_table(&mut self, captured: CapturedSymbolTable) -> IonResult<()> {
        // The user's encoding of the table is replaced by our own.
        self.user.truncate(captured.position)?;
        if captured.is_append {
            log::debug!(
                "appending {} user-declared symbols to the current context",
                captured.symbols.len()
            );
        } else {
            log::debug!(
                "replacing the symbol context with a user-declared table ({} imports, {} symbols)",
                captured.imports.len(),
                captured.symbols.len()
            );
            self.finish()?;
            self.imports = Arc::new(ImportedSymbolContext::new(
                ImportedSymbolResolverMode::Delegate,
                &captured.imports,
            ));
            self.declare_imports()?;
        }
        for text in &captured.symbols {
            self.intern(text)?;
        }
        Ok(())
    }
}

impl<W: Write> IonWriter for ManagedBinaryWriter<W> {
    type Output = W;

    fn ion_version(&self) -> (u8, u8) {
        (1, 0)
    }

    /// An explicit IVM ends the current stream segment, resetting the symbol context.
    fn write_ion_version_marker(&mut self, major: u8, minor: u8) -> IonResult<()> {
        if (major, minor) != (1, 0) {
            return illegal_operation("Only Ion 1.0 is supported.");
        }
        self.finish()
    }

    fn supports_text_symbol_tokens(&self) -> bool {
        true
    }

    fn set_annotations<I, A>(&mut self, annotations: I) -> IonResult<()>
    where
        A: AsRawSymbolTokenRef,
        I: IntoIterator<Item = A>,
    {
        let mut sids: SmallVec<[SymbolId; 4]> = SmallVec::new();
        for annotation in annotations {
            sids.push(self.resolve(annotation)?);
        }
        self.user.set_annotations(sids)
    }

    fn add_annotation<A: AsRawSymbolTokenRef>(&mut self, annotation: A) -> IonResult<()> {
        let sid = self.resolve(annotation)?;
        self.user.add_annotation(sid)
    }

    fn write_i64(&mut self, value: i64) -> IonResult<()> {
        if self.is_intercepting() {
            let context = self.user_context();
            self.interceptor.on_int(context, &Int::from(value))?;
        }
        self.user.write_i64(value)
    }

    fn write_int(&mut self, value: &Int) -> IonResult<()> {
        if self.is_intercepting() {
            let context = self.user_context();
            self.interceptor.on_int(context, value)?;
        }
        self.user.write_int(value)
    }

    /// Writes a symbol value. The symbol `$ion_1_0` at the top level is not written as a value:
    /// it ends the current stream segment like [write_ion_version_marker](Self::write_ion_version_marker),
    /// or, before any values have been written, makes sure the segment still produces an IVM.
    fn write_symbol<A: AsRawSymbolTokenRef>(&mut self, value: A) -> IonResult<()> {
        let sid = self.resolve(value)?;
        if sid == system_symbol_ids::ION_1_0 && self.user.depth() == 0 && !self.user.has_annotations()
        {
            if self.user.has_written_values_since_finished() {
                return self.finish();
            }
            self.force_system_output = true;
            return Ok(());
        }
        if self.is_intercepting() {
            let context = self.user_context();
            self.interceptor.on_symbol(context, sid);
        }
        self.user.write_symbol(sid)
    }

    fn write_string<A: AsRef<str>>(&mut self, value: A) -> IonResult<()> {
        if self.is_intercepting() {
            let context = self.user_context();
            self.interceptor.on_string(context, value.as_ref())?;
        }
        self.user.write_string(value)
    }

    fn write_string_utf16(&mut self, value: &[u16]) -> IonResult<()> {
        if self.is_intercepting() {
            let text = String::from_utf16(value)
                .map_err(|_| encoding_error_raw("string contains an unpaired surrogate"))?;
            let context = self.user_context();
            self.interceptor.on_string(context, &text)?;
        }
        self.user.write_string_utf16(value)
    }

    fn step_in(&mut self, container_type: IonType) -> IonResult<()> {
        let context = self.user_context();
        self.interceptor.before_step_in(context, container_type)?;
        self.user.step_in(container_type)
    }

    fn set_field_name<A: AsRawSymbolTokenRef>(&mut self, name: A) -> IonResult<()> {
        if !self.user.is_in_struct() {
            return illegal_operation("cannot set a field name outside of a struct");
        }
        let sid = self.resolve(name)?;
        self.user.set_field_name(sid)
    }

    fn step_out(&mut self) -> IonResult<()> {
        self.user.step_out()?;
        let captured = self
            .interceptor
            .after_step_out(self.user.depth(), self.catalog.as_ref())?;
        if let Some(captured) = captured {
            self.apply_user_symbol_table(captured)?;
        }
        Ok(())
    }

    /// Writes all completed top-level values (and the symbol table entries they need) to the
    /// output. Has no effect below the top level. The symbol context is kept, so later values can
    /// keep using the same symbol IDs.
    fn flush(&mut self) -> IonResult<()> {
        if self.user.depth() != 0 {
            return Ok(());
        }
        self.flush_symbols_and_values()
    }

    /// Writes all buffered values to the output and resets the symbol context: the next value
    /// begins a new stream segment with its own IVM and local symbol table.
    fn finish(&mut self) -> IonResult<()> {
        if self.user.depth() != 0 {
            return illegal_operation("finish() can only be called at the top level");
        }
        self.flush_symbols_and_values()?;
        self.locals.clear();
        self.local_ids.clear();
        self.locals_locked = false;
        self.symbol_state = SymbolState::SystemSymbols;
        self.imports = Arc::clone(&self.bootstrap_imports);
        log::debug!("finished stream segment");
        Ok(())
    }

    delegate! {
        to self.user {
            fn has_annotations(&self) -> bool;
            fn write_null(&mut self, ion_type: IonType) -> IonResult<()>;
            fn write_bool(&mut self, value: bool) -> IonResult<()>;
            fn write_f32(&mut self, value: f32) -> IonResult<()>;
            fn write_f64(&mut self, value: f64) -> IonResult<()>;
            fn write_decimal(&mut self, value: &Decimal) -> IonResult<()>;
            fn write_timestamp(&mut self, value: &Timestamp) -> IonResult<()>;
            fn write_clob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()>;
            fn write_blob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()>;
            fn is_field_name_set(&self) -> bool;
            fn parent_type(&self) -> Option<IonType>;
            fn depth(&self) -> usize;
            fn output(&self) -> Option<&W>;
            fn output_mut(&mut self) -> Option<&mut W>;
        }
    }
}
