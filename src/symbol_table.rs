use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::constants::v1_0;
use crate::shared_symbol_table::SharedSymbolTable;
use crate::types::SymbolId;

/// The immutable system symbol table defined by Ion 1.0.
#[derive(Debug, Copy, Clone)]
pub struct SystemSymbolTable {
    symbols_by_id: &'static [&'static str],
    symbols_by_text: &'static phf::Map<&'static str, usize>,
}

impl SystemSymbolTable {
    pub const fn name(&self) -> &'static str {
        v1_0::SYSTEM_TABLE_NAME
    }

    pub const fn version(&self) -> usize {
        1
    }

    pub const fn max_id(&self) -> usize {
        self.symbols_by_id.len()
    }

    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        self.symbols_by_text.get(text).copied()
    }

    pub fn text_for(&self, sid: SymbolId) -> Option<&'static str> {
        sid.checked_sub(1)
            .and_then(|index| self.symbols_by_id.get(index))
            .copied()
    }
}

pub static SYSTEM_SYMBOLS_1_0: &SystemSymbolTable = &SystemSymbolTable {
    symbols_by_id: v1_0::SYSTEM_SYMBOLS,
    symbols_by_text: &v1_0::SYSTEM_SYMBOL_TEXT_TO_ID,
};

/// A local symbol table described as a value: the shared tables it imports followed by the
/// symbols it declares. Used to seed a writer with an initial context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSymbolTable {
    imports: Vec<Arc<SharedSymbolTable>>,
    symbols: Vec<String>,
}

impl LocalSymbolTable {
    pub fn new<I, S>(imports: I, symbols: S) -> Self
    where
        I: IntoIterator<Item = Arc<SharedSymbolTable>>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            imports: imports.into_iter().collect(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn imports(&self) -> &[Arc<SharedSymbolTable>] {
        &self.imports
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

/// A point-in-time view of the symbol table a writer is encoding against. When no imports or
/// local symbols are in effect the view is just the system table.
#[derive(Debug, Clone)]
pub struct SymbolTableView {
    imports: Vec<Arc<SharedSymbolTable>>,
    imported_max_id: usize,
    locals: Vec<Arc<str>>,
    local_ids_by_text: FxHashMap<Arc<str>, SymbolId>,
    is_read_only: bool,
}

impl SymbolTableView {
    pub(crate) fn new(
        imports: Vec<Arc<SharedSymbolTable>>,
        locals: Vec<Arc<str>>,
        is_read_only: bool,
    ) -> Self {
        let imported_max_id =
            v1_0::ION_1_0_MAX_ID + imports.iter().map(|t| t.max_id()).sum::<usize>();
        let mut local_ids_by_text = FxHashMap::default();
        for (index, text) in locals.iter().enumerate() {
            local_ids_by_text
                .entry(Arc::clone(text))
                .or_insert(imported_max_id + 1 + index);
        }
        Self {
            imports,
            imported_max_id,
            locals,
            local_ids_by_text,
            is_read_only,
        }
    }

    /// Returns `true` if this view has neither imports nor local symbols.
    pub fn is_system_table(&self) -> bool {
        self.imports.is_empty() && self.locals.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    pub fn imports(&self) -> &[Arc<SharedSymbolTable>] {
        &self.imports
    }

    /// The largest symbol ID provided by the system table and the imports combined.
    pub fn imported_max_id(&self) -> SymbolId {
        self.imported_max_id
    }

    pub fn max_id(&self) -> SymbolId {
        self.imported_max_id + self.locals.len()
    }

    /// Resolves `text` to the lowest symbol ID that has it: system symbols, then each import in
    /// order, then local symbols.
    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        if let Some(sid) = SYSTEM_SYMBOLS_1_0.sid_for(text) {
            return Some(sid);
        }
        let mut offset = v1_0::ION_1_0_MAX_ID;
        for table in &self.imports {
            if let Some(local_sid) = table.local_sid_for(text) {
                return Some(offset + local_sid);
            }
            offset += table.max_id();
        }
        self.local_ids_by_text.get(text).copied()
    }

    pub fn text_for(&self, sid: SymbolId) -> Option<&str> {
        if sid <= v1_0::ION_1_0_MAX_ID {
            return SYSTEM_SYMBOLS_1_0.text_for(sid);
        }
        if sid > self.imported_max_id {
            return self
                .locals
                .get(sid - self.imported_max_id - 1)
                .map(|text| text.as_ref());
        }
        let mut offset = v1_0::ION_1_0_MAX_ID;
        for table in &self.imports {
            if sid <= offset + table.max_id() {
                return table.text_for(sid - offset);
            }
            offset += table.max_id();
        }
        None
    }
}
