use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashMap;

use crate::constants::v1_0;
use crate::shared_symbol_table::SharedSymbolTable;
use crate::symbol_table::SYSTEM_SYMBOLS_1_0;
use crate::types::SymbolId;

/// How an [ImportedSymbolContext] resolves text to the symbol IDs its imports provide. Both
/// strategies always agree; they differ only in where the cost is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportedSymbolResolverMode {
    /// Copies every imported symbol into a single map up front. Worth it when the context is
    /// shared by many writers.
    Flat,
    /// Consults the system table and then each import in order on every lookup. Cheap to build,
    /// which suits contexts that are thrown away frequently.
    #[default]
    Delegate,
}

#[derive(Debug)]
enum SymbolResolver {
    Flat(FxHashMap<Arc<str>, SymbolId>),
    // Each import paired with the symbol ID of its first symbol.
    Delegate(Vec<(Arc<SharedSymbolTable>, SymbolId)>),
}

/// The symbols a stream gets for free: the system symbols followed by each imported shared
/// table's symbols. Local symbols are numbered from [local_sid_start](Self::local_sid_start).
///
/// A context never changes after it is built and can be shared between writers.
#[derive(Debug)]
pub struct ImportedSymbolContext {
    mode: ImportedSymbolResolverMode,
    imports: Vec<Arc<SharedSymbolTable>>,
    resolver: SymbolResolver,
    local_sid_start: SymbolId,
}

static SYSTEM_ONLY: LazyLock<Arc<ImportedSymbolContext>> = LazyLock::new(|| {
    Arc::new(ImportedSymbolContext::new(
        ImportedSymbolResolverMode::Flat,
        &[],
    ))
});

impl ImportedSymbolContext {
    pub fn new(mode: ImportedSymbolResolverMode, imports: &[Arc<SharedSymbolTable>]) -> Self {
        let mut next_sid = v1_0::ION_1_0_MAX_ID + 1;
        let resolver = match mode {
            ImportedSymbolResolverMode::Flat => {
                let mut ids_by_text: FxHashMap<Arc<str>, SymbolId> = FxHashMap::default();
                for (index, text) in v1_0::SYSTEM_SYMBOLS.iter().enumerate() {
                    ids_by_text.insert(Arc::from(*text), index + 1);
                }
                for table in imports {
                    for text in table.symbols() {
                        if let Some(text) = text {
                            ids_by_text.entry(Arc::clone(text)).or_insert(next_sid);
                        }
                        next_sid += 1;
                    }
                }
                SymbolResolver::Flat(ids_by_text)
            }
            ImportedSymbolResolverMode::Delegate => {
                let mut positions = Vec::with_capacity(imports.len());
                for table in imports {
                    positions.push((Arc::clone(table), next_sid));
                    next_sid += table.max_id();
                }
                SymbolResolver::Delegate(positions)
            }
        };
        ImportedSymbolContext {
            mode,
            imports: imports.to_vec(),
            resolver,
            local_sid_start: next_sid,
        }
    }

    /// The shared context for streams that import nothing beyond the system symbols.
    pub fn system_only() -> Arc<ImportedSymbolContext> {
        Arc::clone(&SYSTEM_ONLY)
    }

    pub fn mode(&self) -> ImportedSymbolResolverMode {
        self.mode
    }

    /// The imported shared tables, in declaration order. Does not include the system table.
    pub fn imports(&self) -> &[Arc<SharedSymbolTable>] {
        &self.imports
    }

    /// The symbol ID that the first local symbol will be assigned.
    pub fn local_sid_start(&self) -> SymbolId {
        self.local_sid_start
    }

    pub fn imported_max_id(&self) -> SymbolId {
        self.local_sid_start - 1
    }

    /// Returns the lowest symbol ID whose text is `text`, if the system table or an import
    /// defines it.
    pub fn sid_for(&self, text: &str) -> Option<SymbolId> {
        match &self.resolver {
            SymbolResolver::Flat(ids_by_text) => ids_by_text.get(text).copied(),
            SymbolResolver::Delegate(positions) => {
                if let Some(sid) = SYSTEM_SYMBOLS_1_0.sid_for(text) {
                    return Some(sid);
                }
                positions.iter().find_map(|(table, start)| {
                    table
                        .local_sid_for(text)
                        .map(|local_sid| local_sid + start - 1)
                })
            }
        }
    }
}
