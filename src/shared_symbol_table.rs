use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::result::{illegal_operation, IonResult};
use crate::types::SymbolId;

/// A named, versioned, read-only list of symbols that a stream can import.
/// For more information on shared symbol tables, see:
/// <https://amazon-ion.github.io/ion-docs/docs/symbols.html#shared-symbol-tables>
///
/// Symbol IDs within a shared table are local to it and start at 1; an importing stream offsets
/// them by the number of symbols that precede the table in its import list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSymbolTable {
    name: String,
    version: usize,
    symbols: Vec<Option<Arc<str>>>,
    // The lowest local ID for each distinct text.
    ids_by_text: FxHashMap<Arc<str>, SymbolId>,
    is_substitute: bool,
}

impl SharedSymbolTable {
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        version: usize,
        symbols: impl IntoIterator<Item = Option<S>>,
    ) -> IonResult<Self> {
        let name = name.into();
        // Shared table names must be non-empty.
        if name.is_empty() {
            return illegal_operation("shared symbol table with empty name is not allowed");
        }
        if version < 1 {
            return illegal_operation(format!(
                "shared symbol table '{name}' must have a version of at least 1"
            ));
        }
        let symbols = symbols
            .into_iter()
            .map(|text| text.map(|t| Arc::from(t.as_ref())))
            .collect();
        Ok(Self::from_parts(name, version, symbols, false))
    }

    /// Builds a table that stands in for `original` when an import declares a version or
    /// `max_id` that the available table does not match. The result always has exactly `max_id`
    /// symbols: the original's symbols are truncated to fit, and any slots beyond the original's
    /// end (or every slot, if there is no original) have unknown text.
    pub fn substitute(
        original: Option<&SharedSymbolTable>,
        name: impl Into<String>,
        version: usize,
        max_id: usize,
    ) -> IonResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return illegal_operation("cannot substitute a shared symbol table with no name");
        }
        let symbols = (0..max_id)
            .map(|index| original.and_then(|table| table.symbols.get(index).cloned().flatten()))
            .collect();
        Ok(Self::from_parts(name, version.max(1), symbols, true))
    }

    fn from_parts(
        name: String,
        version: usize,
        symbols: Vec<Option<Arc<str>>>,
        is_substitute: bool,
    ) -> Self {
        let mut ids_by_text = FxHashMap::default();
        for (index, text) in symbols.iter().enumerate() {
            if let Some(text) = text {
                ids_by_text.entry(Arc::clone(text)).or_insert(index + 1);
            }
        }
        Self {
            name,
            version,
            symbols,
            ids_by_text,
            is_substitute,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> usize {
        self.version
    }

    /// The number of symbol IDs this table occupies when imported.
    pub fn max_id(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_substitute(&self) -> bool {
        self.is_substitute
    }

    pub fn symbols(&self) -> &[Option<Arc<str>>] {
        &self.symbols
    }

    /// Returns the 1-based local ID of the first symbol with the given text.
    pub fn local_sid_for(&self, text: &str) -> Option<SymbolId> {
        self.ids_by_text.get(text).copied()
    }

    /// Returns the text of the symbol at the given 1-based local ID.
    pub fn text_for(&self, local_sid: SymbolId) -> Option<&str> {
        local_sid
            .checked_sub(1)
            .and_then(|index| self.symbols.get(index))
            .and_then(|text| text.as_deref())
    }
}
