//! Recognizes local symbol tables that an application writes through the managed writer as if
//! they were ordinary values, e.g.
//!
//! ```text
//! $ion_symbol_table::{
//!     imports: [{name: "fruit", version: 2, max_id: 40}],
//!     symbols: ["apple", "banana"],
//! }
//! ```
//!
//! The managed writer feeds every user write to a [UserSymbolTableInterceptor] before encoding
//! it. Once the table's closing `step_out` arrives, the interceptor hands back a
//! [CapturedSymbolTable] so the writer can replace the raw bytes with its own symbol table.

use std::fmt;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::constants::v1_0::system_symbol_ids;
use crate::result::{illegal_operation, IonResult};
use crate::shared_symbol_table::SharedSymbolTable;
use crate::types::{Int, IonType, SymbolId};

/// Where the user writer is in relation to a symbol table it may be writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum UserState {
    /// Not inside of a user-authored symbol table.
    #[default]
    Normal,
    /// Directly inside of the `$ion_symbol_table` struct.
    LocalsAtTop,
    /// Inside of the `imports` list, or one of the import structs within it.
    LocalsAtImports,
    /// Inside of the `symbols` list.
    LocalsAtSymbols,
}

/// The user writer's position when an event is observed. `depth` and `field_id` describe the
/// writer before the event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WriterContext {
    pub depth: usize,
    pub field_id: Option<SymbolId>,
    pub position: usize,
    pub has_top_level_symbol_table_annotation: bool,
}

// The fields of a single import struct, as written so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ImportDescriptor {
    name: Option<String>,
    version: Option<usize>,
    max_id: Option<usize>,
}

impl ImportDescriptor {
    fn is_defined(&self) -> bool {
        self.name.is_some() && self.version.is_some()
    }

    fn is_undefined(&self) -> bool {
        self.name.is_none() && self.version.is_none() && self.max_id.is_none()
    }

    fn is_malformed(&self) -> bool {
        !self.is_defined() && !self.is_undefined()
    }

    // Finds the table this import refers to, substituting one if the catalog cannot supply a
    // table that matches the declaration exactly.
    fn resolve(&self, catalog: &dyn Catalog) -> IonResult<Option<Arc<SharedSymbolTable>>> {
        let (Some(name), Some(version)) = (self.name.as_deref(), self.version) else {
            return Ok(None);
        };
        let table = match (catalog.get_best_match(name, version), self.max_id) {
            (Some(table), _) => table,
            (None, None) => {
                return illegal_operation(format!(
                    "import is not in the catalog and declares no max_id: {self}"
                ))
            }
            (None, Some(max_id)) => {
                log::debug!("substituting unknown shared symbol table {self}");
                return Ok(Some(Arc::new(SharedSymbolTable::substitute(
                    None, name, version, max_id,
                )?)));
            }
        };
        match self.max_id {
            Some(max_id) if max_id != table.max_id() || version != table.version() => {
                log::debug!(
                    "substituting shared symbol table {self} for catalog version {} with max_id {}",
                    table.version(),
                    table.max_id()
                );
                Ok(Some(Arc::new(SharedSymbolTable::substitute(
                    Some(&table),
                    name,
                    version,
                    max_id,
                )?)))
            }
            _ => Ok(Some(table)),
        }
    }
}

impl fmt::Display for ImportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{name: {:?}, version: ", self.name)?;
        match self.version {
            Some(version) => write!(f, "{version}")?,
            None => write!(f, "null")?,
        }
        write!(f, ", max_id: ")?;
        match self.max_id {
            Some(max_id) => write!(f, "{max_id}}}"),
            None => write!(f, "null}}"),
        }
    }
}

/// A user-authored local symbol table, ready to be re-declared by the managed writer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CapturedSymbolTable {
    /// The user writer position at which the table's encoding begins.
    pub position: usize,
    /// `true` if the table was an append (`imports: $ion_symbol_table`), which extends the
    /// current context instead of replacing it.
    pub is_append: bool,
    pub imports: Vec<Arc<SharedSymbolTable>>,
    pub symbols: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct UserSymbolTableInterceptor {
    state: UserState,
    position: usize,
    current_import: ImportDescriptor,
    imports: Vec<Arc<SharedSymbolTable>>,
    symbols: Vec<String>,
    is_append: bool,
}

impl UserSymbolTableInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> UserState {
        self.state
    }

    pub fn before_step_in(&mut self, context: WriterContext, ion_type: IonType) -> IonResult<()> {
        match self.state {
            UserState::Normal => {
                if context.has_top_level_symbol_table_annotation && ion_type == IonType::Struct {
                    self.state = UserState::LocalsAtTop;
                    // The table's bytes will be discarded once it has been captured.
                    self.position = context.position;
                }
            }
            UserState::LocalsAtTop if context.depth == 1 => {
                let next = match context.field_id {
                    Some(system_symbol_ids::IMPORTS) => UserState::LocalsAtImports,
                    Some(system_symbol_ids::SYMBOLS) => UserState::LocalsAtSymbols,
                    _ => return Ok(()),
                };
                if ion_type != IonType::List {
                    return illegal_operation(format!(
                        "the local symbol table's {} field must be a list, not a(n) {ion_type}",
                        if next == UserState::LocalsAtImports {
                            "imports"
                        } else {
                            "symbols"
                        }
                    ));
                }
                self.state = next;
            }
            UserState::LocalsAtImports => {
                if ion_type != IonType::Struct {
                    return illegal_operation(format!(
                        "local symbol table imports must be structs, not a(n) {ion_type}"
                    ));
                }
            }
            UserState::LocalsAtTop | UserState::LocalsAtSymbols => {}
        }
        Ok(())
    }

    /// Observes a completed `step_out`. `depth` is the writer's depth after stepping out.
    /// Returns the captured table once the `$ion_symbol_table` struct itself has been closed.
    pub fn after_step_out(
        &mut self,
        depth: usize,
        catalog: &dyn Catalog,
    ) -> IonResult<Option<CapturedSymbolTable>> {
        match (self.state, depth) {
            (UserState::LocalsAtTop, 0) => {
                self.state = UserState::Normal;
                self.current_import = ImportDescriptor::default();
                let captured = CapturedSymbolTable {
                    position: self.position,
                    is_append: std::mem::take(&mut self.is_append),
                    imports: std::mem::take(&mut self.imports),
                    symbols: std::mem::take(&mut self.symbols),
                };
                self.position = 0;
                return Ok(Some(captured));
            }
            (UserState::LocalsAtImports, 2) => {
                // An import struct is complete.
                let import = std::mem::take(&mut self.current_import);
                if import.is_malformed() {
                    return illegal_operation(format!("invalid import: {import}"));
                }
                if let Some(table) = import.resolve(catalog)? {
                    self.imports.push(table);
                }
            }
            (UserState::LocalsAtImports, 1) | (UserState::LocalsAtSymbols, 1) => {
                self.state = UserState::LocalsAtTop;
            }
            _ => {}
        }
        Ok(None)
    }

    pub fn on_string(&mut self, context: WriterContext, value: &str) -> IonResult<()> {
        match self.state {
            UserState::LocalsAtImports
                if context.depth == 3 && context.field_id == Some(system_symbol_ids::NAME) =>
            {
                self.current_import.name = Some(value.to_owned());
            }
            UserState::LocalsAtSymbols if context.depth == 2 => {
                self.symbols.push(value.to_owned());
            }
            _ => {}
        }
        Ok(())
    }

    pub fn on_int(&mut self, context: WriterContext, value: &Int) -> IonResult<()> {
        if self.state != UserState::LocalsAtImports || context.depth != 3 {
            return Ok(());
        }
        let slot = match context.field_id {
            Some(system_symbol_ids::VERSION) => &mut self.current_import.version,
            Some(system_symbol_ids::MAX_ID) => &mut self.current_import.max_id,
            _ => return Ok(()),
        };
        match value.as_i64() {
            Some(n) if (1..=i32::MAX as i64).contains(&n) => {
                *slot = Some(n as usize);
                Ok(())
            }
            _ => illegal_operation(format!("invalid integer value in import: {value}")),
        }
    }

    pub fn on_symbol(&mut self, context: WriterContext, sid: SymbolId) {
        if self.state == UserState::LocalsAtTop
            && context.depth == 1
            && context.field_id == Some(system_symbol_ids::IMPORTS)
            && sid == system_symbol_ids::ION_SYMBOL_TABLE
        {
            self.is_append = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EmptyCatalog, MapCatalog};
    use rstest::*;

    fn at(depth: usize, field_id: Option<SymbolId>) -> WriterContext {
        WriterContext {
            depth,
            field_id,
            position: 7,
            has_top_level_symbol_table_annotation: false,
        }
    }

    fn annotated_top_level() -> WriterContext {
        WriterContext {
            has_top_level_symbol_table_annotation: true,
            ..at(0, None)
        }
    }

    fn open_table(interceptor: &mut UserSymbolTableInterceptor) -> IonResult<()> {
        interceptor.before_step_in(annotated_top_level(), IonType::Struct)?;
        assert_eq!(interceptor.state(), UserState::LocalsAtTop);
        Ok(())
    }

    fn catalog() -> IonResult<MapCatalog> {
        let mut catalog = MapCatalog::new();
        catalog.insert_table(SharedSymbolTable::new(
            "fruit",
            2,
            [Some("apple"), Some("banana"), Some("cherry")],
        )?);
        Ok(catalog)
    }

    // Writes `{name: <name>, version: <version>, max_id: <max_id>}` into the imports list and
    // closes it.
    fn write_import(
        interceptor: &mut UserSymbolTableInterceptor,
        catalog: &dyn Catalog,
        name: Option<&str>,
        version: Option<i64>,
        max_id: Option<i64>,
    ) -> IonResult<()> {
        interceptor.before_step_in(at(2, None), IonType::Struct)?;
        if let Some(name) = name {
            interceptor.on_string(at(3, Some(system_symbol_ids::NAME)), name)?;
        }
        if let Some(version) = version {
            interceptor.on_int(at(3, Some(system_symbol_ids::VERSION)), &Int::from(version))?;
        }
        if let Some(max_id) = max_id {
            interceptor.on_int(at(3, Some(system_symbol_ids::MAX_ID)), &Int::from(max_id))?;
        }
        assert_eq!(interceptor.after_step_out(2, catalog)?, None);
        Ok(())
    }

    #[test]
    fn ordinary_structs_are_ignored() -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        interceptor.before_step_in(at(0, None), IonType::Struct)?;
        assert_eq!(interceptor.state(), UserState::Normal);
        interceptor.on_string(at(1, Some(system_symbol_ids::SYMBOLS)), "nope")?;
        assert_eq!(interceptor.after_step_out(0, &EmptyCatalog {})?, None);
        // Annotated lists are not symbol tables either.
        interceptor.before_step_in(annotated_top_level(), IonType::List)?;
        assert_eq!(interceptor.state(), UserState::Normal);
        Ok(())
    }

    #[test]
    fn captures_symbols_and_imports() -> IonResult<()> {
        let catalog = catalog()?;
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;

        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        assert_eq!(interceptor.state(), UserState::LocalsAtImports);
        write_import(&mut interceptor, &catalog, Some("fruit"), Some(2), Some(3))?;
        write_import(&mut interceptor, &catalog, None, None, None)?;
        assert_eq!(interceptor.after_step_out(1, &catalog)?, None);
        assert_eq!(interceptor.state(), UserState::LocalsAtTop);

        interceptor.before_step_in(at(1, Some(system_symbol_ids::SYMBOLS)), IonType::List)?;
        interceptor.on_string(at(2, None), "kiwi")?;
        interceptor.on_string(at(2, None), "lime")?;
        assert_eq!(interceptor.after_step_out(1, &catalog)?, None);

        let captured = interceptor
            .after_step_out(0, &catalog)?
            .expect("the table should have been captured");
        assert_eq!(captured.position, 7);
        assert!(!captured.is_append);
        assert_eq!(captured.symbols, vec!["kiwi", "lime"]);
        assert_eq!(captured.imports.len(), 1);
        assert!(!captured.imports[0].is_substitute());
        assert_eq!(interceptor.state(), UserState::Normal);
        Ok(())
    }

    #[rstest]
    #[case::unknown_table("vegetables", 1, Some(4), 4)]
    #[case::max_id_mismatch("fruit", 2, Some(5), 5)]
    #[case::version_mismatch("fruit", 1, Some(3), 3)]
    fn mismatched_imports_are_substituted(
        #[case] name: &str,
        #[case] version: i64,
        #[case] max_id: Option<i64>,
        #[case] expected_max_id: usize,
    ) -> IonResult<()> {
        let catalog = catalog()?;
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        write_import(&mut interceptor, &catalog, Some(name), Some(version), max_id)?;
        interceptor.after_step_out(1, &catalog)?;
        let captured = interceptor
            .after_step_out(0, &catalog)?
            .expect("the table should have been captured");
        let table = &captured.imports[0];
        assert!(table.is_substitute());
        assert_eq!(table.max_id(), expected_max_id);
        assert_eq!(table.version(), version as usize);
        Ok(())
    }

    #[test]
    fn missing_max_id_falls_back_to_the_catalog() -> IonResult<()> {
        let catalog = catalog()?;
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        // Version 7 is unknown, but without a max_id the latest version is used as-is.
        write_import(&mut interceptor, &catalog, Some("fruit"), Some(7), None)?;
        let err = write_import(&mut interceptor, &catalog, Some("nuts"), Some(1), None);
        assert!(err.is_err());
        Ok(())
    }

    #[rstest]
    #[case::name_only(Some("fruit"), None, None)]
    #[case::version_only(None, Some(1), None)]
    #[case::max_id_only(None, None, Some(3))]
    fn malformed_imports_are_rejected(
        #[case] name: Option<&str>,
        #[case] version: Option<i64>,
        #[case] max_id: Option<i64>,
    ) -> IonResult<()> {
        let catalog = catalog()?;
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        assert!(write_import(&mut interceptor, &catalog, name, version, max_id).is_err());
        Ok(())
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-3)]
    #[case::too_large(i32::MAX as i64 + 1)]
    fn invalid_import_integers(#[case] value: i64) -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        interceptor.before_step_in(at(2, None), IonType::Struct)?;
        let result =
            interceptor.on_int(at(3, Some(system_symbol_ids::VERSION)), &Int::from(value));
        assert!(result.is_err());
        Ok(())
    }

    #[rstest]
    #[case::imports_as_struct(system_symbol_ids::IMPORTS, IonType::Struct)]
    #[case::symbols_as_sexp(system_symbol_ids::SYMBOLS, IonType::SExp)]
    fn table_fields_must_be_lists(
        #[case] field_id: SymbolId,
        #[case] ion_type: IonType,
    ) -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        assert!(interceptor
            .before_step_in(at(1, Some(field_id)), ion_type)
            .is_err());
        Ok(())
    }

    #[test]
    fn imports_must_be_structs() -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.before_step_in(at(1, Some(system_symbol_ids::IMPORTS)), IonType::List)?;
        assert!(interceptor.before_step_in(at(2, None), IonType::List).is_err());
        Ok(())
    }

    #[test]
    fn appends_are_recognized() -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        interceptor.on_symbol(
            at(1, Some(system_symbol_ids::IMPORTS)),
            system_symbol_ids::ION_SYMBOL_TABLE,
        );
        interceptor.before_step_in(at(1, Some(system_symbol_ids::SYMBOLS)), IonType::List)?;
        interceptor.on_string(at(2, None), "plum")?;
        interceptor.after_step_out(1, &EmptyCatalog {})?;
        let captured = interceptor
            .after_step_out(0, &EmptyCatalog {})?
            .expect("the table should have been captured");
        assert!(captured.is_append);
        assert!(captured.imports.is_empty());
        assert_eq!(captured.symbols, vec!["plum"]);
        Ok(())
    }

    #[test]
    fn open_content_is_ignored() -> IonResult<()> {
        let mut interceptor = UserSymbolTableInterceptor::new();
        open_table(&mut interceptor)?;
        // An unrecognized field holding a container.
        interceptor.before_step_in(at(1, Some(42)), IonType::List)?;
        assert_eq!(interceptor.state(), UserState::LocalsAtTop);
        interceptor.on_string(at(2, None), "ignored")?;
        assert_eq!(interceptor.after_step_out(1, &EmptyCatalog {})?, None);
        // Nested containers within the symbols list do not end it early.
        interceptor.before_step_in(at(1, Some(system_symbol_ids::SYMBOLS)), IonType::List)?;
        interceptor.before_step_in(at(2, None), IonType::List)?;
        interceptor.on_string(at(3, None), "also ignored")?;
        interceptor.after_step_out(2, &EmptyCatalog {})?;
        assert_eq!(interceptor.state(), UserState::LocalsAtSymbols);
        interceptor.after_step_out(1, &EmptyCatalog {})?;
        let captured = interceptor
            .after_step_out(0, &EmptyCatalog {})?
            .expect("the table should have been captured");
        assert!(captured.symbols.is_empty());
        Ok(())
    }
}
