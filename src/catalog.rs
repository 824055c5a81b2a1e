use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::shared_symbol_table::SharedSymbolTable;

/// A Catalog is a collection of Shared Symbol Tables.
/// For more information about the concept of a catalog,
/// see [the `symbols` section of the Ion documentation](https://amazon-ion.github.io/ion-docs/docs/symbols.html#the-catalog).
///
/// The managed writer consults its catalog when a user-authored local symbol table names imports.
pub trait Catalog: Send + Sync {
    /// Returns the Shared Symbol Table with given table name
    /// If a table with the given name doesn't exists or if the table name is an empty string
    /// then returns None
    /// If a table with multiple versions exists for the given name then it will return the latest version of table
    fn get_table(&self, name: &str) -> Option<Arc<SharedSymbolTable>>;
    /// Returns the Shared Symbol Table with given table name and version
    /// If a table with given name and version doesn't exists then it returns None
    fn get_table_with_version(&self, name: &str, version: usize)
        -> Option<Arc<SharedSymbolTable>>;

    /// Returns the table with the requested version if there is one, or else the latest version
    /// available under that name.
    fn get_best_match(&self, name: &str, version: usize) -> Option<Arc<SharedSymbolTable>> {
        self.get_table_with_version(name, version)
            .or_else(|| self.get_table(name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    tables_by_name: HashMap<String, BTreeMap<usize, Arc<SharedSymbolTable>>>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Shared Symbol Table with name into the Catalog, replacing any table that was
    /// registered with the same name and version.
    pub fn insert_table(&mut self, table: impl Into<Arc<SharedSymbolTable>>) {
        let table = table.into();
        self.tables_by_name
            .entry(table.name().to_owned())
            .or_default()
            .insert(table.version(), table);
    }
}

impl Catalog for MapCatalog {
    fn get_table(&self, name: &str) -> Option<Arc<SharedSymbolTable>> {
        if name.is_empty() {
            return None;
        }
        let versions = self.tables_by_name.get(name)?;
        let (_highest_version, table) = versions.iter().next_back()?;
        Some(Arc::clone(table))
    }

    fn get_table_with_version(
        &self,
        name: &str,
        version: usize,
    ) -> Option<Arc<SharedSymbolTable>> {
        if name.is_empty() {
            return None;
        }
        self.tables_by_name.get(name)?.get(&version).cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmptyCatalog {}

impl Catalog for EmptyCatalog {
    fn get_table(&self, _name: &str) -> Option<Arc<SharedSymbolTable>> {
        None
    }

    fn get_table_with_version(
        &self,
        _name: &str,
        _version: usize,
    ) -> Option<Arc<SharedSymbolTable>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IonResult;

    fn catalog() -> IonResult<MapCatalog> {
        let mut catalog = MapCatalog::new();
        catalog.insert_table(SharedSymbolTable::new("T", 1, [Some("true")])?);
        catalog.insert_table(SharedSymbolTable::new("T", 3, [Some("true"), Some("false")])?);
        Ok(catalog)
    }

    #[test]
    fn get_table_returns_latest_version() -> IonResult<()> {
        let catalog = catalog()?;
        assert_eq!(catalog.get_table("T").map(|t| t.version()), Some(3));
        assert!(catalog.get_table("S").is_none());
        assert!(catalog.get_table("").is_none());
        Ok(())
    }

    #[test]
    fn get_table_with_version_is_exact() -> IonResult<()> {
        let catalog = catalog()?;
        assert!(catalog.get_table_with_version("T", 1).is_some());
        assert!(catalog.get_table_with_version("T", 2).is_none());
        Ok(())
    }

    #[test]
    fn best_match_falls_back_to_latest() -> IonResult<()> {
        let catalog = catalog()?;
        assert_eq!(
            catalog.get_best_match("T", 2).map(|t| t.version()),
            Some(3)
        );
        assert!(EmptyCatalog::default().get_best_match("T", 1).is_none());
        Ok(())
    }
}
