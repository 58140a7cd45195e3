use std::path::PathBuf;

/// One served file. The size is the indexed size at startup, or the declared size at
///  upload admission; the ledger refunds exactly this amount when the entry is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// In-memory registry of served files. Insertion order defines listing order.
///
/// Names are unique at all times - upload admission rejects duplicates before inserting.
///  Mutation happens only while holding the server state lock, so no synchronization of
///  its own is needed here.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        debug_assert!(!self.contains(&entry.name));
        self.entries.push(entry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn remove_by_name(&mut self, name: &str) -> Option<CatalogEntry> {
        let index = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(index))
    }

    /// All names containing `substring`, in catalog order. Case sensitive; the empty
    ///  substring matches everything.
    pub fn search<'a>(&'a self, substring: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.name.contains(substring))
            .map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            path: PathBuf::from(format!("/srv/{}", name)),
            size: 1,
        }
    }

    fn catalog_of(names: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        for name in names {
            catalog.insert(entry(name));
        }
        catalog
    }

    #[test]
    fn test_insert_find() {
        let catalog = catalog_of(&["a.txt", "b.txt"]);

        assert!(catalog.contains("a.txt"));
        assert!(!catalog.contains("c.txt"));
        assert_eq!(catalog.find_by_name("b.txt").map(|e| e.path.clone()), Some(PathBuf::from("/srv/b.txt")));
        assert_eq!(catalog.find_by_name("c.txt"), None);
    }

    #[test]
    fn test_remove_by_name() {
        let mut catalog = catalog_of(&["a.txt", "b.txt"]);

        let removed = catalog.remove_by_name("a.txt");
        assert_eq!(removed.map(|e| e.name), Some("a.txt".to_string()));
        assert!(!catalog.contains("a.txt"));
        assert_eq!(catalog.len(), 1);

        assert_eq!(catalog.remove_by_name("a.txt"), None);
    }

    #[rstest]
    #[case::empty_matches_all("", vec!["report.pdf", "notes.txt", "summary.txt"])]
    #[case::substring(".txt", vec!["notes.txt", "summary.txt"])]
    #[case::case_sensitive("Notes", vec![])]
    #[case::no_match("xyz", vec![])]
    fn test_search(#[case] substring: &str, #[case] expected: Vec<&str>) {
        let catalog = catalog_of(&["report.pdf", "notes.txt", "summary.txt"]);

        let found: Vec<&str> = catalog.search(substring).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_search_preserves_insertion_order() {
        let catalog = catalog_of(&["c", "a", "b"]);

        let found: Vec<&str> = catalog.search("").collect();
        assert_eq!(found, vec!["c", "a", "b"]);
    }
}
