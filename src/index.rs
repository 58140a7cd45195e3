//! One-time scan of the shared folder at startup.

use crate::catalog::CatalogEntry;
use anyhow::Context;
use std::path::Path;
use tracing::warn;

/// Lists the regular files directly inside `dir` as catalog entries with their current
///  on-disk sizes. Subdirectories are ignored (the namespace is flat); files whose names
///  are not valid UTF-8 cannot be requested over the wire and are skipped with a warning.
pub fn scan_shared_dir(dir: &Path) -> anyhow::Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();

    for dir_entry in std::fs::read_dir(dir).with_context(|| format!("reading shared folder {:?}", dir))? {
        let dir_entry = dir_entry?;
        let metadata = dir_entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let path = dir_entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_owned(),
            None => {
                warn!("skipping file with non-UTF-8 name: {:?}", path);
                continue;
            }
        };

        entries.push(CatalogEntry {
            name,
            path,
            size: metadata.len(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;

    #[test]
    fn test_scan_lists_regular_files_with_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        fs::write(dir.path().join("b.bin"), b"").unwrap();

        let entries = scan_shared_dir(dir.path()).unwrap();

        let by_name: BTreeMap<String, u64> = entries.into_iter().map(|e| (e.name, e.size)).collect();
        assert_eq!(by_name, BTreeMap::from([("a.txt".to_string(), 5), ("b.bin".to_string(), 0)]));
    }

    #[test]
    fn test_scan_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("inner.txt"), b"xx").unwrap();
        fs::write(dir.path().join("top.txt"), b"x").unwrap();

        let entries = scan_shared_dir(dir.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "top.txt");
    }

    #[test]
    fn test_scan_fails_on_missing_directory() {
        assert!(scan_shared_dir(Path::new("/definitely/not/a/real/path")).is_err());
    }
}
