//! Asset index documents and the diff against the on-disk object store.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parsed asset index document.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

/// One content-addressed asset object.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetObject {
    /// Storage path relative to the objects directory,
    /// `<first two hash chars>/<hash>`.
    pub fn relative_path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(self.hash.as_str());
        format!("{}/{}", prefix, self.hash)
    }
}

/// Read and parse an asset index from disk.
pub fn load_index(path: &Path) -> Result<AssetIndex> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| Error::Parse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// The set of objects that are absent or size-mismatched on disk, sorted by
/// object name for deterministic job construction.
pub fn missing_objects<'a>(
    index: &'a AssetIndex,
    objects_dir: &Path,
) -> Vec<(&'a str, &'a AssetObject)> {
    let mut missing: Vec<(&str, &AssetObject)> = index
        .objects
        .iter()
        .filter(|(_, object)| {
            let path = objects_dir.join(object.relative_path());
            match fs::metadata(&path) {
                Ok(metadata) => metadata.len() != object.size,
                Err(_) => true,
            }
        })
        .map(|(name, object)| (name.as_str(), object))
        .collect();
    missing.sort_by_key(|(name, _)| *name);
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn index_json() -> &'static str {
        r#"{
            "objects": {
                "icons/icon_16x16.png": {
                    "hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a",
                    "size": 3665
                },
                "minecraft/sounds/random/click.ogg": {
                    "hash": "5c23ba4cc18f1ddf2b0e1dd26bdcb0a159a8b9c3",
                    "size": 2278
                }
            }
        }"#
    }

    #[test]
    fn object_paths_are_hash_addressed() {
        let index: AssetIndex = serde_json::from_str(index_json()).unwrap();
        let object = &index.objects["icons/icon_16x16.png"];
        assert_eq!(
            object.relative_path(),
            "bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
    }

    #[test]
    fn missing_objects_diffs_presence_and_size() {
        let tmp = tempdir().unwrap();
        let index: AssetIndex = serde_json::from_str(index_json()).unwrap();

        // one object present with the right size, one absent
        let present = &index.objects["icons/icon_16x16.png"];
        let path = tmp.path().join(present.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![0u8; present.size as usize]).unwrap();

        let missing = missing_objects(&index, tmp.path());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, "minecraft/sounds/random/click.ogg");

        // a size mismatch makes the object missing again
        fs::write(&path, b"short").unwrap();
        let missing = missing_objects(&index, tmp.path());
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn load_index_reports_parse_failures() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("legacy.json");
        fs::write(&path, b"{ definitely not json").unwrap();
        let err = load_index(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
