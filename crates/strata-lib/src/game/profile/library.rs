use serde::{Deserialize, Serialize};
use std::path::Path;

const ARCH_TOKEN: &str = "${arch}";

/// How a library is resolved during an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryHint {
    /// Resolved individually through the download cache.
    #[default]
    Normal,
    /// Must already exist in the instance's libraries directory.
    Local,
    /// Deferred to the forge mirror-list download strategy.
    ForgePackXz,
}

/// One concrete (storage path, download URL) pair produced by expanding a
/// library; architecture-templated libraries expand to two of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryVariant {
    pub storage: String,
    pub url: String,
}

/// A downloadable or locally-available dependency of the runtime profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    /// Maven-style coordinate, `group:artifact:version[:classifier]`.
    pub name: String,
    /// Base URL override; the default maven base is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Storage-suffix template override; derived from the coordinate when
    /// absent. May contain `${arch}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default)]
    pub hint: LibraryHint,
    #[serde(default)]
    pub natives: bool,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            storage: None,
            hint: LibraryHint::default(),
            natives: false,
        }
    }

    /// Coordinate without the version part, used as the identity for
    /// override-on-reapply. Plain names without maven separators are their
    /// own identity.
    pub fn identity(&self) -> &str {
        match self.name.match_indices(':').nth(1) {
            Some((idx, _)) => &self.name[..idx],
            None => &self.name,
        }
    }

    /// Relative storage path of the artifact, either the explicit template
    /// or the conventional maven layout derived from the coordinate.
    pub fn storage_suffix(&self) -> String {
        if let Some(storage) = &self.storage {
            return storage.clone();
        }
        let mut parts = self.name.split(':');
        let group = parts.next().unwrap_or_default();
        let artifact = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let classifier = parts.next();

        let mut file = format!("{artifact}-{version}");
        if let Some(classifier) = classifier {
            file.push('-');
            file.push_str(classifier);
        }
        format!(
            "{}/{}/{}/{}.jar",
            group.replace('.', "/"),
            artifact,
            version,
            file
        )
    }

    /// Download URL for the given storage suffix.
    pub fn download_url(&self, storage: &str, default_base: &str) -> String {
        let base = self.url.as_deref().unwrap_or(default_base);
        format!("{}{}", base, storage)
    }

    pub fn is_arch_templated(&self) -> bool {
        self.storage_suffix().contains(ARCH_TOKEN)
    }

    /// Expand to the concrete set of files this library resolves to:
    /// one variant normally, the 32-bit and 64-bit variants when the
    /// storage template carries an architecture placeholder.
    pub fn expand(&self, default_base: &str) -> Vec<LibraryVariant> {
        let storage = self.storage_suffix();
        let url = self.download_url(&storage, default_base);
        if !storage.contains(ARCH_TOKEN) {
            return vec![LibraryVariant { storage, url }];
        }
        ["32", "64"]
            .iter()
            .map(|arch| LibraryVariant {
                storage: storage.replace(ARCH_TOKEN, arch),
                url: url.replace(ARCH_TOKEN, arch),
            })
            .collect()
    }

    /// The file names this library is expected to provide on disk.
    pub fn files(&self) -> Vec<String> {
        self.expand("").into_iter().map(|v| v.storage).collect()
    }

    /// Whether every expected file exists under `dir`. Used for `local`
    /// libraries, which have no fetch path.
    pub fn files_exist(&self, dir: &Path) -> bool {
        self.files().iter().all(|file| dir.join(file).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_suffix_derives_maven_layout() {
        let lib = Library::new("org.lwjgl.lwjgl:lwjgl:2.9.1");
        assert_eq!(
            lib.storage_suffix(),
            "org/lwjgl/lwjgl/lwjgl/2.9.1/lwjgl-2.9.1.jar"
        );
    }

    #[test]
    fn storage_suffix_keeps_classifier() {
        let lib = Library::new("org.lwjgl.lwjgl:lwjgl-platform:2.9.1:natives-linux");
        assert_eq!(
            lib.storage_suffix(),
            "org/lwjgl/lwjgl/lwjgl-platform/2.9.1/lwjgl-platform-2.9.1-natives-linux.jar"
        );
    }

    #[test]
    fn arch_template_expands_to_exactly_two_variants() {
        let mut lib = Library::new("net.java.jinput:jinput-platform:2.0.5");
        lib.storage = Some("lib-${arch}.jar".to_string());
        let variants = lib.expand("https://libraries.example.net/");
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].storage, "lib-32.jar");
        assert_eq!(variants[1].storage, "lib-64.jar");
        assert_eq!(variants[0].url, "https://libraries.example.net/lib-32.jar");
        assert_eq!(variants[1].url, "https://libraries.example.net/lib-64.jar");
    }

    #[test]
    fn identity_strips_version() {
        assert_eq!(
            Library::new("com.google.guava:guava:12.0.1").identity(),
            "com.google.guava:guava"
        );
        assert_eq!(Library::new("L1").identity(), "L1");
    }

    #[test]
    fn hint_parses_from_kebab_case() {
        let lib: Library =
            serde_json::from_str(r#"{"name": "a:b:1", "hint": "forge-pack-xz"}"#).unwrap();
        assert_eq!(lib.hint, LibraryHint::ForgePackXz);
        let lib: Library = serde_json::from_str(r#"{"name": "a:b:1", "hint": "local"}"#).unwrap();
        assert_eq!(lib.hint, LibraryHint::Local);
    }

    #[test]
    fn files_exist_checks_the_expected_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let mut lib = Library::new("custom:thing:1.0");
        lib.storage = Some("custom/thing.jar".to_string());
        assert!(!lib.files_exist(tmp.path()));
        std::fs::create_dir_all(tmp.path().join("custom")).unwrap();
        std::fs::write(tmp.path().join("custom/thing.jar"), b"x").unwrap();
        assert!(lib.files_exist(tmp.path()));
    }
}
