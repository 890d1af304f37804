/// Remote endpoints consumed by the update pipeline.
///
/// All bases end with a trailing slash and are joined by plain concatenation.
/// The defaults point at the production hosts; tests swap them for a local
/// mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Root of the component metadata service (serves `index.json`,
    /// `<uid>.json` and `<uid>/<version>.json`).
    pub meta_base: String,
    /// Versioned-download host for client jars.
    pub versions_base: String,
    /// Default maven base for library downloads.
    pub libraries_base: String,
    /// Host serving asset index documents.
    pub asset_indexes_base: String,
    /// Host serving content-addressed asset objects.
    pub resources_base: String,
    /// Our mirror of the legacy FML libraries.
    pub fml_ours_base: String,
    /// Upstream source of the legacy FML libraries.
    pub fml_upstream_base: String,
    /// Forge mirror list used for `forge-pack-xz` libraries.
    pub forge_mirror_list: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            meta_base: "https://meta.stratalauncher.org/".to_string(),
            versions_base: "https://s3.amazonaws.com/Minecraft.Download/versions/".to_string(),
            libraries_base: "https://libraries.minecraft.net/".to_string(),
            asset_indexes_base: "https://s3.amazonaws.com/Minecraft.Download/indexes/".to_string(),
            resources_base: "https://resources.download.minecraft.net/".to_string(),
            fml_ours_base: "https://files.stratalauncher.org/fmllibs/".to_string(),
            fml_upstream_base: "https://files.minecraftforge.net/fmllibs/".to_string(),
            forge_mirror_list: "https://files.minecraftforge.net/mirror-brand.list".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every base at a single root, for tests against a mock server.
    pub fn with_root(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            meta_base: format!("{root}/meta/"),
            versions_base: format!("{root}/versions/"),
            libraries_base: format!("{root}/libraries/"),
            asset_indexes_base: format!("{root}/indexes/"),
            resources_base: format!("{root}/resources/"),
            fml_ours_base: format!("{root}/fmllibs/"),
            fml_upstream_base: format!("{root}/fmllibs/"),
            forge_mirror_list: format!("{root}/mirror-brand.list"),
        }
    }
}
