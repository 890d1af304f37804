use std::path::PathBuf;

/// Progress/status signals emitted by the pipeline for a presentation layer.
/// Invoked synchronously from the update flow; implementations forward to
/// whatever UI or log sink the embedder has.
pub trait ProgressReporter: Send + Sync {
    /// Aggregate bytes transferred across the current job. `total` is 0
    /// when unknown.
    fn update_bytes(&self, done: u64, total: u64);

    /// Short human-readable status line.
    fn set_message(&self, message: &str);

    /// Files completed out of the job's total.
    fn set_step_count(&self, current: u32, total: Option<u32>);

    /// Terminal signal for the whole pipeline run.
    fn done(&self, success: bool, message: Option<&str>);
}

/// Reporter that swallows everything. Useful for tests and background runs.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn update_bytes(&self, _done: u64, _total: u64) {}
    fn set_message(&self, _message: &str) {}
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Directory layout and parameters of one update run, supplied by the
/// surrounding instance abstraction.
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    /// Minecraft version the instance wants to run.
    pub intended_version_id: String,
    /// LWJGL version installed when the instance predates explicit patches.
    pub lwjgl_version: String,
    /// The instance's minecraft root.
    pub minecraft_root: PathBuf,
    /// Shared assets tree (`indexes/` and `objects/` live below it).
    pub assets_root: PathBuf,
    /// Root of the shared download cache.
    pub cache_root: PathBuf,
    /// Local mirror of the component metadata service.
    pub meta_dir: PathBuf,
    /// Concurrent transfers per network job.
    pub concurrency: usize,
}

impl UpdateSpec {
    /// Conventional layout: shared state under `data_root`, instance files
    /// under `minecraft_root`.
    pub fn new(
        intended_version_id: impl Into<String>,
        data_root: PathBuf,
        minecraft_root: PathBuf,
    ) -> Self {
        Self {
            intended_version_id: intended_version_id.into(),
            lwjgl_version: "2.9.1".to_string(),
            assets_root: data_root.join("assets"),
            cache_root: data_root.join("cache"),
            meta_dir: data_root.join("meta"),
            minecraft_root,
            concurrency: 8,
        }
    }

    /// Patch documents owned by the instance.
    pub fn patches_dir(&self) -> PathBuf {
        self.minecraft_root.join("patches")
    }

    /// Instance-local libraries ('local' hint).
    pub fn libraries_dir(&self) -> PathBuf {
        self.minecraft_root.join("libraries")
    }

    /// Legacy FML auxiliary libraries inside the instance.
    pub fn legacy_libraries_dir(&self) -> PathBuf {
        self.minecraft_root.join("lib")
    }

    pub fn jar_mods_dir(&self) -> PathBuf {
        self.minecraft_root.join("jarmods")
    }

    /// Content-addressed asset objects.
    pub fn objects_dir(&self) -> PathBuf {
        self.assets_root.join("objects")
    }
}
