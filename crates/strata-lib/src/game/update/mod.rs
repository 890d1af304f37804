//! The update pipeline: an ordered sequence of asynchronous stages that
//! brings an installation up to date. Stages run strictly one after
//! another; each stage's network job fans out concurrent transfers
//! internally and reports one aggregate result. A failing stage terminates
//! the run before the next stage starts.

pub mod assets;
pub mod download;
pub mod fmllibs;
pub mod forge;
pub mod net_job;
pub mod types;

pub use net_job::{Destination, NetAction, NetJob};
pub use types::{ProgressReporter, SilentProgressReporter, UpdateSpec};

use crate::error::{Error, Result};
use crate::game::cache::ContentCache;
use crate::game::config::Endpoints;
use crate::game::meta::MetaIndex;
use crate::game::profile::{
    reapply, LibraryHint, Patch, PatchDocument, RuntimeProfile, VersionPatchStack,
};
use self::fmllibs::legacy_libraries_for;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const MINECRAFT_UID: &str = "net.minecraft";
const LWJGL_UID: &str = "org.lwjgl";
const FORGE_UID: &str = "net.minecraftforge";

/// Drives one update run for one instance.
pub struct UpdatePipeline {
    spec: UpdateSpec,
    endpoints: Endpoints,
    client: Client,
    reporter: Arc<dyn ProgressReporter>,
    cache: Arc<Mutex<ContentCache>>,
    index: MetaIndex,
    stack: VersionPatchStack,
    profile: Option<RuntimeProfile>,
}

impl UpdatePipeline {
    /// Build a pipeline: opens the download cache and loads the instance's
    /// patch stack from disk.
    pub fn new(
        spec: UpdateSpec,
        endpoints: Endpoints,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let cache = ContentCache::load(&spec.cache_root)?;
        let stack = VersionPatchStack::load(&spec.patches_dir())?;
        Ok(Self {
            spec,
            endpoints,
            client,
            reporter,
            cache: Arc::new(Mutex::new(cache)),
            index: MetaIndex::new(),
            stack,
            profile: None,
        })
    }

    pub fn stack(&self) -> &VersionPatchStack {
        &self.stack
    }

    /// The profile produced by the most recent rebuild, if any.
    pub fn profile(&self) -> Option<&RuntimeProfile> {
        self.profile.as_ref()
    }

    /// Run all stages in order. Either every stage completes or the run
    /// halts at the first failure; the terminal outcome is also pushed
    /// through the progress reporter.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = std::fs::create_dir_all(&self.spec.minecraft_root) {
            let err = Error::structural(format!(
                "failed to create the folder for minecraft binaries: {e}"
            ));
            self.reporter.done(false, Some(&err.to_string()));
            return Err(err);
        }

        let result = self.run_stages().await;
        match &result {
            Ok(()) => self.reporter.done(true, Some("instance is up to date")),
            Err(e) => self.reporter.done(false, Some(&e.to_string())),
        }
        result
    }

    async fn run_stages(&mut self) -> Result<()> {
        self.ensure_core_components().await?;
        self.resolve_libraries().await?;
        self.resolve_legacy_libraries().await?;
        self.resolve_assets().await?;
        Ok(())
    }

    fn rebuild_profile(&mut self) -> Result<()> {
        self.profile = Some(reapply(&self.stack)?);
        Ok(())
    }

    fn current_profile(&self) -> Result<RuntimeProfile> {
        self.profile
            .clone()
            .ok_or_else(|| Error::structural("the runtime profile has not been built"))
    }

    /// Stage 1: make sure the stack carries the minecraft and lwjgl
    /// patches, installing them from the metadata service if not, then
    /// build the profile.
    ///
    /// Old instances predate these patches, which is why they are
    /// bootstrapped here instead of failing outright.
    async fn ensure_core_components(&mut self) -> Result<()> {
        let has_minecraft = self.stack.patch_by_id(MINECRAFT_UID).is_some();
        let has_lwjgl = self.stack.patch_by_id(LWJGL_UID).is_some();
        if has_minecraft && has_lwjgl {
            return self.rebuild_profile();
        }

        self.reporter
            .set_message("Installing required version components...");
        let meta_dir = self.spec.meta_dir.clone();

        if !self.index.is_local_loaded() {
            if let Err(e) = self.index.load_local(&meta_dir).await {
                log::debug!("no usable local meta index: {}", e);
            }
        }
        if (!self.index.has_uid(MINECRAFT_UID) || !self.index.has_uid(LWJGL_UID))
            && !self.index.is_remote_loaded()
        {
            if let Err(e) = self
                .index
                .load_remote(&self.client, &self.endpoints, &meta_dir)
                .await
            {
                log::warn!("failed to refresh the meta index: {}", e);
            }
        }

        if !has_minecraft {
            let version = self.spec.intended_version_id.clone();
            self.install_component(MINECRAFT_UID, &version).await?;
        }
        if !has_lwjgl {
            let version = self.spec.lwjgl_version.clone();
            self.install_component(LWJGL_UID, &version).await?;
        }

        self.rebuild_profile()
    }

    /// Load one version document, local copy first, remote as fallback, and
    /// install it as a patch. Both sources failing is fatal.
    async fn install_component(&mut self, uid: &str, version: &str) -> Result<()> {
        let meta_dir = self.spec.meta_dir.clone();
        let list_id = self.index.get_list(uid);

        if !self.index.list(list_id).is_local_loaded() {
            if let Err(local) = self.index.load_list_local(list_id, &meta_dir).await {
                log::debug!("local versions list for {} unusable: {}", uid, local);
                if let Err(remote) = self
                    .index
                    .load_list_remote(list_id, &self.client, &self.endpoints, &meta_dir)
                    .await
                {
                    log::error!("remote versions list for {} failed: {}", uid, remote);
                    return Err(Error::structural(format!(
                        "unable to load the versions list for {uid}"
                    )));
                }
            }
        }

        let needs_document = self
            .index
            .list(list_id)
            .version(version)
            .map(|v| !v.is_loaded())
            .unwrap_or(true);
        if needs_document {
            if let Err(local) = self
                .index
                .load_version_local(list_id, version, &meta_dir)
                .await
            {
                log::debug!("local document for {} {} unusable: {}", uid, version, local);
                if let Err(remote) = self
                    .index
                    .load_version_remote(list_id, version, &self.client, &self.endpoints, &meta_dir)
                    .await
                {
                    log::error!("remote document for {} {} failed: {}", uid, version, remote);
                    return Err(Error::structural(format!(
                        "unable to load the wanted version of {uid} ({version})"
                    )));
                }
            }
        }

        let doc = self
            .index
            .list(list_id)
            .version(version)
            .and_then(|v| v.data.clone())
            .ok_or_else(|| {
                Error::structural(format!("version document for {uid} {version} is incomplete"))
            })?;
        self.install_patch(doc)
    }

    /// Write a version document into the instance's patches directory and
    /// append it to the stack.
    fn install_patch(&mut self, doc: PatchDocument) -> Result<()> {
        let patches_dir = self.spec.patches_dir();
        std::fs::create_dir_all(&patches_dir)?;
        let path = patches_dir.join(format!("{}.json", doc.id));
        let data = serde_json::to_vec_pretty(&doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, data)?;
        log::info!("installed version patch {:?}", path);
        self.stack.append(Patch::from_document(doc))
    }

    /// Stage 2: rebuild the profile and resolve the client jar, jar mods
    /// and every library into cache entries, downloading whatever is stale
    /// as one batched job. Local-only libraries and unresolvable jar mods
    /// are fatal, with every missing file named.
    async fn resolve_libraries(&mut self) -> Result<()> {
        self.reporter.set_message("Getting the library files...");
        self.rebuild_profile()?;
        let profile = self.current_profile()?;

        let mut job = NetJob::new(format!(
            "Libraries for {}",
            self.spec.intended_version_id
        ));

        // client jar for the effective version
        {
            let local_path = format!(
                "{}/{}.jar",
                profile.minecraft_version, profile.minecraft_version
            );
            let mut cache = self.cache.lock().await;
            let entry = cache.resolve_entry("versions", &local_path);
            if cache.entry(entry).is_stale() {
                let url = format!("{}{}", self.endpoints.versions_base, local_path);
                job.add(NetAction::cache(local_path, url, entry));
            }
        }

        // jar mods: downloadable by absolute URL, or already present locally
        let mut broken_mods = Vec::new();
        for jar_mod in &profile.jar_mods {
            match &jar_mod.absolute_url {
                Some(url) if !url.is_empty() => {
                    let mut cache = self.cache.lock().await;
                    let entry = cache.resolve_entry("jarmods", &jar_mod.name);
                    if cache.entry(entry).is_stale() {
                        job.add(NetAction::cache(jar_mod.name.clone(), url.clone(), entry));
                    }
                }
                _ => {
                    if !self.spec.jar_mods_dir().join(&jar_mod.name).is_file() {
                        broken_mods.push(jar_mod.display_name().to_string());
                    }
                }
            }
        }
        if !broken_mods.is_empty() {
            return Err(Error::ResourceMissing {
                what: "the following jar mods are neither available locally, nor is there \
                       any information on how to fetch them"
                    .to_string(),
                files: broken_mods,
            });
        }

        // libraries, partitioned by resolution hint
        let mut broken_local = Vec::new();
        let mut forge_xz = Vec::new();
        for library in &profile.libraries {
            match library.hint {
                LibraryHint::Local => {
                    if !library.files_exist(&self.spec.libraries_dir()) {
                        broken_local.extend(library.files());
                    }
                }
                LibraryHint::Normal | LibraryHint::ForgePackXz => {
                    for variant in library.expand(&self.endpoints.libraries_base) {
                        let mut cache = self.cache.lock().await;
                        let entry = cache.resolve_entry("libraries", &variant.storage);
                        if !cache.entry(entry).is_stale() {
                            continue;
                        }
                        if library.hint == LibraryHint::ForgePackXz {
                            forge_xz.push((variant.storage, entry));
                        } else {
                            job.add(NetAction::cache(
                                variant.storage.clone(),
                                variant.url,
                                entry,
                            ));
                        }
                    }
                }
            }
        }
        if !broken_local.is_empty() {
            return Err(Error::ResourceMissing {
                what: "some libraries marked as 'local' are missing their jar files; \
                       you'll have to correct this problem manually"
                    .to_string(),
                files: broken_local,
            });
        }

        if !forge_xz.is_empty() {
            let mirrors = forge::mirror_bases(
                &self.client,
                &self.endpoints.forge_mirror_list,
                &self.endpoints.libraries_base,
            )
            .await;
            for (storage, entry) in forge_xz {
                let urls = mirrors.iter().map(|m| format!("{m}{storage}")).collect();
                job.add(NetAction::cache_multi(storage, urls, entry));
            }
        }

        if !job.is_empty() {
            job.run(
                &self.client,
                &self.cache,
                self.spec.concurrency,
                &self.reporter,
            )
            .await?;
        }

        self.copy_jar_mods(&profile).await
    }

    /// Put downloaded jar mods into the instance once the job finished.
    async fn copy_jar_mods(&self, profile: &RuntimeProfile) -> Result<()> {
        let downloadable: Vec<_> = profile.jar_mods.iter().filter(|jm| jm.has_url()).collect();
        if downloadable.is_empty() {
            return Ok(());
        }

        let dir = self.spec.jar_mods_dir();
        std::fs::create_dir_all(&dir)?;
        for jar_mod in downloadable {
            let source = {
                let mut cache = self.cache.lock().await;
                let entry = cache.resolve_entry("jarmods", &jar_mod.name);
                cache.entry(entry).full_path().to_path_buf()
            };
            let dest = dir.join(&jar_mod.name);
            if dest.exists() {
                std::fs::remove_file(&dest).map_err(|e| Error::Copy {
                    what: "jar mod",
                    file: jar_mod.name.clone(),
                    reason: e.to_string(),
                })?;
            }
            std::fs::copy(&source, &dest).map_err(|e| Error::Copy {
                what: "jar mod",
                file: jar_mod.name.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Stage 3: legacy FML auxiliary libraries. Only runs when the profile
    /// carries the legacy-FML trait, the version has a non-empty auxiliary
    /// table and a forge patch is actually present.
    async fn resolve_legacy_libraries(&mut self) -> Result<()> {
        let profile = self.current_profile()?;
        if !profile.has_trait("legacyFML") {
            return Ok(());
        }
        let libs = legacy_libraries_for(&self.spec.intended_version_id);
        if libs.is_empty() {
            return Ok(());
        }

        self.reporter.set_message("Checking for FML libraries...");
        if self.stack.patch_by_id(FORGE_UID).is_none() {
            log::debug!("legacy FML trait present but no forge patch, skipping");
            return Ok(());
        }

        let lib_dir = self.spec.legacy_libraries_dir();
        let missing: Vec<_> = libs
            .iter()
            .filter(|l| !lib_dir.join(l.filename).is_file())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        self.reporter.set_message("Downloading FML libraries...");
        let mut job = NetJob::new("FML libraries");
        for lib in &missing {
            let mut cache = self.cache.lock().await;
            let entry = cache.resolve_entry("fmllibs", lib.filename);
            if cache.entry(entry).is_stale() {
                let base = if lib.ours {
                    &self.endpoints.fml_ours_base
                } else {
                    &self.endpoints.fml_upstream_base
                };
                let url = format!("{}{}", base, lib.filename);
                job.add(NetAction::cache(lib.filename.to_string(), url, entry));
            }
        }
        if !job.is_empty() {
            job.run(
                &self.client,
                &self.cache,
                self.spec.concurrency,
                &self.reporter,
            )
            .await?;
        }

        self.reporter
            .set_message("Copying FML libraries into the instance...");
        std::fs::create_dir_all(&lib_dir).map_err(|e| Error::Copy {
            what: "legacy library folder",
            file: lib_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let total = missing.len() as u32;
        for (index, lib) in missing.iter().enumerate() {
            let source = {
                let mut cache = self.cache.lock().await;
                let entry = cache.resolve_entry("fmllibs", lib.filename);
                cache.entry(entry).full_path().to_path_buf()
            };
            std::fs::copy(&source, lib_dir.join(lib.filename)).map_err(|e| Error::Copy {
                what: "legacy library",
                file: lib.filename.to_string(),
                reason: e.to_string(),
            })?;
            self.reporter.set_step_count(index as u32 + 1, Some(total));
        }
        Ok(())
    }

    /// Stage 4: fetch the asset index named by the profile (evict and retry
    /// once on parse failure), then download exactly the objects that are
    /// missing or size-mismatched on disk.
    async fn resolve_assets(&mut self) -> Result<()> {
        let profile = self.current_profile()?;
        self.reporter.set_message("Updating assets index...");

        let assets_id = profile.assets_id().to_string();
        let index_rel = format!("{assets_id}.json");
        let index_url = format!("{}{}", self.endpoints.asset_indexes_base, index_rel);

        self.fetch_asset_index_if_stale(&index_rel, &index_url)
            .await?;
        let index_path = {
            let mut cache = self.cache.lock().await;
            let entry = cache.resolve_entry("asset_indexes", &index_rel);
            cache.entry(entry).full_path().to_path_buf()
        };

        let index = match assets::load_index(&index_path) {
            Ok(index) => index,
            Err(e) => {
                // a stale or corrupt cached index gets evicted and fetched once more
                log::warn!("failed to read the assets index, refetching: {}", e);
                {
                    let mut cache = self.cache.lock().await;
                    let entry = cache.resolve_entry("asset_indexes", &index_rel);
                    cache.evict_entry(entry);
                }
                self.fetch_asset_index_if_stale(&index_rel, &index_url)
                    .await?;
                assets::load_index(&index_path)?
            }
        };

        let objects_dir = self.spec.objects_dir();
        let missing = assets::missing_objects(&index, &objects_dir);
        if missing.is_empty() {
            log::debug!("assets for {} are complete", assets_id);
            return Ok(());
        }

        self.reporter.set_message("Getting the asset files...");
        let mut job = NetJob::new(format!("Assets for {assets_id}"));
        for (name, object) in missing {
            let rel = object.relative_path();
            job.add(NetAction::file(
                name.to_string(),
                format!("{}{}", self.endpoints.resources_base, rel),
                objects_dir.join(&rel),
                Some(object.hash.clone()),
                Some(object.size),
            ));
        }
        job.run(
            &self.client,
            &self.cache,
            self.spec.concurrency,
            &self.reporter,
        )
        .await
    }

    async fn fetch_asset_index_if_stale(&self, index_rel: &str, index_url: &str) -> Result<()> {
        let (entry, stale) = {
            let mut cache = self.cache.lock().await;
            let entry = cache.resolve_entry("asset_indexes", index_rel);
            (entry, cache.entry(entry).is_stale())
        };
        if !stale {
            return Ok(());
        }
        let mut job = NetJob::new(format!("Asset index {index_rel}"));
        job.add(NetAction::cache(
            index_rel.to_string(),
            index_url.to_string(),
            entry,
        ));
        job.run(
            &self.client,
            &self.cache,
            self.spec.concurrency,
            &self.reporter,
        )
        .await
    }
}
