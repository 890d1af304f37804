//! In-memory mirror of the remote component catalog.
//!
//! Three levels: index -> version list -> version. The index and every list
//! carry independent local-loaded/remote-loaded flags; loading parses a
//! stored or fetched document and merges it into the existing structure
//! without discarding unrelated data. Lists live in an arena and callers
//! hold stable [`ListId`] handles across refreshes.

use super::types::{IndexDocument, VersionListDocument, VersionRecordDocument};
use crate::error::{Error, Result};
use crate::game::config::Endpoints;
use crate::game::profile::{PatchDocument, Reference};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::fs;

const INDEX_FILE: &str = "index.json";

/// Stable handle to a version list inside the index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(usize);

/// One version of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaVersion {
    pub uid: String,
    pub version: String,
    pub release_type: Option<String>,
    pub release_time: Option<DateTime<Utc>>,
    pub requires: Vec<Reference>,
    /// Full version document, present once loaded from disk or network.
    pub data: Option<PatchDocument>,
}

impl MetaVersion {
    fn from_record(uid: &str, record: VersionRecordDocument) -> Self {
        Self {
            uid: record.uid.unwrap_or_else(|| uid.to_string()),
            version: record.version,
            release_type: record.release_type,
            release_time: record.release_time,
            requires: record.requires,
            data: None,
        }
    }

    /// Raw sortable form of the release time.
    pub fn raw_time(&self) -> i64 {
        self.release_time.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Field-by-field update from a record for the same version key.
    fn merge_record(&mut self, record: VersionRecordDocument) {
        if record.release_type.is_some() {
            self.release_type = record.release_type;
        }
        if record.release_time.is_some() {
            self.release_time = record.release_time;
        }
        if !record.requires.is_empty() {
            self.requires = record.requires;
        }
    }
}

/// Lazily populated list of versions for one component UID.
#[derive(Debug)]
pub struct VersionList {
    uid: String,
    name: Option<String>,
    local_loaded: bool,
    remote_loaded: bool,
    versions: Vec<MetaVersion>,
    lookup: HashMap<String, usize>,
    latest: Option<usize>,
    recommended: Option<usize>,
}

impl VersionList {
    fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: None,
            local_loaded: false,
            remote_loaded: false,
            versions: Vec::new(),
            lookup: HashMap::new(),
            latest: None,
            recommended: None,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn humanly_readable(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uid)
    }

    pub fn is_local_loaded(&self) -> bool {
        self.local_loaded
    }

    pub fn is_remote_loaded(&self) -> bool {
        self.remote_loaded
    }

    pub fn is_loaded(&self) -> bool {
        self.local_loaded && self.remote_loaded
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn versions(&self) -> impl Iterator<Item = &MetaVersion> {
        self.versions.iter()
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.lookup.contains_key(version)
    }

    pub fn version(&self, version: &str) -> Option<&MetaVersion> {
        self.lookup.get(version).map(|&idx| &self.versions[idx])
    }

    /// The version with the most recent timestamp.
    pub fn latest_stable(&self) -> Option<&MetaVersion> {
        self.latest.map(|idx| &self.versions[idx])
    }

    /// The most recent version whose type tag is "release".
    pub fn recommended(&self) -> Option<&MetaVersion> {
        self.recommended.map(|idx| &self.versions[idx])
    }

    /// Reconcile a freshly parsed list document into this list. Existing
    /// versions are updated field-by-field, new ones inserted, versions
    /// only known locally are preserved. Latest/recommended are maintained
    /// incrementally.
    pub fn merge(&mut self, doc: VersionListDocument) {
        if doc.name.is_some() && doc.name != self.name {
            self.name = doc.name;
        }

        if self.versions.is_empty() {
            self.set_versions(doc.versions);
            return;
        }

        for record in doc.versions {
            match self.lookup.get(&record.version) {
                Some(&idx) => self.versions[idx].merge_record(record),
                None => {
                    let version = MetaVersion::from_record(&self.uid, record);
                    let idx = self.versions.len();
                    self.lookup.insert(version.version.clone(), idx);
                    self.versions.push(version);
                    self.note_added(idx);
                }
            }
        }
    }

    /// Attach (or update) the full document for one version. Creates the
    /// record when the list has never seen the version.
    pub fn attach_data(&mut self, version: &str, data: PatchDocument) {
        let record = VersionRecordDocument {
            uid: Some(data.id.clone()),
            version: version.to_string(),
            release_type: data.release_type.clone(),
            release_time: data.release_time,
            requires: data.requires.clone(),
        };
        let idx = match self.lookup.get(version) {
            Some(&idx) => {
                self.versions[idx].merge_record(record);
                idx
            }
            None => {
                let meta = MetaVersion::from_record(&self.uid, record);
                let idx = self.versions.len();
                self.lookup.insert(version.to_string(), idx);
                self.versions.push(meta);
                self.note_added(idx);
                idx
            }
        };
        self.versions[idx].data = Some(data);
    }

    fn set_versions(&mut self, records: Vec<VersionRecordDocument>) {
        let mut versions: Vec<MetaVersion> = records
            .into_iter()
            .map(|r| MetaVersion::from_record(&self.uid, r))
            .collect();
        versions.sort_by_key(|v| std::cmp::Reverse(v.raw_time()));

        self.lookup.clear();
        self.latest = None;
        self.recommended = None;
        for (idx, version) in versions.iter().enumerate() {
            self.lookup.insert(version.version.clone(), idx);
        }
        self.latest = (!versions.is_empty()).then_some(0);
        self.recommended = versions
            .iter()
            .position(|v| v.release_type.as_deref() == Some("release"));
        self.versions = versions;
    }

    fn note_added(&mut self, idx: usize) {
        let time = self.versions[idx].raw_time();
        let newer_than = |current: Option<usize>| {
            current
                .map(|c| time > self.versions[c].raw_time())
                .unwrap_or(true)
        };
        if newer_than(self.latest) {
            self.latest = Some(idx);
        }
        if self.versions[idx].release_type.as_deref() == Some("release")
            && newer_than(self.recommended)
        {
            self.recommended = Some(idx);
        }
    }
}

/// The component catalog: UID -> version list, with load-state tracking.
#[derive(Debug, Default)]
pub struct MetaIndex {
    local_loaded: bool,
    remote_loaded: bool,
    lists: Vec<VersionList>,
    by_uid: HashMap<String, ListId>,
    /// UIDs enumerated by a merged index document.
    catalog: BTreeSet<String>,
}

impl MetaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_local_loaded(&self) -> bool {
        self.local_loaded
    }

    pub fn is_remote_loaded(&self) -> bool {
        self.remote_loaded
    }

    /// Fully loaded means both the on-disk and the network copy were seen.
    pub fn is_loaded(&self) -> bool {
        self.local_loaded && self.remote_loaded
    }

    /// Whether the catalog has enumerated this UID.
    pub fn has_uid(&self, uid: &str) -> bool {
        self.catalog.contains(uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.catalog.iter().map(|s| s.as_str())
    }

    /// Handle for the version list of `uid`, created on first access.
    /// Handles are stable across refreshes; the same UID always yields the
    /// same id.
    pub fn get_list(&mut self, uid: &str) -> ListId {
        if let Some(&id) = self.by_uid.get(uid) {
            return id;
        }
        let id = ListId(self.lists.len());
        self.lists.push(VersionList::new(uid));
        self.by_uid.insert(uid.to_string(), id);
        id
    }

    pub fn list(&self, id: ListId) -> &VersionList {
        &self.lists[id.0]
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut VersionList {
        &mut self.lists[id.0]
    }

    /// Additive merge of an index document: new UIDs are inserted, known
    /// ones keep their list handle and gain a display name at most.
    pub fn merge_index(&mut self, doc: IndexDocument) {
        for entry in doc.index {
            self.catalog.insert(entry.uid.clone());
            let id = self.get_list(&entry.uid);
            if entry.name.is_some() {
                self.lists[id.0].name = entry.name;
            }
        }
    }

    /// Parse the stored catalog document and merge it in.
    pub async fn load_local(&mut self, meta_dir: &Path) -> Result<()> {
        let path = meta_dir.join(INDEX_FILE);
        let data = fs::read_to_string(&path).await?;
        let doc: IndexDocument = serde_json::from_str(&data).map_err(|e| Error::Parse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.merge_index(doc);
        self.local_loaded = true;
        log::debug!("meta index loaded locally, {} uids", self.catalog.len());
        Ok(())
    }

    /// Fetch the catalog document, mirror it to disk and merge it in.
    pub async fn load_remote(
        &mut self,
        client: &Client,
        endpoints: &Endpoints,
        meta_dir: &Path,
    ) -> Result<()> {
        let url = format!("{}{}", endpoints.meta_base, INDEX_FILE);
        let doc: IndexDocument =
            fetch_and_mirror(client, &url, &meta_dir.join(INDEX_FILE)).await?;
        self.merge_index(doc);
        self.remote_loaded = true;
        log::debug!("meta index loaded remotely, {} uids", self.catalog.len());
        Ok(())
    }

    pub async fn load_list_local(&mut self, id: ListId, meta_dir: &Path) -> Result<()> {
        let path = meta_dir.join(format!("{}.json", self.lists[id.0].uid));
        let data = fs::read_to_string(&path).await?;
        let doc: VersionListDocument =
            serde_json::from_str(&data).map_err(|e| Error::Parse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let list = &mut self.lists[id.0];
        list.merge(doc);
        list.local_loaded = true;
        Ok(())
    }

    pub async fn load_list_remote(
        &mut self,
        id: ListId,
        client: &Client,
        endpoints: &Endpoints,
        meta_dir: &Path,
    ) -> Result<()> {
        let uid = self.lists[id.0].uid.clone();
        let url = format!("{}{}.json", endpoints.meta_base, uid);
        let doc: VersionListDocument =
            fetch_and_mirror(client, &url, &meta_dir.join(format!("{uid}.json"))).await?;
        let list = &mut self.lists[id.0];
        list.merge(doc);
        list.remote_loaded = true;
        Ok(())
    }

    pub async fn load_version_local(
        &mut self,
        id: ListId,
        version: &str,
        meta_dir: &Path,
    ) -> Result<()> {
        let uid = self.lists[id.0].uid.clone();
        let path = meta_dir.join(&uid).join(format!("{version}.json"));
        let data = fs::read_to_string(&path).await?;
        let doc: PatchDocument = serde_json::from_str(&data).map_err(|e| Error::Parse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.lists[id.0].attach_data(version, doc);
        Ok(())
    }

    pub async fn load_version_remote(
        &mut self,
        id: ListId,
        version: &str,
        client: &Client,
        endpoints: &Endpoints,
        meta_dir: &Path,
    ) -> Result<()> {
        let uid = self.lists[id.0].uid.clone();
        let url = format!("{}{}/{}.json", endpoints.meta_base, uid, version);
        let path = meta_dir.join(&uid).join(format!("{version}.json"));
        let doc: PatchDocument = fetch_and_mirror(client, &url, &path).await?;
        self.lists[id.0].attach_data(version, doc);
        Ok(())
    }
}

/// GET a JSON document, write the raw bytes to the local mirror so the next
/// local load succeeds, and parse it.
async fn fetch_and_mirror<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    path: &Path,
) -> Result<T> {
    log::debug!("fetching {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    let parsed: T = serde_json::from_str(&body).map_err(|e| Error::Parse {
        file: url.to_string(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, body.as_bytes()).await?;
    Ok(parsed)
}
