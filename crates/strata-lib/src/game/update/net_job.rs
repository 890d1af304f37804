//! Batched network jobs: one job per pipeline stage, fanning out many
//! concurrent transfers and aggregating failures into a single error that
//! names every failed file.

use super::download::download_to_path;
use super::types::ProgressReporter;
use crate::error::{Error, Result, TransferFailure};
use crate::game::cache::{ContentCache, EntryId};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where a transfer lands: a tracked cache entry or a plain file.
#[derive(Debug, Clone)]
pub enum Destination {
    Cache(EntryId),
    File(PathBuf),
}

/// One file transfer inside a job. URLs are tried in order; the first
/// success wins.
#[derive(Debug, Clone)]
pub struct NetAction {
    pub name: String,
    pub urls: Vec<String>,
    pub dest: Destination,
    pub expected_sha1: Option<String>,
    pub expected_size: Option<u64>,
}

impl NetAction {
    /// Transfer into a cache entry.
    pub fn cache(name: impl Into<String>, url: String, entry: EntryId) -> Self {
        Self::cache_multi(name, vec![url], entry)
    }

    /// Transfer into a cache entry, with mirror fallback.
    pub fn cache_multi(name: impl Into<String>, urls: Vec<String>, entry: EntryId) -> Self {
        Self {
            name: name.into(),
            urls,
            dest: Destination::Cache(entry),
            expected_sha1: None,
            expected_size: None,
        }
    }

    /// Transfer straight to a file, with optional checksum and size.
    pub fn file(
        name: impl Into<String>,
        url: String,
        path: PathBuf,
        expected_sha1: Option<String>,
        expected_size: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            urls: vec![url],
            dest: Destination::File(path),
            expected_sha1,
            expected_size,
        }
    }
}

/// An ordered batch of transfers executed as one unit. Within the job there
/// is no ordering guarantee between transfers; the job only reports terminal
/// success once every transfer finished, and failure aggregates every failed
/// file instead of failing one at a time.
pub struct NetJob {
    name: String,
    actions: Vec<NetAction>,
}

impl NetJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, action: NetAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every transfer with bounded concurrency. The cache is locked only
    /// to resolve destinations and record completed fetches, never across a
    /// transfer. The cache index is saved once at the end of the job.
    pub async fn run(
        self,
        client: &Client,
        cache: &Arc<Mutex<ContentCache>>,
        concurrency: usize,
        reporter: &Arc<dyn ProgressReporter>,
    ) -> Result<()> {
        // No two transfers may target the same destination file.
        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for action in self.actions {
            let dest_path = match &action.dest {
                Destination::Cache(id) => cache.lock().await.entry(*id).full_path().to_path_buf(),
                Destination::File(path) => path.clone(),
            };
            if seen.insert(dest_path.clone()) {
                actions.push((action, dest_path));
            }
        }

        let total = actions.len();
        if total == 0 {
            return Ok(());
        }
        log::info!("starting job '{}' with {} files", self.name, total);

        let total_bytes: u64 = if actions.iter().all(|(a, _)| a.expected_size.is_some()) {
            actions.iter().filter_map(|(a, _)| a.expected_size).sum()
        } else {
            0
        };
        let done_bytes = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        reporter.set_step_count(0, Some(total as u32));

        let failures: Vec<TransferFailure> = stream::iter(actions)
            .map(|(action, dest_path)| {
                let client = client.clone();
                let cache = Arc::clone(cache);
                let reporter = Arc::clone(reporter);
                let done_bytes = Arc::clone(&done_bytes);
                let completed = Arc::clone(&completed);

                async move {
                    let result = run_action(
                        &client,
                        &cache,
                        &action,
                        &dest_path,
                        &done_bytes,
                        total_bytes,
                        reporter.as_ref(),
                    )
                    .await;

                    let count = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.set_step_count(count as u32, Some(total as u32));

                    match result {
                        Ok(()) => None,
                        Err(e) => Some(TransferFailure {
                            name: action.name.clone(),
                            reason: format!("{:#}", e),
                        }),
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        if let Err(e) = cache.lock().await.save() {
            log::warn!("failed to save the cache index: {}", e);
        }

        if failures.is_empty() {
            log::info!("job '{}' finished, {} files", self.name, total);
            Ok(())
        } else {
            Err(Error::Network {
                job: self.name,
                failures,
            })
        }
    }
}

async fn run_action(
    client: &Client,
    cache: &Arc<Mutex<ContentCache>>,
    action: &NetAction,
    dest_path: &std::path::Path,
    done_bytes: &Arc<AtomicU64>,
    total_bytes: u64,
    reporter: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    // a fresh cache entry short-circuits the download
    if let Destination::Cache(id) = action.dest {
        if !cache.lock().await.entry(id).is_stale() {
            log::debug!("cache entry for {} is fresh, skipping", action.name);
            return Ok(());
        }
    }

    let on_chunk = |n: u64| {
        let done = done_bytes.fetch_add(n, Ordering::SeqCst) + n;
        reporter.update_bytes(done, total_bytes);
    };
    let on_chunk: &(dyn Fn(u64) + Send + Sync) = &on_chunk;

    let mut last_error = None;
    for url in &action.urls {
        match download_to_path(
            client,
            url,
            dest_path,
            action.expected_sha1.as_deref(),
            Some(on_chunk),
        )
        .await
        {
            Ok((sha1, size)) => {
                if let Destination::Cache(id) = action.dest {
                    cache.lock().await.mark_fresh(id, sha1, size);
                }
                return Ok(());
            }
            Err(e) => {
                log::warn!("failed to fetch {} from {}: {:#}", action.name, url, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no download URLs for {}", action.name)))
}
