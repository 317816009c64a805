//! Hot-swappable set of published APIs.
//!
//! # Responsibilities
//! - Hold the current snapshot of deployed APIs
//! - Find the API for a request (vhost, then longest base path)
//! - Publish, remove and replace APIs atomically
//!
//! # Design Decisions
//! - Copy-on-publish: writers build a new snapshot, readers never block
//! - In-flight requests keep the snapshot they started with
//! - APIs with no vhost are served under `*` for every host
//! - A vhost + base path belongs to whichever API claimed it first; a later
//!   claimant is refused with an error, never silently dropped

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::api::deployed::DeployedApi;
use crate::error::InitError;
use crate::observability::metrics;

pub const ANY_VHOST: &str = "*";

/// Immutable view of the published APIs.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    /// vhost → APIs ordered by descending base path length.
    by_vhost: HashMap<String, Vec<Arc<DeployedApi>>>,
    count: usize,
}

/// An API refused publication, with the reason.
pub type Rejected = (Arc<DeployedApi>, InitError);

impl RegistrySnapshot {
    /// Build from `apis` in order; an API whose vhost + base path is taken by
    /// an earlier one is returned as rejected.
    fn build(apis: impl IntoIterator<Item = Arc<DeployedApi>>) -> (Self, Vec<Rejected>) {
        let mut by_vhost: HashMap<String, Vec<Arc<DeployedApi>>> = HashMap::new();
        let mut rejected = Vec::new();
        let mut count = 0;

        for api in apis {
            let config = api.config();
            let entries = by_vhost.entry(config.vhost.clone()).or_default();
            if let Some(existing) = entries
                .iter()
                .find(|e| e.config().base_path == config.base_path)
            {
                let err = InitError::RouteConflict {
                    vhost: config.vhost.clone(),
                    base_path: config.base_path.clone(),
                    existing: format!(
                        "{} ({})",
                        existing.config().display_name(),
                        existing.config().uuid
                    ),
                };
                rejected.push((api.clone(), err));
                continue;
            }
            entries.push(api);
            count += 1;
        }

        for entries in by_vhost.values_mut() {
            entries.sort_by(|a, b| {
                b.config()
                    .base_path
                    .len()
                    .cmp(&a.config().base_path.len())
            });
        }
        (Self { by_vhost, count }, rejected)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn apis(&self) -> impl Iterator<Item = &Arc<DeployedApi>> {
        self.by_vhost.values().flatten()
    }

    /// The API with the longest base path that prefixes `path` on a
    /// segment boundary. Exact vhost first, then `*`.
    pub fn find(&self, vhost: &str, path: &str) -> Option<Arc<DeployedApi>> {
        let host = normalize_vhost(vhost);
        [host.as_str(), ANY_VHOST]
            .iter()
            .filter_map(|h| self.by_vhost.get(*h))
            .find_map(|entries| {
                entries
                    .iter()
                    .find(|api| base_path_matches(&api.config().base_path, path))
            })
            .cloned()
    }
}

fn normalize_vhost(vhost: &str) -> String {
    let host = match vhost.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => vhost,
    };
    host.to_ascii_lowercase()
}

fn base_path_matches(base_path: &str, path: &str) -> bool {
    match path.strip_prefix(base_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || base_path.is_empty(),
        None => false,
    }
}

#[derive(Debug, Default)]
pub struct ApiRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, vhost: &str, path: &str) -> Option<Arc<DeployedApi>> {
        self.current.load().find(vhost, path)
    }

    pub fn get(&self, uuid: &str) -> Option<Arc<DeployedApi>> {
        self.current
            .load()
            .apis()
            .find(|api| api.config().uuid == uuid)
            .cloned()
    }

    /// Publish or redeploy one API (matched by uuid). Fails, leaving the
    /// registry untouched, when another API already serves its base path.
    pub fn publish(&self, api: Arc<DeployedApi>) -> Result<(), InitError> {
        let uuid = api.config().uuid.clone();
        let mut rejected = self.swap(true, |current| {
            current
                .apis()
                .filter(|existing| existing.config().uuid != uuid)
                .cloned()
                .chain(std::iter::once(api.clone()))
                .collect()
        });
        // The current set is conflict-free, so only `api` can be refused
        if let Some((_, err)) = rejected.pop() {
            return Err(err);
        }
        tracing::info!(api = %api.config().display_name(), uuid = %uuid, "API published");
        Ok(())
    }

    /// Remove an API; returns whether it was published.
    pub fn remove(&self, uuid: &str) -> bool {
        let existed = self.get(uuid).is_some();
        if existed {
            self.swap(false, |current| {
                current
                    .apis()
                    .filter(|api| api.config().uuid != uuid)
                    .cloned()
                    .collect()
            });
            tracing::info!(uuid = %uuid, "API removed");
        }
        existed
    }

    /// Replace the whole set. Currently published APIs whose source file is
    /// listed in `retain_sources` survive (their new version failed to build)
    /// and keep their routes. Among `apis`, earlier entries win a route; the
    /// APIs refused for a conflict are returned.
    pub fn replace_all(&self, apis: Vec<Arc<DeployedApi>>, retain_sources: &[PathBuf]) -> Vec<Rejected> {
        self.swap(false, |current| {
            current
                .apis()
                .filter(|api| api.source().is_some_and(|s| retain_sources.contains(s)))
                .cloned()
                .chain(apis.iter().cloned())
                .collect()
        })
    }

    /// Swap in the snapshot built from `next`. With `atomic`, any refusal
    /// keeps the current snapshot instead.
    fn swap<F>(&self, atomic: bool, next: F) -> Vec<Rejected>
    where
        F: Fn(&RegistrySnapshot) -> Vec<Arc<DeployedApi>>,
    {
        let mut rejected = Vec::new();
        let previous = self.current.rcu(|current| {
            let (snapshot, refused) = RegistrySnapshot::build(next(current));
            rejected = refused;
            if atomic && !rejected.is_empty() {
                Arc::clone(current)
            } else {
                Arc::new(snapshot)
            }
        });
        drop(previous);
        metrics::record_published_apis(self.len());

        for (api, err) in &rejected {
            tracing::warn!(api = %api.config().display_name(), error = %err, "API not published");
        }
        rejected
    }
}
