//! Primary-then-backups failover across the mirror set.
//!
//! Every operation walks its chain strictly in order and stops at the first
//! acceptable answer. The backup order is derived from the preferred-site
//! snapshot at the start of each call. Dropping a returned future cancels
//! the whole chain; no fallback runs after cancellation.
//!
//! Existence checks come in three flavours: primary only, full fallback, and
//! a bounded fast check that asks the two preferred backups before the
//! primary.

use super::backend::{MirrorBackend, MirrorSet, MirrorSite};
use super::identity::{extract_catalog_code, looks_like_catalog_id, normalize_candidates, reconcile_source_id};
use super::models::{Pagination, RawWork, SearchPage, SearchResponse, TrackNode, WorkDetails};
use crate::base::neterror::NetError;
use crate::http::retry::{with_retry, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default budget for [`CrawlerOrchestrator::has_work_fast`].
pub const DEFAULT_FAST_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Backups consulted by the fast existence check.
const FAST_CHECK_BACKUPS: usize = 2;

/// How a search was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTrace {
    pub keyword: String,
    pub primary_succeeded: bool,
    pub primary_has_works: bool,
    pub fallback_attempted: bool,
    pub fallback_used: bool,
    pub fallback_site: Option<MirrorSite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub response: SearchResponse,
    pub trace: SearchTrace,
}

/// Failover orchestrator over one [`MirrorSet`].
#[derive(Debug, Clone)]
pub struct CrawlerOrchestrator {
    mirrors: MirrorSet,
    preferred_site: Arc<AtomicI32>,
    lookup_retry: RetryConfig,
}

fn usable_details(works: Vec<RawWork>) -> Vec<WorkDetails> {
    works
        .into_iter()
        .filter(RawWork::is_usable)
        .map(RawWork::into_details_as_is)
        .collect()
}

/// Maps a backup's works for `queried_id`, dropping unusable records.
pub fn map_backup_works(works: Vec<RawWork>, queried_id: &str) -> Vec<WorkDetails> {
    works
        .into_iter()
        .filter(RawWork::is_usable)
        .map(|w| {
            let source_id = reconcile_source_id(&w, queried_id);
            w.into_details(source_id)
        })
        .collect()
}

/// Primary page with unusable records dropped. A reported total is reduced
/// by the number dropped but never falls below what is kept.
fn primary_response(result: SearchPage, page: i64) -> SearchResponse {
    let received = result.works.len() as i64;
    let works = usable_details(result.works);
    let kept = works.len() as i64;
    let pagination = match result.pagination {
        Some(p) => Pagination {
            total_count: (p.total_count - (received - kept)).max(kept),
            ..p
        },
        None => Pagination {
            total_count: kept,
            page_size: kept,
            page,
        },
    };
    SearchResponse { works, pagination }
}

/// Whether a primary page lists a work whose source id carries `code`.
fn primary_contains(page: &SearchPage, code: &str) -> bool {
    page.works.iter().any(|w| {
        w.source_id
            .as_deref()
            .and_then(extract_catalog_code)
            .is_some_and(|c| c == code)
    })
}

/// Whether a backup page, once reconciled, lists `code`.
fn backup_contains(page: SearchPage, code: &str) -> bool {
    map_backup_works(page.works, code)
        .iter()
        .any(|w| w.source_id.trim().eq_ignore_ascii_case(code))
}

fn usable_work(work: RawWork) -> Result<WorkDetails, NetError> {
    if work.is_usable() {
        Ok(work.into_details_as_is())
    } else {
        Err(NetError::InvalidResponse)
    }
}

impl CrawlerOrchestrator {
    pub fn new(mirrors: MirrorSet, preferred_site: Arc<AtomicI32>) -> Self {
        Self {
            mirrors,
            preferred_site,
            lookup_retry: RetryConfig::retry_once(),
        }
    }

    /// Orchestrator with a fixed preferred site.
    pub fn with_site(mirrors: MirrorSet, preferred_site: i32) -> Self {
        Self::new(mirrors, Arc::new(AtomicI32::new(preferred_site)))
    }

    /// Overrides the retry policy of primary-only lookups and existence
    /// checks.
    pub fn with_lookup_retry(mut self, retry: RetryConfig) -> Self {
        self.lookup_retry = retry;
        self
    }

    pub fn preferred_site(&self) -> i32 {
        self.preferred_site.load(Ordering::Acquire)
    }

    /// Shared preferred-site cell the settings listener publishes into.
    pub fn preferred_site_handle(&self) -> Arc<AtomicI32> {
        Arc::clone(&self.preferred_site)
    }

    fn backups(&self) -> Vec<&Arc<dyn MirrorBackend>> {
        self.mirrors.backups(self.preferred_site())
    }

    /// Primary followed by the backups in preferred order.
    fn chain(&self) -> Vec<&Arc<dyn MirrorBackend>> {
        let mut chain = vec![&self.mirrors.primary];
        chain.extend(self.backups());
        chain
    }

    /// Tries each backend in order; all failing yields the last error.
    async fn failover<'a, T, F>(
        &'a self,
        operation: &'static str,
        chain: Vec<&'a Arc<dyn MirrorBackend>>,
        mut call: F,
    ) -> Result<T, NetError>
    where
        F: FnMut(&'a Arc<dyn MirrorBackend>) -> BoxFuture<'a, Result<T, NetError>>,
    {
        let mut last_error = None;
        for backend in chain {
            match call(backend).await {
                Ok(value) => {
                    tracing::debug!(operation, site = %backend.site(), "mirror call succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(operation, site = %backend.site(), error = %e, "mirror call failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(NetError::ConnectionFailed))
    }

    /// Searches the primary; for catalog-id keywords with no primary hits,
    /// falls back to the backups.
    pub async fn search(&self, keyword: &str, page: i64) -> SearchResponse {
        self.search_with_trace(keyword, page).await.response
    }

    /// [`search`](Self::search) with a record of which mirror answered.
    pub async fn search_with_trace(&self, keyword: &str, page: i64) -> SearchOutcome {
        let normalized = keyword.trim().to_string();

        let primary = match self.mirrors.primary.search(&normalized, page).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(keyword = %normalized, error = %e, "primary search failed");
                None
            }
        };
        let primary_succeeded = primary.is_some();

        let primary_response = primary.map(|result| primary_response(result, page));

        let mut trace = SearchTrace {
            keyword: normalized.clone(),
            primary_succeeded,
            primary_has_works: false,
            fallback_attempted: false,
            fallback_used: false,
            fallback_site: None,
        };

        if let Some(response) = &primary_response {
            if !response.works.is_empty() {
                trace.primary_has_works = true;
                return SearchOutcome {
                    response: response.clone(),
                    trace,
                };
            }
        }

        let fallback_response = || {
            primary_response.clone().unwrap_or_else(|| SearchResponse {
                works: Vec::new(),
                pagination: Pagination::empty(page),
            })
        };

        if !looks_like_catalog_id(&normalized) {
            return SearchOutcome {
                response: fallback_response(),
                trace,
            };
        }

        trace.fallback_attempted = true;
        let spaced = format!(" {normalized}");
        for backup in self.backups() {
            let works = match backup.search(&spaced, page).await {
                Ok(result) => result.works,
                Err(e) => {
                    tracing::warn!(site = %backup.site(), keyword = %normalized, error = %e, "backup search failed");
                    continue;
                }
            };

            let mapped = map_backup_works(works, &normalized);
            if !mapped.is_empty() {
                tracing::debug!(site = %backup.site(), count = mapped.len(), "search served by backup");
                trace.fallback_used = true;
                trace.fallback_site = Some(backup.site());
                let count = mapped.len() as i64;
                return SearchOutcome {
                    response: SearchResponse {
                        works: mapped,
                        pagination: Pagination {
                            total_count: count,
                            page_size: count,
                            page,
                        },
                    },
                    trace,
                };
            }
        }

        SearchOutcome {
            response: fallback_response(),
            trace,
        }
    }

    /// Primary search only, retried once; `None` for a blank keyword or
    /// when the primary is unreachable.
    pub async fn search_primary_only(&self, keyword: &str, page: i64) -> Option<SearchResponse> {
        let normalized = keyword.trim();
        if normalized.is_empty() {
            return None;
        }
        let result = with_retry(&self.lookup_retry, || self.mirrors.primary.search(normalized, page))
            .await
            .ok()?;
        Some(primary_response(result, page))
    }

    /// Work details from the first mirror that answers.
    pub async fn get_work_details(&self, work_id: &str) -> Result<WorkDetails, NetError> {
        let id = work_id.trim();
        self.failover("work_details", self.chain(), |b| {
            async move { usable_work(b.get_work_details(id).await?) }.boxed()
        })
        .await
    }

    /// Track tree from the first mirror that answers.
    pub async fn get_tracks(&self, work_id: &str) -> Result<Vec<TrackNode>, NetError> {
        let id = work_id.trim();
        self.failover("tracks", self.chain(), |b| b.get_tracks(id)).await
    }

    /// Tries `site` first, then the full chain.
    pub async fn get_work_details_from_site(
        &self,
        site: MirrorSite,
        work_id: &str,
    ) -> Result<WorkDetails, NetError> {
        let id = work_id.trim();
        let pinned = self.mirrors.get(site);
        match pinned.get_work_details(id).await.and_then(usable_work) {
            Ok(details) => Ok(details),
            Err(e) => {
                tracing::warn!(site = %site, error = %e, "pinned work details failed, using full chain");
                self.get_work_details(id).await
            }
        }
    }

    /// Tries `site` first, then the full chain.
    pub async fn get_tracks_from_site(
        &self,
        site: MirrorSite,
        work_id: &str,
    ) -> Result<Vec<TrackNode>, NetError> {
        let id = work_id.trim();
        match self.mirrors.get(site).get_tracks(id).await {
            Ok(tracks) => Ok(tracks),
            Err(e) => {
                tracing::warn!(site = %site, error = %e, "pinned tracks failed, using full chain");
                self.get_tracks(id).await
            }
        }
    }

    /// First page for `keyword`, retried per the lookup policy.
    async fn lookup_search(&self, backend: &Arc<dyn MirrorBackend>, keyword: &str) -> Option<SearchPage> {
        match with_retry(&self.lookup_retry, || backend.search(keyword, 1)).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::debug!(site = %backend.site(), keyword = %keyword, error = %e, "existence lookup failed");
                None
            }
        }
    }

    /// Single attempt at a backup's first page for ` code`.
    async fn backup_search_once(&self, backup: &Arc<dyn MirrorBackend>, spaced: &str) -> Option<SearchPage> {
        match backup.search(spaced, 1).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::debug!(site = %backup.site(), keyword = %spaced, error = %e, "backup existence lookup failed");
                None
            }
        }
    }

    /// Plain then space-prefixed code against the primary.
    ///
    /// `Some(false)` only when both searches answered.
    async fn primary_has_code(&self, code: &str) -> Option<bool> {
        let spaced = format!(" {code}");
        let plain = self.lookup_search(&self.mirrors.primary, code).await;
        if plain.as_ref().is_some_and(|page| primary_contains(page, code)) {
            return Some(true);
        }
        let with_space = self.lookup_search(&self.mirrors.primary, &spaced).await;
        if with_space.as_ref().is_some_and(|page| primary_contains(page, code)) {
            return Some(true);
        }
        (plain.is_some() && with_space.is_some()).then_some(false)
    }

    /// Whether the primary knows the catalog code found in `source_id`.
    ///
    /// `None` when `source_id` holds no catalog code or either search failed.
    pub async fn has_work_on_primary(&self, source_id: &str) -> Option<bool> {
        let code = extract_catalog_code(source_id)?;
        self.primary_has_code(&code).await
    }

    /// Whether any mirror knows the catalog code found in `source_id`.
    ///
    /// Backups are tried once each. `None` when `source_id` holds no catalog
    /// code or no mirror answered.
    pub async fn has_work_with_fallback(&self, source_id: &str) -> Option<bool> {
        let code = extract_catalog_code(source_id)?;
        let spaced = format!(" {code}");
        let mut any_answered = false;

        for keyword in [code.as_str(), spaced.as_str()] {
            if let Some(page) = self.lookup_search(&self.mirrors.primary, keyword).await {
                any_answered = true;
                if primary_contains(&page, &code) {
                    return Some(true);
                }
            }
        }

        for backup in self.backups() {
            if let Some(page) = self.backup_search_once(backup, &spaced).await {
                any_answered = true;
                if backup_contains(page, &code) {
                    return Some(true);
                }
            }
        }

        any_answered.then_some(false)
    }

    /// Bounded existence check: the two preferred backups, then the primary,
    /// each search retried per the lookup policy.
    ///
    /// `None` when `source_id` holds no catalog code, nothing answered, or
    /// `timeout` elapsed first.
    pub async fn has_work_fast(&self, source_id: &str, timeout: Duration) -> Option<bool> {
        let code = extract_catalog_code(source_id)?;
        let spaced = format!(" {code}");

        let check = async {
            let mut any_answered = false;

            for backup in self.backups().into_iter().take(FAST_CHECK_BACKUPS) {
                if let Some(page) = self.lookup_search(backup, &spaced).await {
                    any_answered = true;
                    if backup_contains(page, &code) {
                        return Some(true);
                    }
                }
            }

            for keyword in [code.as_str(), spaced.as_str()] {
                if let Some(page) = self.lookup_search(&self.mirrors.primary, keyword).await {
                    any_answered = true;
                    if primary_contains(&page, &code) {
                        return Some(true);
                    }
                }
            }

            any_answered.then_some(false)
        };

        match tokio::time::timeout(timeout, check).await {
            Ok(found) => found,
            Err(_) => {
                tracing::debug!(code = %code, ?timeout, "fast existence check timed out");
                None
            }
        }
    }

    /// Catalog codes the preferred backup reports for `keyword`: own ids,
    /// original worknos and edition worknos.
    pub async fn backup_preferred_catalog_ids(&self, keyword: &str, page: i64) -> Vec<String> {
        let normalized = keyword.trim();
        if normalized.is_empty() {
            return Vec::new();
        }
        let Some(backup) = self.backups().into_iter().next() else {
            return Vec::new();
        };

        let result = match with_retry(&self.lookup_retry, || backup.search(normalized, page)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(site = %backup.site(), error = %e, "preferred backup search failed");
                return Vec::new();
            }
        };

        let codes = result.works.iter().flat_map(|w| {
            let editions = w.editions().iter().filter_map(|e| e.workno.as_deref());
            w.source_id
                .as_deref()
                .into_iter()
                .chain(w.original_workno.as_deref())
                .chain(editions)
                .filter_map(extract_catalog_code)
        });
        normalize_candidates(codes)
    }
}
