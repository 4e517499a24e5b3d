//! Multi-mirror catalog crawler.
//!
//! - [`MirrorBackend`]: the three-operation contract each mirror adapter implements
//! - [`PrimaryMirror`] / [`BackupMirror`]: adapters for the mirror HTTP APIs
//! - [`CrawlerOrchestrator`]: primary-then-backups failover with identity reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = CrawlerOrchestrator::with_site(MirrorSet::over_http(&fetcher)?, 200);
//! let result = orchestrator.search("RJ392613", 1).await;
//! ```

mod backend;
mod identity;
mod mirrors;
mod models;
mod orchestrator;

pub use backend::{backup_order, MirrorBackend, MirrorSet, MirrorSite};
pub use identity::{
    extract_catalog_code, looks_like_catalog_id, normalize_candidates, reconcile_source_id,
    work_matches_catalog_id,
};
pub use mirrors::{
    default_base_url, BackupMirror, MirrorClient, PrimaryMirror, ASMR100_BASE_URL, ASMR200_BASE_URL, ASMR300_BASE_URL,
    PRIMARY_BASE_URL,
};
pub use models::{
    Artist, Circle, LanguageEdition, Pagination, RawWork, SearchPage, SearchResponse, Tag,
    TrackNode, WorkDetails,
};
pub use orchestrator::{
    map_backup_works, CrawlerOrchestrator, SearchOutcome, SearchTrace, DEFAULT_FAST_CHECK_TIMEOUT,
};
