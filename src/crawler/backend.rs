//! The uniform mirror contract and backend ordering.

use super::models::{RawWork, SearchPage, TrackNode};
use crate::base::neterror::NetError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Identity of a mirror deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorSite {
    /// The main catalog API; always tried first.
    Primary,
    Asmr100,
    Asmr200,
    Asmr300,
}

impl MirrorSite {
    /// Backup sites in declaration order.
    pub const BACKUPS: [MirrorSite; 3] = [Self::Asmr100, Self::Asmr200, Self::Asmr300];

    /// Persisted site code. The primary has none and reports `0`.
    pub fn code(self) -> i32 {
        match self {
            Self::Primary => 0,
            Self::Asmr100 => 100,
            Self::Asmr200 => 200,
            Self::Asmr300 => 300,
        }
    }

    /// Backup site for a persisted code; anything else is the primary.
    pub fn from_code(code: i32) -> Self {
        match code {
            100 => Self::Asmr100,
            200 => Self::Asmr200,
            300 => Self::Asmr300,
            _ => Self::Primary,
        }
    }

    pub fn is_backup(self) -> bool {
        self != Self::Primary
    }
}

impl fmt::Display for MirrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("asmr.one"),
            site => write!(f, "asmr-{}", site.code()),
        }
    }
}

/// The three operations every mirror adapter implements.
///
/// Adapters map their native payloads into [`SearchPage`], [`RawWork`] and
/// [`TrackNode`]; they never retry or fall back on their own.
pub trait MirrorBackend: Send + Sync {
    fn site(&self) -> MirrorSite;

    /// Keyword search; `keyword` is passed through verbatim, including any
    /// leading space.
    fn search<'a>(&'a self, keyword: &'a str, page: i64) -> BoxFuture<'a, Result<SearchPage, NetError>>;

    fn get_work_details<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<RawWork, NetError>>;

    fn get_tracks<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<Vec<TrackNode>, NetError>>;
}

impl<B: MirrorBackend + ?Sized> MirrorBackend for Arc<B> {
    fn site(&self) -> MirrorSite {
        (**self).site()
    }

    fn search<'a>(&'a self, keyword: &'a str, page: i64) -> BoxFuture<'a, Result<SearchPage, NetError>> {
        (**self).search(keyword, page)
    }

    fn get_work_details<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<RawWork, NetError>> {
        (**self).get_work_details(work_id)
    }

    fn get_tracks<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<Vec<TrackNode>, NetError>> {
        (**self).get_tracks(work_id)
    }
}

/// Backup sites ordered for a preferred-site code.
///
/// The preferred site comes first; unknown codes behave like `200`.
pub fn backup_order(preferred_site: i32) -> [MirrorSite; 3] {
    use MirrorSite::*;
    match preferred_site {
        100 => [Asmr100, Asmr200, Asmr300],
        300 => [Asmr300, Asmr200, Asmr100],
        _ => [Asmr200, Asmr100, Asmr300],
    }
}

/// The four adapters, one per site.
#[derive(Clone)]
pub struct MirrorSet {
    pub primary: Arc<dyn MirrorBackend>,
    pub asmr100: Arc<dyn MirrorBackend>,
    pub asmr200: Arc<dyn MirrorBackend>,
    pub asmr300: Arc<dyn MirrorBackend>,
}

impl MirrorSet {
    pub fn get(&self, site: MirrorSite) -> &Arc<dyn MirrorBackend> {
        match site {
            MirrorSite::Primary => &self.primary,
            MirrorSite::Asmr100 => &self.asmr100,
            MirrorSite::Asmr200 => &self.asmr200,
            MirrorSite::Asmr300 => &self.asmr300,
        }
    }

    /// Backups in failover order for `preferred_site`.
    pub fn backups(&self, preferred_site: i32) -> Vec<&Arc<dyn MirrorBackend>> {
        backup_order(preferred_site)
            .into_iter()
            .map(|site| self.get(site))
            .collect()
    }
}

impl fmt::Debug for MirrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorSet").finish_non_exhaustive()
    }
}
