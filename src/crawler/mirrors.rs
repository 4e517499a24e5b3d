//! HTTP adapters for the mirror APIs.
//!
//! All four deployments expose `search/{keyword}`, `work/{id}` and
//! `tracks/{id}` under an `/api/` base. The primary and the backups differ in
//! the search query they accept, so each gets its own adapter over a shared
//! [`MirrorClient`].

use super::backend::{MirrorBackend, MirrorSet, MirrorSite};
use super::models::{RawWork, SearchPage, TrackNode};
use crate::base::neterror::NetError;
use crate::http::HttpFetcher;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

pub const PRIMARY_BASE_URL: &str = "https://api.asmr.one/api/";
pub const ASMR100_BASE_URL: &str = "https://api.asmr-100.com/api/";
pub const ASMR200_BASE_URL: &str = "https://api.asmr-200.com/api/";
pub const ASMR300_BASE_URL: &str = "https://api.asmr-300.com/api/";

/// Page size the backups are asked for.
const BACKUP_PAGE_SIZE: &str = "20";

/// Default API base for `site`.
pub fn default_base_url(site: MirrorSite) -> &'static str {
    match site {
        MirrorSite::Primary => PRIMARY_BASE_URL,
        MirrorSite::Asmr100 => ASMR100_BASE_URL,
        MirrorSite::Asmr200 => ASMR200_BASE_URL,
        MirrorSite::Asmr300 => ASMR300_BASE_URL,
    }
}

/// Base URL, fetcher and headers shared by every mirror adapter.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    base_url: Url,
    fetcher: HttpFetcher,
    headers: HeaderMap,
}

impl MirrorClient {
    pub fn new(base_url: &str, fetcher: HttpFetcher) -> Result<Self, NetError> {
        let base_url = Url::parse(base_url).map_err(|_| NetError::InvalidUrl)?;
        if base_url.cannot_be_a_base() {
            return Err(NetError::InvalidUrl);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.asmr.one"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.asmr.one/"));

        Ok(Self {
            base_url,
            fetcher,
            headers,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base/segments...`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, NetError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NetError::InvalidUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn search_endpoint(&self, keyword: &str, page: i64) -> Result<Url, NetError> {
        let mut url = self.endpoint(&["search", keyword])?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    pub fn work_url(&self, work_id: &str) -> Result<Url, NetError> {
        self.endpoint(&["work", work_id.trim()])
    }

    pub fn tracks_url(&self, work_id: &str) -> Result<Url, NetError> {
        self.endpoint(&["tracks", work_id.trim()])
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, NetError> {
        self.fetcher.get_json(url.as_str(), &self.headers).await
    }
}

/// Adapter for the main catalog API.
#[derive(Debug, Clone)]
pub struct PrimaryMirror {
    client: MirrorClient,
}

impl PrimaryMirror {
    pub fn new(base_url: &str, fetcher: HttpFetcher) -> Result<Self, NetError> {
        Ok(Self {
            client: MirrorClient::new(base_url, fetcher)?,
        })
    }

    pub fn client(&self) -> &MirrorClient {
        &self.client
    }

    /// Newest releases first.
    pub fn search_url(&self, keyword: &str, page: i64) -> Result<Url, NetError> {
        let mut url = self.client.search_endpoint(keyword, page)?;
        url.query_pairs_mut()
            .append_pair("order", "release")
            .append_pair("sort", "desc");
        Ok(url)
    }
}

impl MirrorBackend for PrimaryMirror {
    fn site(&self) -> MirrorSite {
        MirrorSite::Primary
    }

    fn search<'a>(&'a self, keyword: &'a str, page: i64) -> BoxFuture<'a, Result<SearchPage, NetError>> {
        async move {
            let url = self.search_url(keyword, page)?;
            tracing::debug!(site = %MirrorSite::Primary, keyword = %keyword, page, "mirror search");
            self.client.get(url).await
        }
        .boxed()
    }

    fn get_work_details<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<RawWork, NetError>> {
        async move {
            let url = self.client.work_url(work_id)?;
            tracing::debug!(site = %MirrorSite::Primary, work_id = %work_id, "mirror work details");
            self.client.get(url).await
        }
        .boxed()
    }

    fn get_tracks<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<Vec<TrackNode>, NetError>> {
        async move {
            let url = self.client.tracks_url(work_id)?;
            tracing::debug!(site = %MirrorSite::Primary, work_id = %work_id, "mirror tracks");
            self.client.get(url).await
        }
        .boxed()
    }
}

/// Adapter for one of the backup deployments.
///
/// Backups index translations separately and only return them when asked.
#[derive(Debug, Clone)]
pub struct BackupMirror {
    site: MirrorSite,
    client: MirrorClient,
}

impl BackupMirror {
    pub fn new(site: MirrorSite, base_url: &str, fetcher: HttpFetcher) -> Result<Self, NetError> {
        Ok(Self {
            site,
            client: MirrorClient::new(base_url, fetcher)?,
        })
    }

    pub fn client(&self) -> &MirrorClient {
        &self.client
    }

    pub fn search_url(&self, keyword: &str, page: i64) -> Result<Url, NetError> {
        let mut url = self.client.search_endpoint(keyword, page)?;
        url.query_pairs_mut()
            .append_pair("order", "create_date")
            .append_pair("sort", "desc")
            .append_pair("pageSize", BACKUP_PAGE_SIZE)
            .append_pair("subtitle", "0")
            .append_pair("includeTranslationWorks", "true");
        Ok(url)
    }
}

impl MirrorBackend for BackupMirror {
    fn site(&self) -> MirrorSite {
        self.site
    }

    fn search<'a>(&'a self, keyword: &'a str, page: i64) -> BoxFuture<'a, Result<SearchPage, NetError>> {
        async move {
            let url = self.search_url(keyword, page)?;
            tracing::debug!(site = %self.site, keyword = %keyword, page, "mirror search");
            self.client.get(url).await
        }
        .boxed()
    }

    fn get_work_details<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<RawWork, NetError>> {
        async move {
            let url = self.client.work_url(work_id)?;
            tracing::debug!(site = %self.site, work_id = %work_id, "mirror work details");
            self.client.get(url).await
        }
        .boxed()
    }

    fn get_tracks<'a>(&'a self, work_id: &'a str) -> BoxFuture<'a, Result<Vec<TrackNode>, NetError>> {
        async move {
            let url = self.client.tracks_url(work_id)?;
            tracing::debug!(site = %self.site, work_id = %work_id, "mirror tracks");
            self.client.get(url).await
        }
        .boxed()
    }
}

impl MirrorSet {
    /// HTTP adapters for every site at their default base URLs.
    pub fn over_http(fetcher: &HttpFetcher) -> Result<Self, NetError> {
        Self::over_http_with_bases(fetcher, &HashMap::new())
    }

    /// HTTP adapters; sites present in `bases` use that base URL instead of
    /// the default.
    pub fn over_http_with_bases(
        fetcher: &HttpFetcher,
        bases: &HashMap<MirrorSite, String>,
    ) -> Result<Self, NetError> {
        let base = |site| {
            bases
                .get(&site)
                .map(String::as_str)
                .unwrap_or_else(|| default_base_url(site))
        };
        let backup = |site| -> Result<Arc<dyn MirrorBackend>, NetError> {
            Ok(Arc::new(BackupMirror::new(site, base(site), fetcher.clone())?))
        };
        Ok(Self {
            primary: Arc::new(PrimaryMirror::new(base(MirrorSite::Primary), fetcher.clone())?),
            asmr100: backup(MirrorSite::Asmr100)?,
            asmr200: backup(MirrorSite::Asmr200)?,
            asmr300: backup(MirrorSite::Asmr300)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::GaiResolver;
    use crate::http::FetcherConfig;
    use crate::sni::SniBypassManager;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(
            Arc::new(GaiResolver::new()),
            SniBypassManager::default(),
            FetcherConfig::default(),
        )
    }

    fn backup(site: MirrorSite) -> BackupMirror {
        BackupMirror::new(site, default_base_url(site), fetcher()).unwrap()
    }

    #[test]
    fn test_primary_search_url() {
        let primary = PrimaryMirror::new(PRIMARY_BASE_URL, fetcher()).unwrap();
        let url = primary.search_url("RJ392613", 2).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.asmr.one/api/search/RJ392613?page=2&order=release&sort=desc"
        );
        assert_eq!(primary.site(), MirrorSite::Primary);
    }

    #[test]
    fn test_backup_search_url_encodes_leading_space() {
        let url = backup(MirrorSite::Asmr200).search_url(" RJ392613", 1).unwrap();
        assert_eq!(url.path(), "/api/search/%20RJ392613");
        assert_eq!(
            url.query(),
            Some("page=1&order=create_date&sort=desc&pageSize=20&subtitle=0&includeTranslationWorks=true")
        );
    }

    #[test]
    fn test_search_url_escapes_slash() {
        let url = backup(MirrorSite::Asmr100).search_url("a/b", 1).unwrap();
        assert_eq!(url.path(), "/api/search/a%2Fb");
    }

    #[test]
    fn test_work_and_tracks_urls() {
        let m = backup(MirrorSite::Asmr300);
        assert_eq!(m.site(), MirrorSite::Asmr300);
        assert_eq!(
            m.client().work_url(" 392613 ").unwrap().as_str(),
            "https://api.asmr-300.com/api/work/392613"
        );
        assert_eq!(
            m.client().tracks_url("392613").unwrap().as_str(),
            "https://api.asmr-300.com/api/tracks/392613"
        );
    }

    #[test]
    fn test_invalid_base() {
        assert!(MirrorClient::new("mailto:x@y", fetcher()).is_err());
        assert!(MirrorClient::new("::", fetcher()).is_err());
        assert!(PrimaryMirror::new("not a url", fetcher()).is_err());
    }

    #[test]
    fn test_base_overrides() {
        let bases = HashMap::from([(MirrorSite::Asmr300, "http://127.0.0.1:9/api".to_string())]);
        let set = MirrorSet::over_http_with_bases(&fetcher(), &bases).unwrap();
        assert_eq!(set.get(MirrorSite::Asmr300).site(), MirrorSite::Asmr300);
        assert_eq!(set.get(MirrorSite::Primary).site(), MirrorSite::Primary);

        let bad = HashMap::from([(MirrorSite::Asmr100, "not a url".to_string())]);
        assert!(MirrorSet::over_http_with_bases(&fetcher(), &bad).is_err());
    }
}
