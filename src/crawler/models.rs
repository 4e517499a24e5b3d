//! Mirror payloads.
//!
//! Mirrors disagree on field names and nullability. [`RawWork`] and
//! [`TrackNode`] accept every variant seen in the wild; the orchestrator
//! only ever hands out the normalized [`WorkDetails`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Circle {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
}

/// Another-language release of the same work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageEdition {
    pub lang: Option<String>,
    pub label: Option<String>,
    pub workno: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pagination {
    pub total_count: i64,
    pub page_size: i64,
    pub page: i64,
}

impl Pagination {
    /// Zero-count pagination reported when the primary mirror failed.
    pub fn empty(page: i64) -> Self {
        Self {
            total_count: 0,
            page_size: 20,
            page,
        }
    }
}

/// A work as any mirror returns it; every field may be absent or null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawWork {
    pub id: Option<i64>,
    pub source_id: Option<String>,
    pub original_workno: Option<String>,
    pub language_editions: Option<Vec<LanguageEdition>>,
    pub title: Option<String>,
    pub circle: Option<Circle>,
    /// Circle name on mirrors that flatten it.
    pub name: Option<String>,
    pub vas: Option<Vec<Artist>>,
    pub tags: Option<Vec<Tag>>,
    pub duration: Option<i64>,
    #[serde(rename = "mainCoverUrl")]
    pub main_cover_url: Option<String>,
    #[serde(rename = "main_cover_url")]
    pub main_cover_url_snake: Option<String>,
    pub main_cover_url_small: Option<String>,
    pub main_cover_url_large: Option<String>,
    pub dl_count: Option<i64>,
    pub price: Option<i64>,
}

impl RawWork {
    /// Numeric id, `0` when absent.
    pub fn numeric_id(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    /// Usable results carry a positive id.
    pub fn is_usable(&self) -> bool {
        self.numeric_id() > 0
    }

    pub fn editions(&self) -> &[LanguageEdition] {
        self.language_editions.as_deref().unwrap_or_default()
    }

    /// Normalizes into [`WorkDetails`] with the given source id.
    pub fn into_details(self, source_id: String) -> WorkDetails {
        let circle = self.circle.or_else(|| {
            self.name
                .filter(|n| !n.trim().is_empty())
                .map(|name| Circle { name })
        });
        let main_cover_url = [
            self.main_cover_url,
            self.main_cover_url_snake,
            self.main_cover_url_small,
            self.main_cover_url_large,
        ]
        .into_iter()
        .flatten()
        .next()
        .unwrap_or_default();

        WorkDetails {
            id: self.id.unwrap_or(0),
            source_id,
            original_workno: self.original_workno,
            language_editions: self.language_editions.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            circle,
            vas: self.vas.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            duration: self.duration.unwrap_or(0),
            main_cover_url,
            dl_count: self.dl_count.unwrap_or(0),
            price: self.price.unwrap_or(0),
        }
    }

    /// Normalizes, keeping the mirror's own source id.
    pub fn into_details_as_is(self) -> WorkDetails {
        let source_id = self.source_id.clone().unwrap_or_default();
        self.into_details(source_id)
    }
}

/// Normalized work record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkDetails {
    pub id: i64,
    pub source_id: String,
    pub original_workno: Option<String>,
    pub language_editions: Vec<LanguageEdition>,
    pub title: String,
    pub circle: Option<Circle>,
    pub vas: Vec<Artist>,
    pub tags: Vec<Tag>,
    pub duration: i64,
    #[serde(rename = "mainCoverUrl")]
    pub main_cover_url: String,
    pub dl_count: i64,
    pub price: i64,
}

/// Raw search page; backup mirrors omit pagination.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchPage {
    pub works: Vec<RawWork>,
    pub pagination: Option<Pagination>,
}

/// Search result handed to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub works: Vec<WorkDetails>,
    pub pagination: Pagination,
}

/// Node of a work's track tree: a folder (with children) or a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTrackNode")]
pub struct TrackNode {
    pub title: Option<String>,
    pub children: Option<Vec<TrackNode>>,
    pub duration: Option<f64>,
    #[serde(rename = "streamUrl")]
    pub stream_url: Option<String>,
    #[serde(rename = "mediaDownloadUrl")]
    pub media_download_url: Option<String>,
}

impl TrackNode {
    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    /// Media files in depth-first order.
    pub fn files(&self) -> Vec<&TrackNode> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a TrackNode>) {
        match &self.children {
            Some(children) => children.iter().for_each(|c| c.collect_files(out)),
            None => out.push(self),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTrackNode {
    title: Option<String>,
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
    children: Option<Vec<TrackNode>>,
    child: Option<Vec<TrackNode>>,
    items: Option<Vec<TrackNode>>,
    tracks: Option<Vec<TrackNode>>,
    duration: Option<f64>,
    #[serde(rename = "streamUrl")]
    stream_url_camel: Option<String>,
    #[serde(rename = "mediaStreamUrl")]
    media_stream_url: Option<String>,
    stream_url: Option<String>,
    #[serde(rename = "mediaDownloadUrl")]
    media_download_url: Option<String>,
    #[serde(rename = "mediaUrl")]
    media_url_camel: Option<String>,
    media_url: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url_camel: Option<String>,
    download_url: Option<String>,
    url: Option<String>,
}

impl From<RawTrackNode> for TrackNode {
    fn from(raw: RawTrackNode) -> Self {
        Self {
            title: raw.title.or(raw.name).or(raw.file_name),
            children: raw
                .children
                .or(raw.child)
                .or(raw.items)
                .or(raw.tracks),
            duration: raw.duration,
            stream_url: raw
                .stream_url_camel
                .or(raw.media_stream_url)
                .or(raw.stream_url),
            media_download_url: raw
                .media_download_url
                .or(raw.media_url_camel)
                .or(raw.media_url)
                .or(raw.download_url_camel)
                .or(raw.download_url)
                .or(raw.url),
        }
    }
}
