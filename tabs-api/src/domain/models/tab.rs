use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use super::{OwnerId, TabId};

/// Triage state of a tab. Discarded tabs are never returned by vector search.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TabStatus {
    #[default]
    Unprocessed,
    Kept,
    Discarded,
}

/// A saved URL and everything enrichment has learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: TabId,
    pub owner_id: OwnerId,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Extracted page text, capped at the configured length
    pub content: Option<String>,
    pub screenshot_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub full_screenshot_url: Option<String>,
    /// `None` until the embedding stage has succeeded at least once
    pub embedding: Option<Vec<f32>>,
    pub status: TabStatus,
    pub date_added: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Tab {
    /// A freshly imported tab with nothing but its URL.
    pub fn new(id: impl Into<TabId>, owner_id: impl Into<OwnerId>, url: impl Into<String>) -> Self {
        let url = url.into();
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            domain: domain_of(&url),
            url,
            title: None,
            summary: None,
            category: None,
            tags: vec![],
            content: None,
            screenshot_url: None,
            thumbnail_url: None,
            full_screenshot_url: None,
            embedding: None,
            status: TabStatus::Unprocessed,
            date_added: now,
            updated_at: now,
        }
    }

    pub fn is_vector_searchable(&self) -> bool {
        self.embedding.is_some() && self.status != TabStatus::Discarded
    }
}

/// Host part of a URL without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// Fields produced by one or more enrichment stages.
///
/// `None` means "not produced this run" and leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub content: Option<String>,
    pub screenshot_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub full_screenshot_url: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl TabUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the produced fields onto `tab`.
    pub fn apply_to(&self, tab: &mut Tab) {
        macro_rules! put {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field { tab.$field = Some(value.clone()); })*
            };
        }
        put!(
            title,
            summary,
            category,
            content,
            screenshot_url,
            thumbnail_url,
            full_screenshot_url,
            embedding
        );
        if let Some(tags) = &self.tags {
            tab.tags = tags.clone();
        }
        if !self.is_empty() {
            tab.updated_at = OffsetDateTime::now_utc();
        }
    }
}
