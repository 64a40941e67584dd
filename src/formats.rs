use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub rel: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkContainer {
    pub link_count: usize,
    pub first: Anchor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkSnapshot {
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub containers: Vec<LinkContainer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentCandidate {
    #[serde(default)]
    pub tag: String,
    pub text: String,
    #[serde(default)]
    pub rendered: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub excluded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub candidates: Vec<ContentCandidate>,
    #[serde(default)]
    pub body_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitleSnapshot {
    #[serde(default)]
    pub document_title: String,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub body_title: Option<String>,
}

/// A link chosen by one of the locator strategies, already absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: Url,
    pub text: String,
}

/// One unit link harvested from the table-of-contents page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
}
