use serde::{Deserialize, Serialize};

/// Platform ids show up both as JSON strings and as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    pub fn into_string(self) -> Option<String> {
        let id = match self {
            RawId::Text(text) => text.trim().to_owned(),
            RawId::Number(number) => number.to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

/// Envelope shared by every ajax endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl ApiEnvelope {
    /// The body, only when it is a non-empty JSON object.
    pub fn object_body(&self) -> Option<&serde_json::Value> {
        self.body
            .as_ref()
            .filter(|body| body.as_object().is_some_and(|obj| !obj.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
    /// Either a bare tag list or `{ "tags": [...] }`; see [`TagsField`].
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
    #[serde(default)]
    pub series_nav_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsField {
    List(Vec<TagEntry>),
    Wrapped { tags: Vec<TagEntry> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    Object { tag: String },
    Bare(String),
}

impl TagEntry {
    pub fn into_tag(self) -> String {
        match self {
            TagEntry::Object { tag } | TagEntry::Bare(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesNavData {
    #[serde(default)]
    pub series_id: Option<RawId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub prev: Option<NavLink>,
    #[serde(default)]
    pub next: Option<NavLink>,
}

/// Neighbor pointer inside `seriesNavData`. The platform usually sends a flat
/// object; nested `prev`/`next` are honored when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavLink {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub prev: Option<Box<NavLink>>,
    #[serde(default)]
    pub next: Option<Box<NavLink>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesListingBody {
    #[serde(default)]
    pub page: Option<SeriesListingPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesListingPage {
    #[serde(default)]
    pub series: Vec<SeriesListingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesListingEntry {
    #[serde(default)]
    pub id: Option<RawId>,
}
