use std::cell::RefCell;
use std::collections::HashMap;

use crate::endpoints::Endpoints;
use crate::error::{FetchError, Result};
use crate::transport::Transport;

pub const BASE_URL: &str = "https://novels.test";

/// In-memory transport: canned bodies by URL, everything else is a 404.
#[derive(Default)]
pub struct StubTransport {
    responses: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl StubTransport {
    pub fn endpoints() -> Endpoints {
        Endpoints::new(BASE_URL).unwrap_or_else(|err| panic!("stub endpoints: {err}"))
    }

    pub fn with(mut self, url: String, body: impl Into<String>) -> Self {
        self.responses.insert(url, body.into());
        self
    }

    /// Registers metadata + preload page for a series member (or a standalone
    /// item when `series` is `None`).
    pub fn with_item(self, id: &str, series: Option<(&str, &str)>, nav: NavPointers) -> Self {
        let endpoints = Self::endpoints();
        let meta = item_payload(id, series, nav);
        let page = preload_page(id, &format!("Body of {id}"));
        self.with(endpoints.item_meta(id), meta)
            .with(endpoints.item_page(id), page)
    }

    pub fn with_listing(self, series_id: &str, ids: &[&str]) -> Self {
        let endpoints = Self::endpoints();
        let series: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "title": format!("Chapter {id}") }))
            .collect();
        let body = serde_json::json!({
            "error": false,
            "message": "",
            "body": { "page": { "series": series } }
        });
        self.with(endpoints.series_listing(series_id), body.to_string())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count_calls(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|call| *call == url).count()
    }
}

impl Transport for StubTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        self.calls.borrow_mut().push(url.to_owned());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: url.to_owned(),
                message: "HTTP 404 Not Found".to_owned(),
                retryable: false,
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NavPointers<'a> {
    pub prev: Option<&'a str>,
    pub next: Option<&'a str>,
    pub order: Option<u32>,
}

pub fn item_payload(id: &str, series: Option<(&str, &str)>, nav: NavPointers) -> String {
    let link = |target: Option<&str>| match target {
        Some(target) => serde_json::json!({ "id": target, "title": format!("Chapter {target}") }),
        None => serde_json::Value::Null,
    };
    let mut body = serde_json::json!({
        "id": id,
        "title": format!("Chapter {id}"),
        "userName": "writer",
        "createDate": "2024-05-01T00:00:00+09:00",
        "tags": { "tags": [{ "tag": "fantasy" }] },
    });
    if let (Some((series_id, series_title)), Some(obj)) = (series, body.as_object_mut()) {
        obj.insert(
            "seriesNavData".to_owned(),
            serde_json::json!({
                "seriesId": series_id,
                "title": series_title,
                "order": nav.order,
                "prev": link(nav.prev),
                "next": link(nav.next),
            }),
        );
    }
    serde_json::json!({ "error": false, "message": "", "body": body }).to_string()
}

pub fn preload_page(id: &str, content: &str) -> String {
    let data = serde_json::json!({ "novel": { id: { "content": content } } }).to_string();
    format!("<html><head><meta id=\"meta-preload-data\" content='{data}'></head><body></body></html>")
}
