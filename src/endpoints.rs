use url::Url;

use crate::error::{FetchError, Result};

/// Path fragment of the canonical item URL. Persisted headers carry it and the
/// directory scan looks for it verbatim.
pub const ITEM_URL_MARKER: &str = "novel/show.php?id=";

/// Upper bound on series members requested from the listing endpoint.
pub const SERIES_PAGE_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|err| FetchError::Config(format!("parse base_url `{base_url}`: {err}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn item_meta(&self, id: &str) -> String {
        self.join(&format!("ajax/novel/{id}"))
    }

    pub fn item_page(&self, id: &str) -> String {
        self.join(&format!("{ITEM_URL_MARKER}{id}"))
    }

    pub fn series_listing(&self, series_id: &str) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("{}ajax/novel/series/{series_id}", self.base.path()));
        url.query_pairs_mut()
            .append_pair("limit", &SERIES_PAGE_LIMIT.to_string())
            .append_pair("last_order", "0")
            .append_pair("order_by", "asc");
        url.to_string()
    }

    /// URL written into persisted headers; same shape as [`Self::item_page`].
    pub fn canonical_item_url(&self, id: &str) -> String {
        self.item_page(id)
    }

    fn join(&self, relative: &str) -> String {
        format!("{}{relative}", self.base)
    }
}

/// Accepts a bare id or a pasted item URL and returns the id.
pub fn item_id_from_input(input: &str) -> Option<String> {
    let input = input.trim();
    let id = match input.split_once(ITEM_URL_MARKER) {
        Some((_, rest)) => rest.split(['&', '#']).next().unwrap_or_default(),
        None => input,
    };
    (!id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit())).then(|| id.to_owned())
}
