use scraper::{Html, Selector};

use crate::error::ExtractionFailure;
use crate::formats::{ApiEnvelope, ItemBody, SeriesNavData, TagsField};
use crate::item::{Item, SeriesLink};

const PRELOAD_SELECTOR: &str = "meta#meta-preload-data";
const CONTENT_SELECTOR: &str = "#novel-content";

/// Builds an [`Item`] from the item-detail API payload and the rendered page.
pub fn extract(
    item_id: &str,
    api_payload: &str,
    page_body: &str,
) -> Result<Item, ExtractionFailure> {
    let body = parse_item_body(api_payload)?;
    extract_from_body(item_id, body, page_body)
}

/// [`extract`] for a payload body that was already parsed.
pub fn extract_from_body(
    item_id: &str,
    body: ItemBody,
    page_body: &str,
) -> Result<Item, ExtractionFailure> {
    let title = body
        .title
        .clone()
        .ok_or(ExtractionFailure::MissingField("title"))?;
    let author = body
        .user_name
        .clone()
        .ok_or(ExtractionFailure::MissingField("userName"))?;

    let text = extract_body_text(item_id, page_body).ok_or(ExtractionFailure::NoContent)?;

    let series_link = series_link(item_id, &body);
    let tags = normalize_tags(body.tags.as_ref());

    Ok(Item {
        id: item_id.to_owned(),
        title,
        author,
        body: text,
        tags,
        created_at: body.create_date.unwrap_or_default(),
        series_link,
    })
}

/// Parses the API envelope and returns its body. A missing or empty body is the
/// stale-session signal.
pub fn parse_item_body(api_payload: &str) -> Result<ItemBody, ExtractionFailure> {
    let envelope: ApiEnvelope = serde_json::from_str(api_payload)
        .map_err(|err| ExtractionFailure::MalformedPayload(err.to_string()))?;
    let Some(body) = envelope.object_body() else {
        if envelope.error && !envelope.message.is_empty() {
            tracing::debug!(message = %envelope.message, "api reported an error");
        }
        return Err(ExtractionFailure::NotAuthenticatedOrExpired);
    };
    serde_json::from_value(body.clone())
        .map_err(|err| ExtractionFailure::MalformedPayload(err.to_string()))
}

/// `seriesNavData` of `body`, or `None` when absent or unreadable.
pub fn series_nav(body: &ItemBody) -> Option<SeriesNavData> {
    let raw = body.series_nav_data.as_ref()?;
    if raw.is_null() {
        return None;
    }
    match serde_json::from_value::<SeriesNavData>(raw.clone()) {
        Ok(nav) => Some(nav),
        Err(err) => {
            tracing::warn!(%err, "unreadable seriesNavData; ignoring");
            None
        }
    }
}

fn series_link(item_id: &str, body: &ItemBody) -> Option<SeriesLink> {
    let nav = series_nav(body)?;
    let series_id = nav.series_id.and_then(|id| id.into_string());
    let series_title = nav.title.filter(|title| !title.trim().is_empty());
    match (series_id, series_title) {
        (Some(series_id), Some(series_title)) => Some(SeriesLink {
            series_id,
            series_title,
            order: nav.order,
        }),
        _ => {
            tracing::warn!(id = %item_id, "seriesNavData lacks seriesId or title; treating as standalone");
            None
        }
    }
}

/// Accepts a bare tag list or a `{ "tags": [...] }` wrapper. Anything else,
/// including a missing field, yields no tags.
pub fn normalize_tags(raw: Option<&serde_json::Value>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_value::<TagsField>(raw.clone()) {
        Ok(TagsField::List(entries)) | Ok(TagsField::Wrapped { tags: entries }) => {
            entries.into_iter().map(|entry| entry.into_tag()).collect()
        }
        Err(_) => Vec::new(),
    }
}

fn extract_body_text(item_id: &str, page_body: &str) -> Option<String> {
    let document = Html::parse_document(page_body);
    preload_content(&document, item_id).or_else(|| container_text(&document))
}

fn preload_content(document: &Html, item_id: &str) -> Option<String> {
    let selector = Selector::parse(PRELOAD_SELECTOR).ok()?;
    let raw = document.select(&selector).next()?.value().attr("content")?;
    let data: serde_json::Value = match serde_json::from_str(raw) {
        Ok(data) => data,
        Err(err) => {
            tracing::debug!(%err, "preload data is not json");
            return None;
        }
    };
    let content = data
        .get("novel")?
        .get(item_id)?
        .get("content")?
        .as_str()?;
    (!content.trim().is_empty()).then(|| content.to_owned())
}

fn container_text(document: &Html) -> Option<String> {
    let selector = Selector::parse(CONTENT_SELECTOR).ok()?;
    let container = document.select(&selector).next()?;
    let text = container
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(body: serde_json::Value) -> String {
        serde_json::json!({ "error": false, "message": "", "body": body }).to_string()
    }

    fn preload_page(id: &str, content: &str) -> String {
        let data = serde_json::json!({ "novel": { id: { "content": content } } }).to_string();
        format!(
            "<html><head><meta name=\"preload-data\" id=\"meta-preload-data\" content='{data}'></head><body></body></html>"
        )
    }

    #[test]
    fn extracts_metadata_and_preload_content() -> anyhow::Result<()> {
        let payload = api(serde_json::json!({
            "id": "500",
            "title": "Chapter One",
            "userName": "writer",
            "createDate": "2024-01-02T03:04:05+09:00",
            "tags": { "tags": [{ "tag": "fantasy" }, { "tag": "slow burn" }] },
            "seriesNavData": { "seriesId": 9, "title": "Saga", "order": 1, "prev": null, "next": { "id": "501" } }
        }));
        let item = extract("500", &payload, &preload_page("500", "first line\nsecond line"))?;

        assert_eq!(item.title, "Chapter One");
        assert_eq!(item.author, "writer");
        assert_eq!(item.body, "first line\nsecond line");
        assert_eq!(item.created_at, "2024-01-02T03:04:05+09:00");
        assert_eq!(item.tags, vec!["fantasy", "slow burn"]);
        assert_eq!(
            item.series_link,
            Some(SeriesLink {
                series_id: "9".to_owned(),
                series_title: "Saga".to_owned(),
                order: Some(1),
            })
        );
        Ok(())
    }

    #[test]
    fn both_tag_shapes_normalize_identically() {
        let bare = serde_json::json!([{ "tag": "a" }, { "tag": "b" }]);
        let wrapped = serde_json::json!({ "tags": [{ "tag": "a" }, { "tag": "b" }], "authorId": "1" });
        assert_eq!(normalize_tags(Some(&bare)), vec!["a", "b"]);
        assert_eq!(normalize_tags(Some(&bare)), normalize_tags(Some(&wrapped)));
        assert!(normalize_tags(None).is_empty());
        assert!(normalize_tags(Some(&serde_json::json!("oops"))).is_empty());
    }

    #[test]
    fn missing_body_signals_stale_session() {
        let payload = r#"{"error":true,"message":"login required","body":[]}"#;
        assert_eq!(
            extract("1", payload, "<html></html>"),
            Err(ExtractionFailure::NotAuthenticatedOrExpired)
        );
        assert_eq!(
            extract("1", r#"{"error":false}"#, "<html></html>"),
            Err(ExtractionFailure::NotAuthenticatedOrExpired)
        );
    }

    #[test]
    fn non_json_payload_is_malformed() {
        assert!(matches!(
            extract("1", "<html>", ""),
            Err(ExtractionFailure::MalformedPayload(_))
        ));
    }

    #[test]
    fn falls_back_to_content_container_text() -> anyhow::Result<()> {
        let payload = api(serde_json::json!({ "title": "T", "userName": "U" }));
        let page = r#"<html><body><div id="novel-content">
            <p>  Line one </p><p>Line two</p><br><p>   </p><span>Line three</span>
        </div></body></html>"#;
        let item = extract("1", &payload, page)?;
        assert_eq!(item.body, "Line one\nLine two\nLine three");
        assert!(item.tags.is_empty());
        assert_eq!(item.series_link, None);
        assert_eq!(item.created_at, "");
        Ok(())
    }

    #[test]
    fn preload_for_other_id_is_ignored() {
        let payload = api(serde_json::json!({ "title": "T", "userName": "U" }));
        assert_eq!(
            extract("1", &payload, &preload_page("2", "someone else")),
            Err(ExtractionFailure::NoContent)
        );
    }

    #[test]
    fn empty_preload_and_container_is_no_content() {
        let payload = api(serde_json::json!({ "title": "T", "userName": "U" }));
        let page = format!(
            "{}<div id=\"novel-content\">  </div>",
            preload_page("1", "")
        );
        assert_eq!(extract("1", &payload, &page), Err(ExtractionFailure::NoContent));
    }

    #[test]
    fn incomplete_series_nav_degrades_to_standalone() -> anyhow::Result<()> {
        let payload = api(serde_json::json!({
            "title": "T",
            "userName": "U",
            "seriesNavData": { "title": "Saga" }
        }));
        let item = extract("1", &payload, &preload_page("1", "text"))?;
        assert_eq!(item.series_link, None);
        Ok(())
    }

    #[test]
    fn missing_title_is_reported() {
        let payload = api(serde_json::json!({ "userName": "U" }));
        assert_eq!(
            extract("1", &payload, &preload_page("1", "text")),
            Err(ExtractionFailure::MissingField("title"))
        );
    }
}
