use std::collections::HashSet;
use std::time::Duration;

use crate::endpoints::{Endpoints, SERIES_PAGE_LIMIT};
use crate::error::{FetchError, Result};
use crate::extract::{parse_item_body, series_nav};
use crate::formats::{ApiEnvelope, NavLink, SeriesListingBody, SeriesNavData};
use crate::item::SeriesMembership;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Series(SeriesMembership),
    NotASeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Prev,
    Next,
}

impl Direction {
    fn pointer_in(self, nav: &SeriesNavData) -> Option<&NavLink> {
        match self {
            Direction::Prev => nav.prev.as_ref(),
            Direction::Next => nav.next.as_ref(),
        }
    }

    fn nested(self, link: &NavLink) -> Option<&NavLink> {
        match self {
            Direction::Prev => link.prev.as_deref(),
            Direction::Next => link.next.as_deref(),
        }
    }
}

pub struct SeriesResolver<'a, T: Transport> {
    transport: &'a T,
    endpoints: &'a Endpoints,
    /// Pause before every neighbor lookup of the fallback walk.
    request_delay: Duration,
}

impl<'a, T: Transport> SeriesResolver<'a, T> {
    pub fn new(transport: &'a T, endpoints: &'a Endpoints, request_delay: Duration) -> Self {
        Self {
            transport,
            endpoints,
            request_delay,
        }
    }

    /// Determines the full, numerically ordered member list of the series
    /// `origin_id` belongs to. The bulk listing is tried first; when it fails
    /// or comes back empty, the prev/next pointers are walked instead.
    pub fn resolve_series(&self, origin_id: &str) -> Result<Resolution> {
        let payload = self
            .transport
            .get_text(&self.endpoints.item_meta(origin_id))
            .map_err(|err| resolution_error(origin_id, err))?;
        let body = parse_item_body(&payload)
            .map_err(|failure| resolution_error(origin_id, failure.into_fetch_error(origin_id)))?;

        let Some(nav) = series_nav(&body) else {
            tracing::info!(id = %origin_id, "not part of a series");
            return Ok(Resolution::NotASeries);
        };
        let Some(series_id) = nav.series_id.clone().and_then(|id| id.into_string()) else {
            tracing::warn!(id = %origin_id, "seriesNavData has no seriesId");
            return Ok(Resolution::NotASeries);
        };

        match self.list_members(&series_id) {
            Ok(mut ids) if !ids.is_empty() => {
                // The origin always stays a member, within the cap.
                if ids.len() >= SERIES_PAGE_LIMIT && !ids.iter().any(|id| id == origin_id) {
                    ids.truncate(SERIES_PAGE_LIMIT - 1);
                }
                tracing::info!(series_id = %series_id, members = ids.len(), "series listing resolved");
                return Ok(Resolution::Series(SeriesMembership::new(
                    series_id, origin_id, ids,
                )));
            }
            Ok(_) => {
                tracing::info!(series_id = %series_id, "series listing empty; walking prev/next links");
            }
            Err(err) => {
                tracing::warn!(series_id = %series_id, error = %err, "series listing failed; walking prev/next links");
            }
        }

        let ids = self.traverse(origin_id, &nav)?;
        let membership = SeriesMembership::new(series_id, origin_id, ids);
        tracing::info!(
            series_id = %membership.series_id,
            members = membership.len(),
            "series resolved by link traversal"
        );
        Ok(Resolution::Series(membership))
    }

    fn list_members(&self, series_id: &str) -> Result<Vec<String>> {
        let url = self.endpoints.series_listing(series_id);
        let payload = self.transport.get_text(&url)?;
        let malformed = |message: String| FetchError::Resolution {
            id: series_id.to_owned(),
            message: format!("malformed series listing: {message}"),
        };

        let envelope: ApiEnvelope =
            serde_json::from_str(&payload).map_err(|err| malformed(err.to_string()))?;
        let Some(body) = envelope.object_body() else {
            return Ok(Vec::new());
        };
        let body: SeriesListingBody =
            serde_json::from_value(body.clone()).map_err(|err| malformed(err.to_string()))?;

        let mut ids: Vec<String> = body
            .page
            .map(|page| page.series)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.id.and_then(|id| id.into_string()))
            .collect();
        ids.truncate(SERIES_PAGE_LIMIT);
        Ok(ids)
    }

    fn traverse(&self, origin_id: &str, origin_nav: &SeriesNavData) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::from([origin_id.to_owned()]);
        let mut ids = vec![origin_id.to_owned()];

        for direction in [Direction::Prev, Direction::Next] {
            let mut pointer = direction.pointer_in(origin_nav).cloned();
            while let Some(link) = pointer.take() {
                if visited.len() >= SERIES_PAGE_LIMIT {
                    tracing::warn!(id = %origin_id, limit = SERIES_PAGE_LIMIT, "series traversal hit member cap");
                    break;
                }
                let Some(id) = link.id.clone().and_then(|id| id.into_string()) else {
                    break;
                };
                if !visited.insert(id.clone()) {
                    tracing::debug!(%id, "series traversal revisited an id; stopping");
                    break;
                }
                ids.push(id.clone());

                pointer = match direction.nested(&link) {
                    Some(nested) => Some(nested.clone()),
                    None => self.neighbor(&id, direction)?,
                };
            }
        }

        Ok(ids)
    }

    fn neighbor(&self, id: &str, direction: Direction) -> Result<Option<NavLink>> {
        std::thread::sleep(self.request_delay);
        let payload = self
            .transport
            .get_text(&self.endpoints.item_meta(id))
            .map_err(|err| resolution_error(id, err))?;
        let body = match parse_item_body(&payload) {
            Ok(body) => body,
            Err(failure) => {
                tracing::warn!(%id, %failure, "unreadable neighbor metadata; ending traversal");
                return Ok(None);
            }
        };
        Ok(series_nav(&body).and_then(|nav| direction.pointer_in(&nav).cloned()))
    }
}

fn resolution_error(id: &str, err: FetchError) -> FetchError {
    FetchError::Resolution {
        id: id.to_owned(),
        message: err.to_string(),
    }
}
