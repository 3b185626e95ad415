use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub author: String,
    pub body: String,
    pub tags: Vec<String>,
    /// Stored verbatim, never reparsed.
    pub created_at: String,
    pub series_link: Option<SeriesLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesLink {
    pub series_id: String,
    pub series_title: String,
    /// 1-based position within the series, when the platform reports one.
    pub order: Option<u32>,
}

/// Ordered, deduplicated member ids of one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMembership {
    pub series_id: String,
    member_ids: Vec<String>,
}

impl SeriesMembership {
    /// Dedups `ids`, adds `origin_id`, and sorts by numeric id value.
    pub fn new(
        series_id: impl Into<String>,
        origin_id: &str,
        ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut member_ids: Vec<String> = ids.into_iter().collect();
        member_ids.push(origin_id.to_owned());
        sort_ids(&mut member_ids);
        Self {
            series_id: series_id.into(),
            member_ids,
        }
    }

    pub fn member_ids(&self) -> &[String] {
        &self.member_ids
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Numeric order for numeric ids ("2" < "10"); non-numeric ids go last, lexically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub fn sort_ids(ids: &mut Vec<String>) {
    ids.sort_by(|a, b| compare_ids(a, b));
    ids.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    #[test]
    fn sorts_numerically_not_lexically() {
        let mut ids = strings(&["10", "2", "33"]);
        sort_ids(&mut ids);
        assert_eq!(ids, strings(&["2", "10", "33"]));
    }

    #[test]
    fn membership_dedups_and_always_contains_origin() {
        let membership = SeriesMembership::new("9", "501", strings(&["502", "500", "502"]));
        assert_eq!(membership.member_ids(), strings(&["500", "501", "502"]));

        let lone = SeriesMembership::new("9", "7", Vec::new());
        assert_eq!(lone.member_ids(), strings(&["7"]));
    }

    #[test]
    fn non_numeric_ids_sort_after_numeric_ones() {
        let mut ids = strings(&["b", "3", "a", "1"]);
        sort_ids(&mut ids);
        assert_eq!(ids, strings(&["1", "3", "a", "b"]));
    }
}
