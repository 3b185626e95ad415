use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Members not yet persisted, in membership order.
    pub to_fetch: Vec<String>,
    pub already_complete: bool,
}

pub fn reconcile(member_ids: &[String], persisted_ids: &HashSet<String>) -> Reconciliation {
    let to_fetch: Vec<String> = member_ids
        .iter()
        .filter(|id| !persisted_ids.contains(*id))
        .cloned()
        .collect();
    let already_complete = to_fetch.is_empty();
    Reconciliation {
        to_fetch,
        already_complete,
    }
}
