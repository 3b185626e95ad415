use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::FetchArgs;
use crate::config::Config;
use crate::endpoints::{Endpoints, item_id_from_input};
use crate::error::Result;
use crate::extract::{extract_from_body, parse_item_body};
use crate::item::{Item, SeriesLink};
use crate::reconcile::reconcile;
use crate::series::{Resolution, SeriesResolver};
use crate::store;
use crate::transport::{HttpTransport, Transport};

const PROGRESS_TEMPLATE: &str = "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {msg}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub series: Option<SeriesOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesOutcome {
    /// An enclosing call is already filling in this series.
    Deferred,
    /// Membership could not be determined; only the item itself was saved.
    Unresolved,
    AlreadyComplete { members: usize },
    Completed {
        members: usize,
        fetched: Vec<String>,
        failed: Vec<String>,
    },
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "saved {} ({}) -> {}", self.title, self.id, self.path.display())?;
        match &self.series {
            None | Some(SeriesOutcome::Deferred) => Ok(()),
            Some(SeriesOutcome::Unresolved) => write!(f, "; series members unavailable"),
            Some(SeriesOutcome::AlreadyComplete { members }) => {
                write!(f, "; series complete ({members} items)")
            }
            Some(SeriesOutcome::Completed {
                members,
                fetched,
                failed,
            }) => write!(
                f,
                "; series: {} fetched, {} failed, {members} items",
                fetched.len(),
                failed.len()
            ),
        }
    }
}

/// Fetches every id in `args`; one failing id does not stop the others.
pub fn run(args: FetchArgs, config: &Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.download_path).with_context(|| {
        format!("create download dir: {}", config.download_path.display())
    })?;
    let fetcher = Fetcher::from_config(config).context("build fetcher")?;

    let mut failed = 0usize;
    for raw in &args.ids {
        let Some(id) = item_id_from_input(raw) else {
            tracing::error!(input = %raw, "not a novel id or URL");
            failed += 1;
            continue;
        };
        match fetcher.fetch_item(&id) {
            Ok(report) => println!("{report}"),
            Err(err) => {
                tracing::error!(%id, error = %err, "fetch failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} item(s) failed", args.ids.len());
    }
    Ok(())
}

/// Bookkeeping for one top-level `fetch_item` call.
#[derive(Debug, Default)]
struct Pass {
    active_series: HashSet<String>,
    attempted: HashSet<String>,
}

pub struct Fetcher<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    root: PathBuf,
    request_delay: Duration,
    show_progress: bool,
}

impl Fetcher<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Self::new(transport, config)
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: &Config) -> Result<Self> {
        Ok(Self {
            transport,
            endpoints: Endpoints::new(&config.base_url)?,
            root: config.download_path.clone(),
            request_delay: config.request_delay(),
            show_progress: config.show_progress,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetches and saves `item_id`; when it belongs to a series, also fetches
    /// every member not yet present in the series directory.
    pub fn fetch_item(&self, item_id: &str) -> Result<FetchReport> {
        let mut pass = Pass::default();
        self.fetch_recursive(item_id.trim(), &mut pass)
    }

    fn fetch_recursive(&self, item_id: &str, pass: &mut Pass) -> Result<FetchReport> {
        pass.attempted.insert(item_id.to_owned());
        tracing::info!(id = %item_id, "fetching item");

        let item = self.fetch_and_extract(item_id)?;
        let dir = store::item_dir(&self.root, item.series_link.as_ref());
        let path = store::write_item(&dir, &item, &self.endpoints.canonical_item_url(item_id))?;

        let series = match &item.series_link {
            None => None,
            Some(link) if pass.active_series.contains(&link.series_id) => {
                Some(SeriesOutcome::Deferred)
            }
            Some(link) => Some(self.sync_series(item_id, link, &dir, pass)),
        };

        Ok(FetchReport {
            id: item.id,
            title: item.title,
            path,
            series,
        })
    }

    fn fetch_and_extract(&self, item_id: &str) -> Result<Item> {
        let meta = self.transport.get_text(&self.endpoints.item_meta(item_id))?;
        // Fail on a stale session before spending a request on the page.
        let body = parse_item_body(&meta).map_err(|failure| failure.into_fetch_error(item_id))?;

        let page = self.transport.get_text(&self.endpoints.item_page(item_id))?;
        let item = extract_from_body(item_id, body, &page)
            .map_err(|failure| failure.into_fetch_error(item_id))?;
        tracing::info!(id = %item_id, title = %item.title, "extracted item");
        Ok(item)
    }

    fn sync_series(
        &self,
        item_id: &str,
        link: &SeriesLink,
        dir: &Path,
        pass: &mut Pass,
    ) -> SeriesOutcome {
        tracing::info!(series = %link.series_title, series_id = %link.series_id, "item is part of a series");

        let resolver = SeriesResolver::new(&self.transport, &self.endpoints, self.request_delay);
        let membership = match resolver.resolve_series(item_id) {
            Ok(Resolution::Series(membership)) => membership,
            Ok(Resolution::NotASeries) => return SeriesOutcome::Unresolved,
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve series members; keeping the single item");
                return SeriesOutcome::Unresolved;
            }
        };

        let persisted = match store::scan_persisted_ids(dir) {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(error = %err, "could not scan series directory");
                return SeriesOutcome::Unresolved;
            }
        };

        let members = membership.len();
        let reconciliation = reconcile(membership.member_ids(), &persisted);
        if reconciliation.already_complete {
            tracing::info!(members, "all series members already downloaded");
            mark_complete(dir);
            return SeriesOutcome::AlreadyComplete { members };
        }

        let total = reconciliation.to_fetch.len();
        tracing::info!(missing = total, members, "fetching missing series members");

        pass.active_series.insert(link.series_id.clone());
        let progress = self.progress_bar(total as u64, &link.series_title);
        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        for (idx, member_id) in reconciliation.to_fetch.iter().enumerate() {
            if pass.attempted.contains(member_id) {
                progress.inc(1);
                continue;
            }
            std::thread::sleep(self.request_delay);
            tracing::info!(id = %member_id, position = idx + 1, total, "fetching series member");

            match self.fetch_recursive(member_id, pass) {
                Ok(_) => fetched.push(member_id.clone()),
                Err(err) => {
                    tracing::warn!(id = %member_id, error = %err, "series member failed; continuing");
                    failed.push(member_id.clone());
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        pass.active_series.remove(&link.series_id);

        // Marked even when members failed, so an unfetchable chapter cannot
        // keep the series open forever.
        mark_complete(dir);

        SeriesOutcome::Completed {
            members,
            fetched,
            failed,
        }
    }

    fn progress_bar(&self, len: u64, label: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            progress.set_style(style);
        }
        progress.set_message(label.to_owned());
        progress
    }
}

fn mark_complete(dir: &Path) {
    if let Err(err) = store::write_marker(dir) {
        tracing::warn!(error = %err, "could not write completion marker");
    }
}
