use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context as _;

use crate::endpoints::item_id_from_input;
use crate::fetch::Fetcher;
use crate::transport::Transport;

const PROMPT: &str = "novel id or URL (`merge <dir> [name]`, `scan <dir>`, `q` to quit): ";

/// Reads commands from `input` until EOF or `q`. A failing command is
/// reported on `output` and the loop keeps going.
pub fn run<T: Transport>(
    fetcher: &Fetcher<T>,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    let rule = crate::store::header_separator();
    loop {
        write!(output, "\n{PROMPT}").context("write prompt")?;
        output.flush().context("flush prompt")?;

        let mut line = String::new();
        if input.read_line(&mut line).context("read command")? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_ascii_lowercase().as_str(), "q" | "quit" | "exit") {
            break;
        }

        if let Err(err) = dispatch(fetcher, line, &mut output) {
            tracing::debug!(error = ?err, "shell command failed");
            writeln!(output, "error: {err:#}").context("write error")?;
        }
        writeln!(output, "\n{rule}").context("write separator")?;
    }
    Ok(())
}

fn dispatch<T: Transport>(
    fetcher: &Fetcher<T>,
    line: &str,
    output: &mut impl Write,
) -> anyhow::Result<()> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("merge") => {
            let dir = words
                .next()
                .ok_or_else(|| anyhow::anyhow!("usage: merge <dir> [name]"))?;
            let dir = resolve_dir(fetcher.root(), dir);
            let out = crate::merge::merge(&dir, words.next(), false)?;
            writeln!(output, "merged into {}", out.display())?;
        }
        Some("scan") => {
            let dir = words
                .next()
                .ok_or_else(|| anyhow::anyhow!("usage: scan <dir>"))?;
            let dir = resolve_dir(fetcher.root(), dir);
            crate::scan::print(&dir, output)?;
        }
        _ => {
            for word in line.split_whitespace() {
                let Some(id) = item_id_from_input(word) else {
                    writeln!(output, "not a novel id or URL: {word}")?;
                    continue;
                };
                match fetcher.fetch_item(&id) {
                    Ok(report) => writeln!(output, "{report}")?,
                    Err(err) => writeln!(output, "fetch {id} failed: {err}")?,
                }
            }
        }
    }
    Ok(())
}

/// Relative directories are looked up under the download root first.
fn resolve_dir(root: &Path, dir: &str) -> std::path::PathBuf {
    let under_root = root.join(dir);
    if Path::new(dir).is_relative() && under_root.is_dir() {
        under_root
    } else {
        Path::new(dir).to_path_buf()
    }
}
