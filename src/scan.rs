use std::io::Write;
use std::path::Path;

use anyhow::Context as _;

use crate::cli::ScanArgs;
use crate::item::sort_ids;
use crate::store;

pub fn run(args: ScanArgs) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    print(Path::new(&args.dir), &mut stdout.lock())
}

/// Lists the item ids recovered from `dir` and whether it carries the marker.
pub fn print(dir: &Path, output: &mut impl Write) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("directory does not exist: {}", dir.display());
    }
    let mut ids: Vec<String> = store::scan_persisted_ids(dir)
        .with_context(|| format!("scan {}", dir.display()))?
        .into_iter()
        .collect();
    sort_ids(&mut ids);

    writeln!(output, "{}: {} item(s)", dir.display(), ids.len())?;
    for id in &ids {
        writeln!(output, "  {id}")?;
    }
    let marker = if store::has_marker(dir) { "present" } else { "absent" };
    writeln!(output, "completion marker: {marker}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_sorted_ids_and_marker_state() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        for id in ["10", "9"] {
            std::fs::write(
                temp.path().join(format!("{id}.txt")),
                format!("Title: t\nURL: https://www.pixiv.net/novel/show.php?id={id}\n"),
            )?;
        }

        let mut out = Vec::new();
        print(temp.path(), &mut out)?;
        let text = String::from_utf8(out)?;
        assert!(text.contains("2 item(s)\n  9\n  10\n"), "{text}");
        assert!(text.ends_with("completion marker: absent\n"), "{text}");
        Ok(())
    }
}
