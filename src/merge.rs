use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::MergeArgs;
use crate::store::{self, ItemHeader};

#[derive(Debug)]
struct Chapter {
    order: u32,
    file_name: String,
    header: ItemHeader,
    body: String,
}

pub fn run(args: MergeArgs) -> anyhow::Result<()> {
    let out = merge(Path::new(&args.dir), args.name.as_deref(), args.force)?;
    println!("{}", out.display());
    Ok(())
}

/// Concatenates every persisted item in `series_dir` into one document next to
/// the directory, ordered by the `Chapter:` header (missing = 0), then by file
/// name.
pub fn merge(series_dir: &Path, output_name: Option<&str>, force: bool) -> anyhow::Result<PathBuf> {
    if !series_dir.is_dir() {
        anyhow::bail!("series directory does not exist: {}", series_dir.display());
    }
    let series_name = series_dir
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow::anyhow!("series directory has no name: {}", series_dir.display()))?;

    let mut chapters = read_chapters(series_dir)?;
    if chapters.is_empty() {
        anyhow::bail!("no chapter files found in {}", series_dir.display());
    }
    chapters.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.file_name.cmp(&b.file_name)));

    let generated_at = chrono::Local::now();
    let out_name = match output_name {
        Some(name) if name.ends_with(".txt") => name.to_owned(),
        Some(name) => format!("{name}.txt"),
        None => format!("{series_name}_{}.txt", generated_at.format("%Y%m%d_%H%M%S")),
    };
    let out_dir = series_dir
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let out_path = out_dir.join(out_name);

    let document = render_document(
        &series_name,
        &generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        &chapters,
    );

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options
        .open(&out_path)
        .with_context(|| format!("open merge output: {}", out_path.display()))?;
    file.write_all(document.as_bytes())
        .with_context(|| format!("write merge output: {}", out_path.display()))?;
    file.flush()
        .with_context(|| format!("flush merge output: {}", out_path.display()))?;

    tracing::info!(
        chapters = chapters.len(),
        out = %out_path.display(),
        "merged series"
    );
    Ok(out_path)
}

fn read_chapters(series_dir: &Path) -> anyhow::Result<Vec<Chapter>> {
    let mut chapters = Vec::new();
    for path in store::item_files(series_dir).context("list chapter files")? {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("read chapter: {}", path.display()))?;
        let Some((mut header, body)) = store::parse_item_file(&contents) else {
            tracing::warn!(path = %path.display(), "no header separator; skipping");
            continue;
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if header.title.is_empty() {
            header.title = file_name.trim_end_matches(".txt").to_owned();
        }
        chapters.push(Chapter {
            order: header.chapter.unwrap_or(0),
            file_name,
            body: body.to_owned(),
            header,
        });
    }
    Ok(chapters)
}

/// The series title from the chapter headers wins over the directory name.
fn render_document(dir_name: &str, generated_at: &str, chapters: &[Chapter]) -> String {
    let rule = store::header_separator();
    let series_title = chapters
        .iter()
        .find_map(|chapter| chapter.header.series_title.as_deref())
        .filter(|title| !title.is_empty())
        .unwrap_or(dir_name);
    let mut doc = String::new();
    doc.push_str(&format!("{series_title}\n"));
    doc.push_str(&format!("Generated: {generated_at}\n"));
    doc.push_str(&format!("Chapters: {}\n\n", chapters.len()));

    doc.push_str("Table of Contents\n\n");
    for (idx, chapter) in chapters.iter().enumerate() {
        doc.push_str(&format!("{}. {}\n", idx + 1, chapter.header.title));
    }

    for (idx, chapter) in chapters.iter().enumerate() {
        doc.push_str(&format!("\n{rule}\n\n"));
        doc.push_str(&format!("Chapter {}: {}\n", idx + 1, chapter.header.title));
        if !chapter.header.author.is_empty() {
            doc.push_str(&format!("Author: {}\n", chapter.header.author));
        }
        if !chapter.header.url.is_empty() {
            doc.push_str(&format!("URL: {}\n", chapter.header.url));
        }
        if !chapter.header.created_at.is_empty() {
            doc.push_str(&format!("Created: {}\n", chapter.header.created_at));
        }
        if !chapter.header.tags.is_empty() {
            doc.push_str(&format!("Tags: {}\n", chapter.header.tags.join(", ")));
        }
        doc.push('\n');
        doc.push_str(chapter.body.trim_end());
        doc.push('\n');
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chapter(dir: &Path, file: &str, title: &str, chapter: Option<u32>, body: &str) -> anyhow::Result<()> {
        let mut contents = format!(
            "Title: {title}\nAuthor: writer\nCreated: \nTags: \nURL: https://www.pixiv.net/novel/show.php?id={file}\n"
        );
        if let Some(chapter) = chapter {
            contents.push_str(&format!("Series: Saga\nChapter: {chapter}\n"));
        }
        contents.push_str(&format!("\n{}\n\n{body}", store::header_separator()));
        std::fs::write(dir.join(format!("{file}.txt")), contents)?;
        Ok(())
    }

    fn toc_titles(doc: &str) -> Vec<String> {
        doc.lines()
            .skip_while(|line| *line != "Table of Contents")
            .skip(2)
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(". ").map(|(_, title)| title.to_owned()))
            .collect()
    }

    #[test]
    fn chapters_sort_by_hint_then_file_name() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dir = temp.path().join("Saga");
        std::fs::create_dir_all(&dir)?;
        write_chapter(&dir, "a", "Third", Some(3), "three")?;
        write_chapter(&dir, "b", "First", Some(1), "one")?;
        write_chapter(&dir, "c", "Second", Some(2), "two")?;
        store::write_marker(&dir)?;

        let out = merge(&dir, Some("saga"), false)?;
        assert_eq!(out, temp.path().join("saga.txt"));

        let doc = std::fs::read_to_string(&out)?;
        assert_eq!(toc_titles(&doc), vec!["First", "Second", "Third"]);
        let one = doc.find("\none\n").unwrap_or(usize::MAX);
        let two = doc.find("\ntwo\n").unwrap_or(0);
        assert!(one < two);
        assert!(!doc.contains("completed"));
        Ok(())
    }

    #[test]
    fn chapters_without_hints_merge_in_file_name_order() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dir = temp.path().join("Loose");
        std::fs::create_dir_all(&dir)?;
        write_chapter(&dir, "zeta", "Zeta Title", None, "z body")?;
        write_chapter(&dir, "alpha", "Alpha Title", None, "a body")?;

        let out = merge(&dir, None, false)?;
        let name = out.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("Loose_"), "{name}");

        let doc = std::fs::read_to_string(&out)?;
        assert_eq!(toc_titles(&doc), vec!["Alpha Title", "Zeta Title"]);
        assert!(doc.contains("Chapter 1: Alpha Title"));
        assert!(doc.contains("Chapter 2: Zeta Title"));
        Ok(())
    }

    #[test]
    fn heading_uses_series_title_and_chapters_keep_metadata() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dir = temp.path().join("renamed");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("one.txt"),
            format!(
                "Title: One\nAuthor: writer\nCreated: 2024-05-01\nTags: fantasy, long\nURL: https://www.pixiv.net/novel/show.php?id=1\nSeries: Saga\nChapter: 1\n\n{}\n\nbody",
                store::header_separator()
            ),
        )?;

        let doc = std::fs::read_to_string(merge(&dir, Some("out"), false)?)?;
        assert!(doc.starts_with("Saga\n"), "{doc}");
        assert!(doc.contains("Created: 2024-05-01\nTags: fantasy, long\n"), "{doc}");
        Ok(())
    }

    #[test]
    fn refuses_to_overwrite_without_force() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dir = temp.path().join("Saga");
        std::fs::create_dir_all(&dir)?;
        write_chapter(&dir, "a", "Only", None, "body")?;

        merge(&dir, Some("out.txt"), false)?;
        assert!(merge(&dir, Some("out.txt"), false).is_err());
        assert!(merge(&dir, Some("out.txt"), true).is_ok());
        Ok(())
    }

    #[test]
    fn empty_directory_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let dir = temp.path().join("Empty");
        std::fs::create_dir_all(&dir)?;
        store::write_marker(&dir)?;
        assert!(merge(&dir, None, false).is_err());
        Ok(())
    }
}
