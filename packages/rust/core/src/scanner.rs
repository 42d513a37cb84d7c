//! Directory scanning: list a source directory and keep Markdown files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs::ReadDir;
use tracing::{debug, trace};

use mdpress_shared::{MdpressError, Result, SourceDocument};

/// Source extension, compared case-insensitively.
const MARKDOWN_EXTENSION: &str = "md";

/// Whether `name` has a `.md` extension in any letter case.
pub fn is_markdown(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
}

/// Lazy, non-recursive listing of the Markdown files in one directory.
pub struct Scanner {
    dir: PathBuf,
    entries: ReadDir,
}

impl Scanner {
    /// Open `dir` for listing.
    pub async fn open(dir: &Path) -> Result<Self> {
        let entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| MdpressError::directory_read(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Next Markdown document, or `None` once the listing is exhausted.
    ///
    /// Other files, subdirectories, dangling links, and names that are not
    /// valid UTF-8 are skipped.
    pub async fn next_document(&mut self) -> Result<Option<SourceDocument>> {
        loop {
            let Some(entry) = self
                .entries
                .next_entry()
                .await
                .map_err(|e| MdpressError::directory_read(&self.dir, e))?
            else {
                return Ok(None);
            };

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                debug!(name = ?file_name, "skipping non UTF-8 file name");
                continue;
            };

            if !is_markdown(name) {
                trace!(name, "skipping non-markdown entry");
                continue;
            }

            // Follows symlinks so linked Markdown files are converted too.
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    debug!(name, "skipping directory with markdown extension");
                    continue;
                }
                Err(e) => {
                    debug!(name, error = %e, "skipping unreadable entry");
                    continue;
                }
            }

            if let Some(doc) = SourceDocument::new(&self.dir, name) {
                return Ok(Some(doc));
            }
        }
    }
}

/// List every Markdown document directly inside `dir`.
pub async fn scan(dir: &Path) -> Result<Vec<SourceDocument>> {
    let mut scanner = Scanner::open(dir).await?;
    let mut docs = Vec::new();
    while let Some(doc) = scanner.next_document().await? {
        docs.push(doc);
    }
    debug!(dir = %dir.display(), count = docs.len(), "scanned source directory");
    Ok(docs)
}

/// Two documents whose outputs would land on the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub kept: SourceDocument,
    pub dropped: SourceDocument,
}

/// Keep one document per case-insensitive stem.
///
/// Within a group the file names are ordered bytewise and the last one
/// wins, so the result does not depend on listing order.
pub fn resolve_collisions(docs: Vec<SourceDocument>) -> (Vec<SourceDocument>, Vec<Collision>) {
    let mut groups: BTreeMap<String, Vec<SourceDocument>> = BTreeMap::new();
    for doc in docs {
        groups.entry(doc.stem.to_lowercase()).or_default().push(doc);
    }

    let mut kept = Vec::with_capacity(groups.len());
    let mut collisions = Vec::new();

    for (_, mut group) in groups {
        group.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        let Some(winner) = group.pop() else {
            continue;
        };
        for dropped in group {
            collisions.push(Collision {
                kept: winner.clone(),
                dropped,
            });
        }
        kept.push(winner);
    }

    (kept, collisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mdpress-scan-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn names(docs: &[SourceDocument]) -> Vec<&str> {
        let mut names: Vec<&str> = docs.iter().map(|d| d.file_name.as_str()).collect();
        names.sort();
        names
    }

    #[test]
    fn markdown_extension_is_case_insensitive() {
        assert!(is_markdown("a.md"));
        assert!(is_markdown("report.MD"));
        assert!(is_markdown("notes.Md"));
        assert!(!is_markdown("a.markdown"));
        assert!(!is_markdown("a.md.txt"));
        assert!(!is_markdown("README"));
        assert!(!is_markdown(".md"));
    }

    #[tokio::test]
    async fn scan_keeps_only_markdown_files() {
        let dir = temp_dir("filter");
        std::fs::write(dir.join("a.md"), "# A").unwrap();
        std::fs::write(dir.join("B.MD"), "# B").unwrap();
        std::fs::write(dir.join("c.txt"), "c").unwrap();
        std::fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir_all(dir.join("nested.md")).unwrap();
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub").join("deep.md"), "# deep").unwrap();

        let docs = scan(&dir).await.expect("scan");
        assert_eq!(names(&docs), vec!["B.MD", "a.md"]);
        let b = docs.iter().find(|d| d.file_name == "B.MD").unwrap();
        assert_eq!(b.stem, "B");
        assert_eq!(b.path(), dir.join("B.MD"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn scanner_yields_lazily() {
        let dir = temp_dir("lazy");
        std::fs::write(dir.join("one.md"), "1").unwrap();

        let mut scanner = Scanner::open(&dir).await.expect("open");
        let first = scanner.next_document().await.expect("next");
        assert_eq!(first.map(|d| d.file_name), Some("one.md".to_string()));
        assert!(scanner.next_document().await.expect("next").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_directory_is_a_directory_error() {
        let dir = temp_dir("missing").join("does-not-exist");
        let err = scan(&dir).await.unwrap_err();
        assert!(matches!(err, MdpressError::DirectoryRead { .. }));
    }

    #[test]
    fn collisions_keep_last_name_bytewise() {
        let docs = vec![
            SourceDocument::new("src", "report.MD").unwrap(),
            SourceDocument::new("src", "other.md").unwrap(),
            SourceDocument::new("src", "Report.md").unwrap(),
        ];
        let (kept, collisions) = resolve_collisions(docs);

        assert_eq!(names(&kept), vec!["other.md", "report.MD"]);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].kept.file_name, "report.MD");
        assert_eq!(collisions[0].dropped.file_name, "Report.md");
    }

    #[test]
    fn collision_winner_ignores_input_order() {
        let forward = vec![
            SourceDocument::new("src", "a.md").unwrap(),
            SourceDocument::new("src", "A.md").unwrap(),
        ];
        let reverse: Vec<_> = forward.iter().rev().cloned().collect();

        let (kept_f, _) = resolve_collisions(forward);
        let (kept_r, _) = resolve_collisions(reverse);
        assert_eq!(kept_f, kept_r);
        assert_eq!(kept_f[0].file_name, "a.md");
    }
}
