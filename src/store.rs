//! store.rs: per-source persisted state: a bounded active window plus an
//! unbounded archive that receives whatever the window evicts.
//!
//! Layout under the data directory:
//!   {source}_notices.json                    active window, ≤ max_notices
//!   archive/{source}_notices_archive.json    everything evicted, oldest first

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Notice;

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    data_file: PathBuf,
    archive_file: PathBuf,
    max_notices: usize,
}

impl ArchiveStore {
    pub fn new(data_dir: impl AsRef<Path>, source: &str, max_notices: usize) -> Result<Self> {
        if max_notices == 0 {
            return Err(anyhow!("max_notices for {source} must be positive"));
        }
        let data_dir = data_dir.as_ref();
        Ok(Self {
            data_file: data_dir.join(format!("{source}_notices.json")),
            archive_file: data_dir
                .join("archive")
                .join(format!("{source}_notices_archive.json")),
            max_notices,
        })
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn archive_file(&self) -> &Path {
        &self.archive_file
    }

    pub fn max_notices(&self) -> usize {
        self.max_notices
    }

    /// Active window. Missing, empty or corrupt files read as "no history".
    pub fn load_active(&self) -> Vec<Notice> {
        read_list(&self.data_file)
    }

    pub fn load_archive(&self) -> Vec<Notice> {
        read_list(&self.archive_file)
    }

    /// Append to the tail of the active window; if it grows past the cap the
    /// oldest entries migrate to the archive. Write failures propagate.
    ///
    /// Returns how many notices were archived by this call.
    pub fn append(&self, new_notices: &[Notice]) -> Result<usize> {
        if new_notices.is_empty() {
            return Ok(0);
        }

        let mut all = self.load_active();
        all.extend_from_slice(new_notices);

        let excess = all.len().saturating_sub(self.max_notices);
        let evicted: Vec<Notice> = all.drain(0..excess).collect();

        // Archive first: a crash between the two writes leaves a duplicate, never a loss.
        if !evicted.is_empty() {
            let mut archived = self.load_archive();
            archived.extend(evicted);
            write_list(&self.archive_file, &archived)?;
            tracing::info!(
                count = excess,
                file = %self.archive_file.display(),
                "archived notices"
            );
        }
        write_list(&self.data_file, &all)?;
        Ok(excess)
    }
}

fn read_list(path: &Path) -> Vec<Notice> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(file = %path.display(), "no state file yet, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::error!(file = %path.display(), error = %e, "reading state file failed");
            return Vec::new();
        }
    };
    if content.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::error!(file = %path.display(), error = %e, "state file is not a notice list");
        Vec::new()
    })
}

fn write_list(path: &Path, notices: &[Notice]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(notices).context("serializing notices")?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(t: &str) -> Notice {
        Notice::new(t, format!("https://x.test/{t}"), "2025-01-01")
    }

    fn titles(v: &[Notice]) -> Vec<String> {
        v.iter().map(|n| n.title.clone()).collect()
    }

    #[test]
    fn overflow_moves_oldest_to_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "t", 2).unwrap();
        assert_eq!(store.append(&[n("A"), n("B"), n("C")]).unwrap(), 1);
        assert_eq!(titles(&store.load_active()), ["B", "C"]);
        assert_eq!(titles(&store.load_archive()), ["A"]);
    }

    #[test]
    fn append_empty_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "t", 2).unwrap();
        assert_eq!(store.append(&[]).unwrap(), 0);
        assert!(!store.data_file().exists());
        assert!(!store.archive_file().exists());

        store.append(&[n("A"), n("B"), n("C")]).unwrap();
        let before_active = fs::read(store.data_file()).unwrap();
        let before_archive = fs::read(store.archive_file()).unwrap();
        store.append(&[]).unwrap();
        assert_eq!(fs::read(store.data_file()).unwrap(), before_active);
        assert_eq!(fs::read(store.archive_file()).unwrap(), before_archive);
    }

    #[test]
    fn history_is_preserved_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "t", 3).unwrap();
        let batches: [&[&str]; 4] = [&["1", "2"], &["3"], &["4", "5", "6", "7"], &["8"]];
        let mut expected = Vec::new();
        for b in batches {
            let notices: Vec<Notice> = b.iter().map(|t| n(t)).collect();
            expected.extend(titles(&notices));
            store.append(&notices).unwrap();
            assert!(store.load_active().len() <= 3);
        }
        let mut all = store.load_archive();
        all.extend(store.load_active());
        assert_eq!(titles(&all), expected);
    }

    #[test]
    fn corrupt_or_empty_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "t", 5).unwrap();
        fs::write(store.data_file(), "").unwrap();
        assert!(store.load_active().is_empty());
        fs::write(store.data_file(), "{not json").unwrap();
        assert!(store.load_active().is_empty());

        // and a corrupt window is replaced, not merged, on the next append
        store.append(&[n("A")]).unwrap();
        assert_eq!(titles(&store.load_active()), ["A"]);
    }

    #[test]
    fn write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where the data directory should be
        let blocker = dir.path().join("data");
        fs::write(&blocker, "x").unwrap();
        let store = ArchiveStore::new(&blocker, "t", 2).unwrap();
        assert!(store.append(&[n("A")]).is_err());
    }

    #[test]
    fn zero_cap_is_rejected() {
        assert!(ArchiveStore::new("data", "t", 0).is_err());
    }

    #[test]
    fn persisted_format_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "zsb", 10).unwrap();
        let api = Notice {
            id: Some("a1".into()),
            title: "招生章程".into(),
            link: "https://zsb.qfnu.edu.cn/a1".into(),
            date: "2025-07-01".into(),
            description: Some(String::new()),
            publisher: Some("招生办".into()),
            hits: Some(0),
            is_new: Some(false),
            release_timestamp: Some(1_751_371_200_000),
        };
        let list = vec![n("页面公告"), api];
        store.append(&list).unwrap();
        assert_eq!(store.load_active(), list);

        let raw = fs::read_to_string(store.data_file()).unwrap();
        assert!(raw.contains("页面公告"), "stored as readable UTF-8");
        assert!(raw.contains("\"release_timestamp\""));
    }
}
