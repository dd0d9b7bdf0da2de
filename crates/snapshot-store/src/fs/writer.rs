use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::errors::SnapError;
use crate::model::Snapshot;
use crate::policy::IoCfg;

pub async fn write_snapshot(cfg: &IoCfg, snapshot: &Snapshot) -> Result<PathBuf, SnapError> {
    let path = super::layout::snapshot_path(cfg, &snapshot.test_fingerprint)?;
    let data = snapshot
        .to_json(cfg.pretty)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    let written = tokio::task::spawn_blocking(move || write_atomic(path, &data))
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))??;
    Ok(written)
}

/// Concurrent writers of one key each use their own temp file; the last
/// rename wins.
fn write_atomic(path: PathBuf, data: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    if let Err(err) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepreplay_core_types::Fingerprint;

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = IoCfg {
            root: dir.path().join("nested"),
            pretty: false,
        };
        let snapshot = Snapshot::new(Fingerprint::of_test_text("a"), "a");
        let path = write_snapshot(&cfg, &snapshot).await.unwrap();
        let again = write_snapshot(&cfg, &snapshot).await.unwrap();
        assert_eq!(path, again);
        let names: Vec<_> = fs::read_dir(&cfg.root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
        let loaded = crate::fs::reader::read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(loaded.test_text, "a");
    }
}
