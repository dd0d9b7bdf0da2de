use std::io;
use std::path::Path;

use crate::model::Snapshot;

/// `Ok(None)` when the file does not exist; unparsable content is
/// reported as `InvalidData`.
pub async fn read_snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    Snapshot::from_json(&data)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

/// Every `*.json` file directly under `root`.
pub fn list_snapshot_files(root: &Path) -> io::Result<Vec<std::path::PathBuf>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut out = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && super::layout::key_of(&path).is_some() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
