use std::path::{Path, PathBuf};

use stepreplay_core_types::Fingerprint;

use crate::errors::{SnapErrKind, SnapError};
use crate::policy::IoCfg;

const SNAPSHOT_EXT: &str = "json";

pub fn snapshot_path(cfg: &IoCfg, key: &Fingerprint) -> Result<PathBuf, SnapError> {
    if !is_valid_key(key.as_str()) {
        return Err(SnapErrKind::InvalidKey(key.to_string()).into());
    }
    let mut path = cfg.root.clone();
    path.push(format!("{}.{}", key.as_str(), SNAPSHOT_EXT));
    Ok(path)
}

/// Key of a snapshot file, `None` for anything else in the directory.
pub fn key_of(path: &Path) -> Option<Fingerprint> {
    if path.extension()?.to_str()? != SNAPSHOT_EXT {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_key(stem).then(|| Fingerprint(stem.to_string()))
}

/// Keys become file names, so only a conservative alphabet is accepted.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let cfg = IoCfg {
            root: PathBuf::from("/tmp/snaps"),
            pretty: true,
        };
        let key = Fingerprint::of_test_text("navigate to /login");
        let path = snapshot_path(&cfg, &key).unwrap();
        assert_eq!(path.parent(), Some(Path::new("/tmp/snaps")));
        assert_eq!(key_of(&path), Some(key));
        assert!(key_of(Path::new("/tmp/snaps/tf_x.json.tmp")).is_none());
        assert!(snapshot_path(&cfg, &Fingerprint("../etc/passwd".into())).is_err());
    }
}
