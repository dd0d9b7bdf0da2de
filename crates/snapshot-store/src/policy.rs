use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapPolicyView {
    pub enabled: bool,
    pub io: IoCfg,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub maintenance: MaintenanceCfg,
}

impl Default for SnapPolicyView {
    fn default() -> Self {
        Self {
            enabled: true,
            io: IoCfg::default(),
            read_only: false,
            maintenance: MaintenanceCfg::default(),
        }
    }
}

impl SnapPolicyView {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            io: IoCfg {
                root: root.into(),
                ..IoCfg::default()
            },
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IoCfg {
    pub root: PathBuf,
    /// Pretty-print snapshot files so they diff well in version control.
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for IoCfg {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./.stepreplay/snapshots"),
            pretty: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaintenanceCfg {
    pub integrity_on_boot: bool,
    #[serde(default)]
    pub fallback_read_only: bool,
}

impl Default for MaintenanceCfg {
    fn default() -> Self {
        Self {
            integrity_on_boot: true,
            fallback_read_only: false,
        }
    }
}
