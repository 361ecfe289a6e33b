//! Host profile detection. Named cluster profiles change where the
//! version-control binaries live.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::infra::command;

/// The machine the run executes on. / 运行所在的机器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostProfile {
    /// NCCS Discover.
    Discover,
    /// NAS Pleiades.
    Pleiades,
    /// Anything else.
    #[default]
    Desktop,
}

impl HostProfile {
    /// Classifies a node name the way the cluster login/compute nodes are named.
    pub fn from_node_name(node: &str) -> Self {
        let bytes = node.as_bytes();
        let pleiades_rack = bytes.len() > 4 && bytes[0] == b'r' && matches!(bytes[4], b'i' | b'c');

        if node.starts_with("discover") || node.starts_with("borg") {
            HostProfile::Discover
        } else if node.starts_with("pfe") || node.starts_with("maia") || pleiades_rack {
            HostProfile::Pleiades
        } else {
            HostProfile::Desktop
        }
    }

    /// Detects the current host from `uname -n`. Falls back to `Desktop`.
    pub async fn detect() -> Self {
        match command::run_captured("uname", &["-n"], None).await {
            Ok(out) if out.success() => Self::from_node_name(out.output.trim()),
            _ => HostProfile::Desktop,
        }
    }
}

impl FromStr for HostProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DISCOVER" => Ok(HostProfile::Discover),
            "PLEIADES" => Ok(HostProfile::Pleiades),
            "DESKTOP" => Ok(HostProfile::Desktop),
            other => Err(format!("unknown host profile `{}`", other)),
        }
    }
}

impl fmt::Display for HostProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostProfile::Discover => "DISCOVER",
            HostProfile::Pleiades => "PLEIADES",
            HostProfile::Desktop => "DESKTOP",
        };
        f.write_str(name)
    }
}
