// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML loader for reader history profiles.
//!
//! # Example YAML
//!
//! ```yaml
//! default_profile: sensor_cache
//! profiles:
//!   sensor_cache:
//!     history:
//!       kind: KEEP_LAST
//!       depth: 100
//!     resource_limits:
//!       max_samples: 5000
//!       max_instances: 50
//!       max_samples_per_instance: 100
//! ```
//!
//! Limits use DDS conventions: `-1` (or `0`) means unlimited.

use super::{History, ReaderHistoryQos, ResourceLimits};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// YAML history profile loader.
pub struct YamlLoader;

/// Root YAML document structure.
#[derive(Debug, Deserialize)]
pub struct YamlHistoryDocument {
    /// Named history profiles.
    #[serde(default)]
    pub profiles: HashMap<String, YamlHistoryProfile>,

    /// Default profile name (optional).
    #[serde(default)]
    pub default_profile: Option<String>,
}

/// A single profile in YAML format.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct YamlHistoryProfile {
    pub history: Option<YamlHistory>,
    pub resource_limits: Option<YamlResourceLimits>,
}

/// History QoS in YAML.
#[derive(Debug, Deserialize)]
pub struct YamlHistory {
    /// KEEP_LAST or KEEP_ALL
    pub kind: String,
    /// Depth for KEEP_LAST
    #[serde(default = "default_history_depth")]
    pub depth: u32,
}

fn default_history_depth() -> u32 {
    1
}

/// Resource limits in YAML.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct YamlResourceLimits {
    pub max_samples: i32,
    pub max_instances: i32,
    pub max_samples_per_instance: i32,
    pub allocated_samples: i32,
}

impl Default for YamlResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: -1,
            max_instances: -1,
            max_samples_per_instance: -1,
            allocated_samples: 0,
        }
    }
}

fn limit_from_yaml(v: i32) -> usize {
    // Negative values are LENGTH_UNLIMITED; 0 already means unlimited.
    usize::try_from(v).unwrap_or(0)
}

impl YamlLoader {
    /// Load history profiles from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<YamlHistoryDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigFileNotFound(path.display().to_string())
            } else {
                Error::IoError(e)
            }
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse YAML content.
    pub fn parse_yaml(content: &str) -> Result<YamlHistoryDocument> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::InvalidQos(format!("Failed to parse YAML: {}", e)))
    }

    /// Get QoS by profile name.
    pub fn get_profile(doc: &YamlHistoryDocument, name: &str) -> Result<ReaderHistoryQos> {
        let profile = doc
            .profiles
            .get(name)
            .ok_or_else(|| Error::InvalidQos(format!("Profile '{}' not found", name)))?;
        Self::profile_to_qos(profile)
    }

    /// Get the default profile, or the only one, or the default QoS.
    pub fn get_default_profile(doc: &YamlHistoryDocument) -> Result<ReaderHistoryQos> {
        if let Some(ref default_name) = doc.default_profile {
            Self::get_profile(doc, default_name)
        } else if let Some((_, profile)) = doc.profiles.iter().next() {
            Self::profile_to_qos(profile)
        } else {
            Ok(ReaderHistoryQos::default())
        }
    }

    /// Convert a YAML profile to QoS and validate it.
    pub fn profile_to_qos(profile: &YamlHistoryProfile) -> Result<ReaderHistoryQos> {
        let mut qos = ReaderHistoryQos::default();

        if let Some(ref h) = profile.history {
            qos.history = match h.kind.to_uppercase().as_str() {
                "KEEP_LAST" => History::KeepLast(h.depth),
                "KEEP_ALL" => History::KeepAll,
                other => {
                    return Err(Error::InvalidQos(format!(
                        "Unknown history kind '{}'",
                        other
                    )))
                }
            };
        }

        if let Some(ref rl) = profile.resource_limits {
            qos.resource_limits = ResourceLimits {
                max_samples: limit_from_yaml(rl.max_samples),
                max_instances: limit_from_yaml(rl.max_instances),
                max_samples_per_instance: limit_from_yaml(rl.max_samples_per_instance),
                allocated_samples: limit_from_yaml(rl.allocated_samples),
            };
        }

        qos.validate()?;
        Ok(qos)
    }

    /// Load a profile from file (named, or the document default).
    pub fn load_qos<P: AsRef<Path>>(path: P, profile_name: Option<&str>) -> Result<ReaderHistoryQos> {
        let doc = Self::load_from_file(path)?;
        match profile_name {
            Some(name) => Self::get_profile(&doc, name),
            None => Self::get_default_profile(&doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_keep_last_profile() {
        let yaml = r#"
profiles:
  sensors:
    history:
      kind: KEEP_LAST
      depth: 8
    resource_limits:
      max_instances: 4
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("valid YAML should parse");
        let qos = YamlLoader::get_profile(&doc, "sensors").expect("profile should exist");
        assert_eq!(qos.history, History::KeepLast(8));
        assert_eq!(qos.resource_limits.max_instances, 4);
        assert_eq!(qos.resource_limits.max_samples, 0);
    }

    #[test]
    fn test_parse_keep_all_with_limits() {
        let yaml = r#"
default_profile: bounded
profiles:
  bounded:
    history:
      kind: keep_all
    resource_limits:
      max_samples: 100
      max_samples_per_instance: 10
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("valid YAML should parse");
        let qos = YamlLoader::get_default_profile(&doc).expect("default profile");
        assert_eq!(qos.history, History::KeepAll);
        assert_eq!(qos.resource_limits.max_samples, 100);
        assert_eq!(qos.resource_limits.max_samples_per_instance, 10);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let yaml = r#"
profiles:
  broken:
    history:
      kind: KEEP_LAST
      depth: 0
"#;
        let doc = YamlLoader::parse_yaml(yaml).expect("valid YAML should parse");
        assert!(matches!(
            YamlLoader::get_profile(&doc, "broken"),
            Err(Error::InvalidQos(_))
        ));
        assert!(YamlLoader::get_profile(&doc, "missing").is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let yaml = "profiles:\n  p:\n    history:\n      kind: KEEP_SOME\n";
        let doc = YamlLoader::parse_yaml(yaml).expect("valid YAML should parse");
        assert!(YamlLoader::get_profile(&doc, "p").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "profiles:\n  only:\n    history:\n      kind: KEEP_LAST\n      depth: 3"
        )
        .expect("write yaml");

        let qos = YamlLoader::load_qos(file.path(), None).expect("load profile");
        assert_eq!(qos.history, History::KeepLast(3));
    }

    #[test]
    fn test_missing_file() {
        let err = YamlLoader::load_qos("/nonexistent/hdds_history.yaml", None)
            .expect_err("missing file should fail");
        assert!(matches!(err, Error::ConfigFileNotFound(_)));
    }
}
