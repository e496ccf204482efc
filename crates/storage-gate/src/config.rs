//! Policy file definitions for the storage permission gate.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Static storage policy definition file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoragePolicyFile {
    pub version: u32,
    pub defaults: StoragePolicyTemplate,
    pub origins: Vec<OriginPolicy>,
}

/// Subject-name patterns applied when no origin rule overrides them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoragePolicyTemplate {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OriginPolicy {
    pub match_pattern: String,
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Errors surfaced while loading policy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize policy: {0}")]
    Deserialize(String),
}

pub fn load_policy_from_reader<R: Read>(mut reader: R) -> Result<StoragePolicyFile, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_policy_str(&buf)
}

pub fn load_policy_from_path(path: impl AsRef<Path>) -> Result<StoragePolicyFile, ConfigError> {
    let file = File::open(path.as_ref())?;
    load_policy_from_reader(file)
}

pub fn parse_policy_str(raw: &str) -> Result<StoragePolicyFile, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(policy) => Ok(policy),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}

/// Default policy used when configuration files are missing: every subject is
/// open, with one narrowing example rule.
pub fn default_policy_file() -> StoragePolicyFile {
    StoragePolicyFile {
        version: 1,
        defaults: StoragePolicyTemplate {
            allow: vec!["*".into()],
            deny: vec![],
        },
        origins: vec![OriginPolicy {
            match_pattern: "https://*.example.com".into(),
            allow: Some(vec!["inbox".into(), "drafts".into()]),
            deny: None,
            notes: Some("Default example policy".into()),
        }],
    }
}
