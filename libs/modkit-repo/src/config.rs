//! Configuration for the generic repository

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Actor recorded on audit stamps when the caller does not supply one
pub const DEFAULT_ACTOR: &str = "SYSTEM";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "MODKIT_REPO_";

/// Repository configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Actor written to created_by/updated_by when none is given
    #[serde(default = "default_actor")]
    pub default_actor: String,

    /// Upper bound for page sizes; larger requests are clamped. 0 means
    /// no bound.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Append the primary key as a secondary ORDER BY on paged queries
    #[serde(default = "default_true")]
    pub key_tiebreak: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_actor: default_actor(),
            max_page_size: default_max_page_size(),
            key_tiebreak: true,
        }
    }
}

impl RepositoryConfig {
    /// Load configuration: defaults, then the optional YAML file, then
    /// `MODKIT_REPO_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }

        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        tracing::debug!(
            default_actor = %config.default_actor,
            max_page_size = config.max_page_size,
            key_tiebreak = config.key_tiebreak,
            "Repository configuration loaded"
        );
        Ok(config)
    }
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_max_page_size() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}
