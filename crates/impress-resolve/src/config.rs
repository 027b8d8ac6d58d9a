//! Configuration for impress-resolve
//!
//! One `ResolverConfig` is built per run and passed by reference into every
//! stage. Its values fully determine engine behavior.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blocking::BlockingStrategy;
use crate::cluster::ClusteringPolicy;
use crate::error::ConfigError;

/// What kind of identity is being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Person names ("Surname, Given" or "Given Surname")
    #[default]
    Person,
    /// Subject keywords
    Subject,
}

impl EntityKind {
    /// Blocking strategy used when the config does not override it
    pub fn default_blocking(&self) -> BlockingStrategy {
        match self {
            EntityKind::Person => BlockingStrategy::Surname,
            EntityKind::Subject => BlockingStrategy::FirstChar,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Kind of identity being resolved
    pub entity: EntityKind,
    /// Blocking override; `None` uses the entity default
    pub blocking: Option<BlockingStrategy>,
    /// Lower bound of the review band
    pub similarity_threshold: f64,
    /// Lower bound of the auto-merge band
    pub high_confidence_cutoff: f64,
    /// Score emitted when initials are compatible
    pub initials_bonus: f64,
    /// Family names that need extra given-name evidence
    pub common_surname_denylist: Vec<String>,
    /// Given-name initials required for a denylisted surname
    pub min_shared_initials: usize,
    /// Surface forms restored verbatim when recasing
    pub preserved_acronyms: Vec<String>,
    /// Star (anchor-only) or transitive clustering
    pub clustering_policy: ClusteringPolicy,
    /// Character margin for the unabbreviated-form rule
    pub length_margin: usize,
    /// Enable the `grammar` recasing method
    pub orthography: bool,
    /// Upper bound on convergence passes
    pub max_passes: usize,
    /// Keys longer than this fail scoring
    pub max_key_chars: usize,
    /// Shard blocks across worker threads
    pub parallel: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            entity: EntityKind::Person,
            blocking: None,
            similarity_threshold: 0.85,
            high_confidence_cutoff: 0.92,
            initials_bonus: 0.95,
            common_surname_denylist: [
                "silva", "santos", "oliveira", "souza", "rodrigues", "ferreira", "alves",
                "pereira", "lima", "gomes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_shared_initials: 2,
            preserved_acronyms: [
                "UnB",
                "IBICT",
                "Brasília",
                "Distrito Federal",
                "Brasil",
                "PMDF",
                "DF",
                "Mestrado",
                "Doutorado",
                "MEC",
                "CAPES",
                "MDF",
                "PP",
                "PEAD",
                "eMulti",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            clustering_policy: ClusteringPolicy::Star,
            length_margin: 5,
            orthography: false,
            max_passes: 8,
            max_key_chars: 512,
            parallel: true,
        }
    }
}

impl ResolverConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults tuned for subject keywords
    pub fn for_subjects() -> Self {
        Self {
            entity: EntityKind::Subject,
            ..Self::default()
        }
    }

    /// Effective blocking strategy
    pub fn blocking_strategy(&self) -> BlockingStrategy {
        self.blocking.unwrap_or_else(|| self.entity.default_blocking())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, picking the format by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_toml(&text),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("high_confidence_cutoff", self.high_confidence_cutoff),
            ("initials_bonus", self.initials_bonus),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.similarity_threshold > self.high_confidence_cutoff {
            return Err(ConfigError::InvalidThresholds(
                "similarity_threshold must not exceed high_confidence_cutoff".to_string(),
            ));
        }

        if self.max_passes == 0 {
            return Err(ConfigError::OutOfRange(
                "max_passes must be positive".to_string(),
            ));
        }

        if self.max_key_chars == 0 {
            return Err(ConfigError::OutOfRange(
                "max_key_chars must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
