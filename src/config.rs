//! Engine configuration
//!
//! JSON document naming the shapes a provider can translate:
//!
//! ```json
//! {
//!   "capabilities": {
//!     "translatable": ["source", "filter", "lambda", "parameter", "member", "binary"],
//!     "untranslatable": ["call:double"],
//!     "absorbing": ["project"]
//!   },
//!   "capture_projections": true,
//!   "log_unregistered": true
//! }
//! ```
//!
//! A tag may appear in only one list. Shapes in no list are unregistered and
//! always deferred.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::RuleRegistry;
use crate::decomposer::DecomposeOptions;
use crate::expr::ShapeTag;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid shape tag '{tag}' in {list}")]
    InvalidTag { tag: String, list: &'static str },

    #[error("shape tag '{tag}' is listed as both {first} and {second}")]
    ConflictingTag {
        tag: String,
        first: &'static str,
        second: &'static str,
    },
}

/// Shape tags by provider capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub translatable: Vec<String>,

    #[serde(default)]
    pub untranslatable: Vec<String>,

    /// Translatable projections whose supported selector parts may be
    /// captured
    #[serde(default)]
    pub absorbing: Vec<String>,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capabilities: Capabilities,

    /// Push supported parts of mixed selectors to the provider (default: true)
    #[serde(default = "default_true")]
    pub capture_projections: bool,

    /// Warn for every unregistered shape met (default: true)
    #[serde(default = "default_true")]
    pub log_unregistered: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::default(),
            capture_projections: default_true(),
            log_unregistered: default_true(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Adds translatable shape tags
    pub fn translatable<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities.translatable.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds untranslatable shape tags
    pub fn untranslatable<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities.untranslatable.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds absorbing projection tags
    pub fn absorbing<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.capabilities.absorbing.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_capture(mut self, enabled: bool) -> Self {
        self.capture_projections = enabled;
        self
    }

    /// Checks every tag parses and appears in only one list
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_lists().map(|_| ())
    }

    /// Builds a registry with a stock rule per listed tag
    pub fn build_registry(&self) -> Result<RuleRegistry, ConfigError> {
        let [translatable, untranslatable, absorbing] = self.parsed_lists()?;

        let mut registry = RuleRegistry::new();
        registry
            .translatable(translatable)
            .untranslatable(untranslatable)
            .absorbing(absorbing);
        Ok(registry)
    }

    pub fn decompose_options(&self) -> DecomposeOptions {
        DecomposeOptions {
            capture_projections: self.capture_projections,
        }
    }

    fn parsed_lists(&self) -> Result<[Vec<ShapeTag>; 3], ConfigError> {
        let lists: [(&'static str, &Vec<String>); 3] = [
            ("translatable", &self.capabilities.translatable),
            ("untranslatable", &self.capabilities.untranslatable),
            ("absorbing", &self.capabilities.absorbing),
        ];

        let mut seen: Vec<(ShapeTag, &'static str)> = Vec::new();
        let mut parsed: [Vec<ShapeTag>; 3] = Default::default();

        for (i, (list, tags)) in lists.into_iter().enumerate() {
            for text in tags.iter() {
                let tag = ShapeTag::parse(text).ok_or_else(|| ConfigError::InvalidTag {
                    tag: text.clone(),
                    list,
                })?;

                if let Some(&(_, first)) = seen.iter().find(|(existing, _)| *existing == tag) {
                    if first != list {
                        return Err(ConfigError::ConflictingTag {
                            tag: tag.to_string(),
                            first,
                            second: list,
                        });
                    }
                    // Repeated within one list
                    continue;
                }

                seen.push((tag.clone(), list));
                parsed[i].push(tag);
            }
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Resolution;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert!(config.capture_projections);
        assert!(config.log_unregistered);
        assert!(config.build_registry().unwrap().is_empty());
    }

    #[test]
    fn test_build_registry() {
        let config = EngineConfig::from_json_str(
            r#"{
                "capabilities": {
                    "translatable": ["filter", "call"],
                    "untranslatable": ["call:double"],
                    "absorbing": ["project"]
                },
                "capture_projections": false
            }"#,
        )
        .unwrap();
        assert!(!config.decompose_options().capture_projections);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lookup(&ShapeTag::qualified("call", "double")).name(), "untranslatable");
        assert_eq!(
            registry.resolve(&ShapeTag::qualified("call", "lower")).resolution,
            Resolution::KindFallback
        );
        assert!(registry.lookup(&ShapeTag::new("project")).absorbs());
    }

    #[test]
    fn test_conflicting_tag() {
        let config = EngineConfig::default()
            .translatable(["member:name"])
            .untranslatable(["member:name"]);

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ConflictingTag { first: "translatable", second: "untranslatable", .. }
        ));
    }

    #[test]
    fn test_duplicate_in_one_list_is_allowed() {
        let config = EngineConfig::default().translatable(["filter", "filter"]);
        assert_eq!(config.build_registry().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_tag() {
        let err = EngineConfig::from_json_str(r#"{"capabilities": {"absorbing": ["project:"]}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTag { list: "absorbing", .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid config JSON"));
    }
}
