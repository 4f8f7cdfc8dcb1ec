//! Tuning configuration for the hierarchy engine.
//!
//! Load order: `.htree/config.toml` → environment variables → defaults,
//! mirroring how RPG's own config layer is loaded.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} as TOML: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Top-level hierarchy engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierConfig {
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

impl Default for HierConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Child-nodes cache tuning (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Tier-1 capacity: distinct parents kept in the cache.
    pub max_parents: usize,
    /// Tier-2 capacity: `(instanceFilter, sizeLimit)` variations per parent.
    pub max_variations_per_parent: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_parents: 32,
            max_variations_per_parent: 2,
        }
    }
}

/// Streaming pipeline tuning (§4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items processed by any stage before it cooperatively yields.
    pub yield_every_n_items: usize,
    /// Default per-hierarchy-level row limit. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_row_limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            yield_every_n_items: 100,
            default_row_limit: None,
        }
    }
}

fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl HierConfig {
    /// Load config from `.htree/config.toml` under `project_root`, with env
    /// var overrides. Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let config_path = project_root.join(".htree").join("config.toml");

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.display().to_string(),
                    source,
                })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: config_path.display().to_string(),
                source: Box::new(source),
            })?
        } else {
            Self::default()
        };

        env_override("HTREE_CACHE_MAX_PARENTS", &mut config.cache.max_parents);
        env_override(
            "HTREE_CACHE_MAX_VARIATIONS",
            &mut config.cache.max_variations_per_parent,
        );
        env_override(
            "HTREE_YIELD_EVERY_N_ITEMS",
            &mut config.pipeline.yield_every_n_items,
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_example_bounds() {
        let config = HierConfig::default();
        assert_eq!(config.cache.max_parents, 32);
        assert_eq!(config.cache.max_variations_per_parent, 2);
        assert_eq!(config.pipeline.yield_every_n_items, 100);
        assert!(config.pipeline.default_row_limit.is_none());
    }

    #[test]
    fn config_from_toml_overrides_defaults() {
        let toml_str = r#"
[cache]
max_parents = 64

[pipeline]
yield_every_n_items = 250
"#;
        let config: HierConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.max_parents, 64);
        assert_eq!(config.cache.max_variations_per_parent, 2);
        assert_eq!(config.pipeline.yield_every_n_items, 250);
    }

    #[test]
    fn load_nonexistent_falls_back_to_defaults() {
        let config = HierConfig::load(Path::new("/nonexistent/project")).unwrap();
        assert_eq!(config.cache.max_parents, 32);
    }

    #[test]
    fn load_reads_and_overrides_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".htree");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            "[cache]\nmax_parents = 8\n",
        )
        .unwrap();

        let config = HierConfig::load(tmp.path()).unwrap();
        assert_eq!(config.cache.max_parents, 8);
    }
}
