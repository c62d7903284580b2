//! Evaluation settings for a [`FunctionTree`](crate::FunctionTree).

use serde::{Deserialize, Serialize};

/// Settings applied to every recomputation of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Log a warning when a node produces NaN or infinity.
    pub check_finite: bool,
    /// Fan-out of dirty sibling subtrees.
    pub parallel: ParallelConfig,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            check_finite: true,
            parallel: ParallelConfig::default(),
        }
    }
}

impl TreeConfig {
    /// Default settings with parallel recomputation switched on.
    pub fn parallel() -> Self {
        Self {
            parallel: ParallelConfig {
                enabled: true,
                ..ParallelConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Configuration for parallel recomputation of dirty children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub enabled: bool,
    /// Minimum number of dirty child nodes to trigger parallel recomputation.
    /// Below this threshold, children recompute sequentially to avoid overhead.
    pub threshold: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert!(config.check_finite);
        assert!(!config.parallel.enabled);
        assert_eq!(config.parallel.threshold, 2);
        assert!(TreeConfig::parallel().parallel.enabled);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: TreeConfig =
            serde_json::from_str(r#"{"parallel":{"enabled":true}}"#).unwrap();
        assert!(config.check_finite);
        assert!(config.parallel.enabled);
        assert_eq!(config.parallel.threshold, 2);
    }
}
