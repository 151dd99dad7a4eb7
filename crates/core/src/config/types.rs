use serde::{Deserialize, Serialize};

/// Prefetch engine configuration.
///
/// `buffer_size` is the steady-state number of ready items the engine keeps
/// ahead of the consumer. Two policy knobs cover behavior that historically
/// flipped between revisions and is deliberately tunable rather than fixed:
/// `admission_slack` (how many fetches beyond `buffer_size` may be in flight)
/// and `inclusive_backpressure` (the boundary of the outstanding-count
/// comparison).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrerollConfig {
    /// Steady-state ready-item target.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Extra concurrent fetches allowed beyond `buffer_size`.
    /// Admission capacity is `buffer_size + admission_slack`.
    #[serde(default = "default_admission_slack")]
    pub admission_slack: usize,

    /// When true the backpressure condition is `outstanding <= buffer_size`
    /// instead of the default strict `outstanding < buffer_size`.
    #[serde(default)]
    pub inclusive_backpressure: bool,
}

fn default_buffer_size() -> usize {
    3
}

fn default_admission_slack() -> usize {
    1
}

impl Default for PrerollConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            admission_slack: default_admission_slack(),
            inclusive_backpressure: false,
        }
    }
}

impl PrerollConfig {
    /// Total number of items that may occupy the requesting + buffered
    /// window at once.
    pub fn capacity(&self) -> usize {
        self.buffer_size + self.admission_slack
    }

    /// Whether the externally reported outstanding count still permits
    /// scheduling more work.
    pub fn permits(&self, outstanding: usize) -> bool {
        if self.inclusive_backpressure {
            outstanding <= self.buffer_size
        } else {
            outstanding < self.buffer_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PrerollConfig::default();
        assert_eq!(config.buffer_size, 3);
        assert_eq!(config.admission_slack, 1);
        assert!(!config.inclusive_backpressure);
        assert_eq!(config.capacity(), 4);
    }

    #[test]
    fn test_permits_strict_boundary() {
        let config = PrerollConfig::default();
        assert!(config.permits(2));
        assert!(!config.permits(3));
        assert!(!config.permits(4));
    }

    #[test]
    fn test_permits_inclusive_boundary() {
        let config = PrerollConfig {
            inclusive_backpressure: true,
            ..Default::default()
        };
        assert!(config.permits(2));
        assert!(config.permits(3));
        assert!(!config.permits(4));
    }

    #[test]
    fn test_capacity_without_slack() {
        let config = PrerollConfig {
            admission_slack: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity(), 3);
    }
}
