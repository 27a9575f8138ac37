/// Configuration for the history engine.
use std::time::Duration;

use retrace_config::HistorySettings;
pub use retrace_config::ClearPolicy;

/// Time window within which consecutive same-kind edits replay as one step.
const DEFAULT_COALESCE_WINDOW_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum timestamp distance from the first entry of a replay run
    /// for a following entry to join it.
    pub coalesce_window: Duration,
    pub clear_policy: ClearPolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(DEFAULT_COALESCE_WINDOW_MS),
            clear_policy: ClearPolicy::default(),
        }
    }
}

impl From<&HistorySettings> for HistoryConfig {
    fn from(settings: &HistorySettings) -> Self {
        Self {
            coalesce_window: Duration::from_millis(settings.coalesce_window_ms),
            clear_policy: settings.clear_policy,
        }
    }
}

impl HistoryConfig {
    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    pub fn with_clear_policy(mut self, policy: ClearPolicy) -> Self {
        self.clear_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HistoryConfig::default();
        assert_eq!(config.coalesce_window, Duration::from_millis(500));
        assert_eq!(config.clear_policy, ClearPolicy::Matching);
    }

    #[test]
    fn test_builders() {
        let config = HistoryConfig::default()
            .with_coalesce_window(Duration::ZERO)
            .with_clear_policy(ClearPolicy::Everything);
        assert_eq!(config.coalesce_window, Duration::ZERO);
        assert_eq!(config.clear_policy, ClearPolicy::Everything);
    }

    #[test]
    fn test_from_settings() {
        let settings = HistorySettings {
            coalesce_window_ms: 250,
            clear_policy: ClearPolicy::Everything,
        };
        let config = HistoryConfig::from(&settings);
        assert_eq!(config.coalesce_window, Duration::from_millis(250));
        assert_eq!(config.clear_policy, ClearPolicy::Everything);

        let defaults = HistoryConfig::from(&HistorySettings::default());
        assert_eq!(defaults.coalesce_window, HistoryConfig::default().coalesce_window);
    }
}
