//! Runtime settings resolved from the layered configuration

use crate::buffer::FlushPolicy;
use crate::logging::LoggingOptions;
use pmoconfig::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Metadata endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

/// Everything the tracker binary needs, with paths resolved against the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub refresh_rate: Duration,
    pub max_batch_size: usize,
    pub root_path: PathBuf,
    pub stations_file: PathBuf,
    pub output_dir: PathBuf,
    pub source: SourceSettings,
    pub logging: LoggingOptions,
}

impl TrackerSettings {
    /// Fails when the refresh rate is zero, which would poll without pause
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let refresh_rate = config.get_refresh_rate()?;
        if refresh_rate == 0 {
            anyhow::bail!("tracker.refresh_rate must be at least 1 second");
        }

        let root = config.get_root_path()?;
        let log_file = config.get_log_file()?;

        Ok(Self {
            refresh_rate: Duration::from_secs(refresh_rate),
            max_batch_size: config.get_max_batch_size()?,
            stations_file: root.join(config.get_stations_file()?),
            output_dir: root.join(config.get_output_dir()?),
            source: SourceSettings {
                url: config.get_source_url()?,
                timeout: Duration::from_secs(config.get_source_timeout_secs()?),
                max_retries: config.get_source_max_retries()?,
                backoff_base: Duration::from_millis(config.get_source_backoff_ms()?),
            },
            logging: LoggingOptions {
                min_level: config.get_log_min_level()?,
                file: (!log_file.trim().is_empty()).then(|| root.join(log_file.trim())),
                enable_console: config.get_log_enable_console()?,
            },
            root_path: root,
        })
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::new(self.refresh_rate, self.max_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_under_current_dir() {
        let config = Config::from_yaml_str("{}").unwrap();
        let settings = TrackerSettings::from_config(&config).unwrap();

        assert_eq!(settings.refresh_rate, Duration::from_secs(90));
        assert_eq!(settings.max_batch_size, 1000);
        assert_eq!(settings.root_path, PathBuf::from("."));
        assert_eq!(settings.stations_file, PathBuf::from("./relevant_stations.txt"));
        assert_eq!(settings.output_dir, PathBuf::from("./gathered_data"));
        assert_eq!(settings.logging.file, Some(PathBuf::from("./app.log")));
        assert_eq!(settings.logging.min_level, "DEBUG");
        assert_eq!(settings.source.max_retries, 3);
        assert_eq!(settings.source.backoff_base, Duration::from_millis(500));
        assert_eq!(settings.flush_policy(), FlushPolicy::default());
    }

    #[test]
    fn test_paths_follow_root() {
        let config = Config::from_yaml_str(
            "tracker:\n  root_path: /srv/antenne\n  refresh_rate: 30\n  max_batch_size: 50\nlogger:\n  file: logs/tracker.log\n",
        )
        .unwrap();
        let settings = TrackerSettings::from_config(&config).unwrap();

        assert_eq!(settings.stations_file, PathBuf::from("/srv/antenne/relevant_stations.txt"));
        assert_eq!(settings.output_dir, PathBuf::from("/srv/antenne/gathered_data"));
        assert_eq!(settings.logging.file, Some(PathBuf::from("/srv/antenne/logs/tracker.log")));

        let policy = settings.flush_policy();
        assert_eq!(policy.interval(), Duration::from_secs(30));
        assert_eq!(policy.max_batch_size(), 50);
    }

    #[test]
    fn test_zero_refresh_rate_is_rejected() {
        let config = Config::from_yaml_str("tracker:\n  refresh_rate: 0\n").unwrap();
        let err = TrackerSettings::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("refresh_rate"));

        let config = Config::from_yaml_str("tracker:\n  refresh_rate: 1\n").unwrap();
        let settings = TrackerSettings::from_config(&config).unwrap();
        assert_eq!(settings.refresh_rate, Duration::from_secs(1));
    }

    #[test]
    fn test_empty_log_file_disables_file_logging() {
        let config = Config::from_yaml_str("logger:\n  file: \"\"\n").unwrap();
        let settings = TrackerSettings::from_config(&config).unwrap();
        assert_eq!(settings.logging.file, None);
    }
}
