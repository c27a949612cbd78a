use crate::errors::MonitorError;
use crate::runtime::FileSystem;
use crate::types::LogCollectors;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TESTCASE_ID: &str = "PSPV-TC-10391";
pub const DEFAULT_LOG_COLLECTORS: [&str; 3] = ["WLAN", "PnP", "ETL"];
pub const DEFAULT_TEAM_NAME: &str = "SIV";
pub const DEFAULT_RUN_TYPE: &str = "Debug";
pub const DEFAULT_START_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_STOP_INTERVAL_MS: u64 = 2000;
pub const MAX_POLL_INTERVAL_MS: u64 = 60 * 60 * 1000;

#[cfg(windows)]
pub const DEFAULT_RECORDER_PATH: &str = r"C:\Program Files\SessionRecorder\recorder.exe";
#[cfg(not(windows))]
pub const DEFAULT_RECORDER_PATH: &str = "/usr/local/bin/session-recorder";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub recorder_path: Option<PathBuf>,
    pub max_wait_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    pub recorder: RecorderConfig,
    pub defaults: DefaultsConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderConfig {
    pub path: PathBuf,
    pub team_name: String,
    pub run_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultsConfig {
    pub testcase_id: String,
    pub log_collectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    pub start_interval_ms: u64,
    pub stop_interval_ms: u64,
    pub max_wait_seconds: Option<u64>,
}

impl PollingConfig {
    pub fn start_interval(&self) -> Duration {
        Duration::from_millis(self.start_interval_ms)
    }

    pub fn stop_interval(&self) -> Duration {
        Duration::from_millis(self.stop_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_seconds.map(Duration::from_secs)
    }
}

impl DefaultsConfig {
    pub fn collectors(&self) -> LogCollectors {
        LogCollectors::new(&self.log_collectors)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig {
                path: PathBuf::from(DEFAULT_RECORDER_PATH),
                team_name: DEFAULT_TEAM_NAME.to_string(),
                run_type: DEFAULT_RUN_TYPE.to_string(),
            },
            defaults: DefaultsConfig {
                testcase_id: DEFAULT_TESTCASE_ID.to_string(),
                log_collectors: DEFAULT_LOG_COLLECTORS
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            },
            polling: PollingConfig {
                start_interval_ms: DEFAULT_START_INTERVAL_MS,
                stop_interval_ms: DEFAULT_STOP_INTERVAL_MS,
                max_wait_seconds: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialMonitorConfig {
    recorder: Option<PartialRecorderConfig>,
    defaults: Option<PartialDefaultsConfig>,
    polling: Option<PartialPollingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialRecorderConfig {
    path: Option<PathBuf>,
    team_name: Option<String>,
    run_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialDefaultsConfig {
    testcase_id: Option<String>,
    log_collectors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialPollingConfig {
    start_interval_ms: Option<u64>,
    stop_interval_ms: Option<u64>,
    max_wait_seconds: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<MonitorConfig, MonitorError> {
    let mut cfg = MonitorConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialMonitorConfig = toml::from_str(&file_contents)
            .map_err(|e| MonitorError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut MonitorConfig, partial: PartialMonitorConfig) {
    if let Some(recorder) = partial.recorder {
        if let Some(path) = recorder.path {
            cfg.recorder.path = path;
        }
        if let Some(team_name) = recorder.team_name {
            cfg.recorder.team_name = team_name;
        }
        if let Some(run_type) = recorder.run_type {
            cfg.recorder.run_type = run_type;
        }
    }

    if let Some(defaults) = partial.defaults {
        if let Some(testcase_id) = defaults.testcase_id {
            cfg.defaults.testcase_id = testcase_id;
        }
        if let Some(log_collectors) = defaults.log_collectors {
            cfg.defaults.log_collectors = log_collectors;
        }
    }

    if let Some(polling) = partial.polling {
        if let Some(value) = polling.start_interval_ms {
            cfg.polling.start_interval_ms = value;
        }
        if let Some(value) = polling.stop_interval_ms {
            cfg.polling.stop_interval_ms = value;
        }
        if let Some(value) = polling.max_wait_seconds {
            cfg.polling.max_wait_seconds = Some(value);
        }
    }
}

fn apply_cli_overrides(cfg: &mut MonitorConfig, overrides: &CliOverrides) {
    if let Some(path) = &overrides.recorder_path {
        cfg.recorder.path = path.clone();
    }
    if let Some(seconds) = overrides.max_wait_seconds {
        cfg.polling.max_wait_seconds = Some(seconds);
    }
}

fn validate_config(cfg: &MonitorConfig) -> Result<(), MonitorError> {
    if cfg.recorder.path.as_os_str().is_empty() {
        return Err(MonitorError::InvalidConfig(
            "recorder.path must not be empty".to_string(),
        ));
    }
    if cfg.recorder.team_name.trim().is_empty() {
        return Err(MonitorError::InvalidConfig(
            "recorder.team_name must not be empty".to_string(),
        ));
    }
    if cfg.recorder.run_type.trim().is_empty() {
        return Err(MonitorError::InvalidConfig(
            "recorder.run_type must not be empty".to_string(),
        ));
    }
    if cfg.defaults.testcase_id.trim().is_empty() {
        return Err(MonitorError::InvalidConfig(
            "defaults.testcase_id must not be empty".to_string(),
        ));
    }
    if cfg.defaults.collectors().is_empty() {
        return Err(MonitorError::InvalidConfig(
            "defaults.log_collectors must name at least one collector".to_string(),
        ));
    }
    if cfg.polling.start_interval_ms == 0 || cfg.polling.stop_interval_ms == 0 {
        return Err(MonitorError::InvalidConfig(
            "polling intervals must be greater than zero".to_string(),
        ));
    }
    if cfg.polling.start_interval_ms > MAX_POLL_INTERVAL_MS
        || cfg.polling.stop_interval_ms > MAX_POLL_INTERVAL_MS
    {
        return Err(MonitorError::InvalidConfig(format!(
            "polling intervals must not exceed {MAX_POLL_INTERVAL_MS} ms"
        )));
    }
    Ok(())
}
