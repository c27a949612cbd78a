pub mod config;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod params;
pub mod recorder;
pub mod runtime;
pub mod types;
pub mod watcher;

use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, CliOverrides};
use errors::MonitorError;
use logging::EventLog;
use orchestrator::{LifecycleReport, SessionOrchestrator};
use params::RawInputs;
use runtime::{EnvMap, MonitorRuntime};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Parser)]
#[command(name = "session-monitor", version)]
#[command(about = "Bracket a target process's lifetime with session recorder start/stop calls")]
pub struct Cli {
    /// Target process image name, including its extension (e.g. app.exe)
    pub process_name: Option<String>,
    /// Test case identifier [default: PSPV-TC-10391]
    pub testcase_id: Option<String>,
    /// User name reported to the recorder [default: current OS user]
    pub user_name: Option<String>,
    /// Comma-separated log collectors [default: WLAN,PnP,ETL]
    pub log_collectors: Option<String>,
    pub test_domain: Option<String>,
    pub test_name: Option<String>,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Recorder executable path, overriding config
    #[arg(long)]
    pub recorder: Option<PathBuf>,
    /// Append lifecycle events as JSON lines to this file
    #[arg(long)]
    pub event_log: Option<PathBuf>,
    /// Give up on either wait after this many seconds (unbounded if unset)
    #[arg(long)]
    pub max_wait_seconds: Option<u64>,
}

impl Cli {
    pub fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            process_name: self.process_name.clone(),
            testcase_id: self.testcase_id.clone(),
            user_name: self.user_name.clone(),
            log_collectors: self.log_collectors.clone(),
            test_domain: self.test_domain.clone(),
            test_name: self.test_name.clone(),
        }
    }
}

pub fn run() -> Result<i32, MonitorError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let env = std::env::vars_os().collect::<Vec<_>>();
    let runtime = MonitorRuntime::new();
    run_with_runtime(&args, &env, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    env: &[(std::ffi::OsString, std::ffi::OsString)],
    runtime: &MonitorRuntime,
) -> Result<i32, MonitorError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(MonitorError::Cli(error.to_string())),
        },
    };

    let report = monitor(&cli, &env_to_map(env), runtime)?.into_result()?;
    let skipped = report
        .recorder_calls
        .iter()
        .filter(|call| !call.outcome.was_issued())
        .count();
    info!(
        process = %report.params.process_name,
        recorder_calls = report.recorder_calls.len(),
        skipped,
        "monitoring complete"
    );
    Ok(0)
}

/// Loads configuration and runs one full lifecycle for `cli`.
pub fn monitor(
    cli: &Cli,
    env: &EnvMap,
    runtime: &MonitorRuntime,
) -> Result<LifecycleReport, MonitorError> {
    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        recorder_path: cli.recorder.clone(),
        max_wait_seconds: cli.max_wait_seconds,
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;
    let events = cli
        .event_log
        .as_ref()
        .map_or_else(EventLog::disabled, EventLog::to_file);

    SessionOrchestrator::new(&cfg, runtime, events).run(&cli.raw_inputs(), env)
}

pub fn render_help() -> String {
    Cli::command().render_long_help().to_string()
}

fn env_to_map(env: &[(std::ffi::OsString, std::ffi::OsString)]) -> EnvMap {
    let mut map = EnvMap::new();
    for (key, value) in env {
        if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}
