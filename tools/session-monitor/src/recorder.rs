use crate::config::RecorderConfig;
use crate::runtime::{FileSystem, ProcessRequest, ProcessRunner};
use crate::types::{
    RecorderCall, RecorderInvocation, RecorderOutcome, RecorderSubcommand, SessionParameters,
};
use tracing::{info, warn};

pub fn started_label(process_name: &str) -> String {
    format!("Process Started: {process_name}")
}

pub fn stopped_label(process_name: &str) -> String {
    format!("Process Stopped: {process_name}")
}

/// Adapter over the external session recorder. The executable is looked up
/// before every call; its absence turns the call into a logged no-op.
pub struct RecorderClient<'a> {
    config: &'a RecorderConfig,
    file_system: &'a dyn FileSystem,
    process_runner: &'a dyn ProcessRunner,
}

impl<'a> RecorderClient<'a> {
    pub fn new(
        config: &'a RecorderConfig,
        file_system: &'a dyn FileSystem,
        process_runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            config,
            file_system,
            process_runner,
        }
    }

    pub fn is_available(&self) -> bool {
        self.file_system.exists(&self.config.path)
    }

    pub fn enable_logging(&self) -> RecorderCall {
        self.issue(enable_logging_invocation())
    }

    pub fn start_session(&self, params: &SessionParameters) -> RecorderCall {
        self.issue(start_invocation(self.config, params))
    }

    pub fn mark_step(&self, label: &str) -> RecorderCall {
        self.issue(mark_step_invocation(label))
    }

    pub fn stop_session(&self) -> RecorderCall {
        self.issue(RecorderInvocation::new(RecorderSubcommand::Stop, Vec::new()))
    }

    fn issue(&self, invocation: RecorderInvocation) -> RecorderCall {
        let subcommand = invocation.subcommand().as_str();
        if !self.is_available() {
            warn!(
                subcommand,
                path = %self.config.path.display(),
                "recorder not found; skipping call"
            );
            return RecorderCall {
                invocation,
                outcome: RecorderOutcome::Skipped,
            };
        }

        let argv = invocation.argv();
        info!(subcommand, args = ?argv, "invoking recorder");
        let outcome = match self.process_runner.run(ProcessRequest {
            program: self.config.path.clone(),
            args: argv,
        }) {
            Ok(output) => {
                if output.exit_code != 0 {
                    warn!(
                        subcommand,
                        exit_code = output.exit_code,
                        stderr = output.stderr.trim(),
                        "recorder exited with non-zero status"
                    );
                }
                RecorderOutcome::Completed {
                    exit_code: output.exit_code,
                }
            }
            Err(error) => {
                warn!(subcommand, %error, "recorder invocation failed");
                RecorderOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        };

        RecorderCall {
            invocation,
            outcome,
        }
    }
}

pub fn enable_logging_invocation() -> RecorderInvocation {
    RecorderInvocation::new(
        RecorderSubcommand::EnableLogging,
        vec![("enable", "Yes".to_string())],
    )
}

pub fn start_invocation(config: &RecorderConfig, params: &SessionParameters) -> RecorderInvocation {
    let mut arguments = vec![
        ("testcase-id", params.testcase_id.clone()),
        ("user-name", params.user_name.clone()),
        ("team-name", config.team_name.clone()),
        ("run-type", config.run_type.clone()),
        ("log-collectors", params.log_collectors.render()),
    ];
    if let Some(domain) = &params.test_domain {
        arguments.push(("test-domain", domain.clone()));
    }
    if let Some(name) = &params.test_name {
        arguments.push(("test-name", name.clone()));
    }
    RecorderInvocation::new(RecorderSubcommand::Start, arguments)
}

pub fn mark_step_invocation(label: &str) -> RecorderInvocation {
    RecorderInvocation::new(
        RecorderSubcommand::MarkStep,
        vec![("test-step", label.to_string())],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::errors::MonitorError;
    use crate::runtime::{FakeFileSystem, FakeProcessRunner};
    use crate::types::LogCollectors;

    fn params() -> SessionParameters {
        SessionParameters {
            process_name: "app.exe".to_string(),
            testcase_id: "PSPV-TC-10391".to_string(),
            user_name: "tester".to_string(),
            log_collectors: LogCollectors::new(["WLAN", "PnP", "ETL"]),
            test_domain: None,
            test_name: None,
        }
    }

    #[test]
    fn start_invocation_omits_absent_domain_and_name() {
        let cfg = MonitorConfig::default();
        let argv = start_invocation(&cfg.recorder, &params()).argv();
        assert_eq!(
            argv,
            vec![
                "--start",
                "--testcase-id=PSPV-TC-10391",
                "--user-name=tester",
                "--team-name=SIV",
                "--run-type=Debug",
                "--log-collectors=WLAN,PnP,ETL",
            ]
        );

        let mut with_extras = params();
        with_extras.test_domain = Some("Graphics".to_string());
        with_extras.test_name = Some("Boot".to_string());
        let argv = start_invocation(&cfg.recorder, &with_extras).argv();
        assert_eq!(argv[argv.len() - 2], "--test-domain=Graphics");
        assert_eq!(argv[argv.len() - 1], "--test-name=Boot");
    }

    #[test]
    fn missing_recorder_skips_without_spawning() {
        let cfg = MonitorConfig::default();
        let fs = FakeFileSystem::default();
        let runner = FakeProcessRunner::default();
        let client = RecorderClient::new(&cfg.recorder, &fs, &runner);

        let call = client.enable_logging();
        assert_eq!(call.outcome, RecorderOutcome::Skipped);
        assert!(!call.outcome.was_issued());
        assert!(runner.spawned().is_empty());
    }

    #[test]
    fn present_recorder_receives_argv_and_reports_exit_code() {
        let cfg = MonitorConfig::default();
        let fs = FakeFileSystem::with_file(&cfg.recorder.path, "");
        let runner = FakeProcessRunner::default();
        runner.push_exit_code(3);
        let client = RecorderClient::new(&cfg.recorder, &fs, &runner);

        let call = client.mark_step(&started_label("app.exe"));
        assert_eq!(call.outcome, RecorderOutcome::Completed { exit_code: 3 });
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].program, cfg.recorder.path);
        assert_eq!(spawned[0].args, vec!["--test-step=Process Started: app.exe"]);
    }

    #[test]
    fn spawn_failure_is_absorbed() {
        let cfg = MonitorConfig::default();
        let fs = FakeFileSystem::with_file(&cfg.recorder.path, "");
        let runner = FakeProcessRunner::default();
        runner.push_response(Err(MonitorError::Process("permission denied".to_string())));
        let client = RecorderClient::new(&cfg.recorder, &fs, &runner);

        let call = client.stop_session();
        assert!(matches!(
            call.outcome,
            RecorderOutcome::Failed { ref reason } if reason.contains("permission denied")
        ));
    }

    #[test]
    fn availability_is_checked_on_every_call() {
        let cfg = MonitorConfig::default();
        let fs = FakeFileSystem::default();
        let runner = FakeProcessRunner::default();
        let client = RecorderClient::new(&cfg.recorder, &fs, &runner);

        assert_eq!(client.stop_session().outcome, RecorderOutcome::Skipped);
        fs.insert(&cfg.recorder.path, "");
        assert!(client.stop_session().outcome.was_issued());
        fs.remove(&cfg.recorder.path);
        assert_eq!(client.stop_session().outcome, RecorderOutcome::Skipped);
        assert_eq!(runner.spawned().len(), 1);
    }
}
