use crate::config::MonitorConfig;
use crate::errors::MonitorError;
use crate::logging::EventLog;
use crate::params::{resolve_parameters, RawInputs};
use crate::recorder::{started_label, stopped_label, RecorderClient};
use crate::runtime::{EnvMap, MonitorRuntime};
use crate::types::{MonitorState, RecorderCall, RecorderOutcome, SessionParameters};
use crate::watcher::{PollOutcome, ProcessWatcher};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Start,
    Stop,
}

impl WaitCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEnd {
    ProcessStopped,
    WaitTimedOut { condition: WaitCondition, polls: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub params: SessionParameters,
    pub states: Vec<MonitorState>,
    pub recorder_calls: Vec<RecorderCall>,
    pub end: LifecycleEnd,
}

impl LifecycleReport {
    pub fn into_result(self) -> Result<Self, MonitorError> {
        match self.end {
            LifecycleEnd::ProcessStopped => Ok(self),
            LifecycleEnd::WaitTimedOut { condition, polls } => Err(MonitorError::WaitTimedOut {
                process: self.params.process_name,
                condition: condition.as_str().to_string(),
                polls,
            }),
        }
    }
}

pub fn validate_transition(from: MonitorState, to: MonitorState) -> Result<(), MonitorError> {
    use MonitorState as S;

    let allowed = match from {
        S::Idle => to == S::AwaitingProcessStart,
        S::AwaitingProcessStart => matches!(to, S::Active | S::Terminated),
        S::Active => to == S::Terminated,
        S::Terminated => false,
    };

    if !allowed {
        return Err(MonitorError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// Drives one monitoring lifecycle. Owns the only copy of the monitor state.
pub struct SessionOrchestrator<'a> {
    config: &'a MonitorConfig,
    runtime: &'a MonitorRuntime,
    events: EventLog,
    state: MonitorState,
    states: Vec<MonitorState>,
    recorder_calls: Vec<RecorderCall>,
}

impl<'a> SessionOrchestrator<'a> {
    pub fn new(config: &'a MonitorConfig, runtime: &'a MonitorRuntime, events: EventLog) -> Self {
        Self {
            config,
            runtime,
            events,
            state: MonitorState::Idle,
            states: vec![MonitorState::Idle],
            recorder_calls: Vec::new(),
        }
    }

    /// Resolves inputs, then runs Idle through Terminated. Only a missing
    /// process name (or an illegal transition) is returned as an error;
    /// recorder trouble is recorded in the report and otherwise ignored.
    pub fn run(mut self, inputs: &RawInputs, env: &EnvMap) -> Result<LifecycleReport, MonitorError> {
        let config = self.config;
        let runtime = self.runtime;
        let params = resolve_parameters(inputs, &config.defaults, env)?;
        let name = params.process_name.as_str();

        let recorder = RecorderClient::new(
            &config.recorder,
            runtime.file_system.as_ref(),
            runtime.process_runner.as_ref(),
        );
        let watcher = ProcessWatcher::new(runtime.process_table.as_ref(), runtime.clock.as_ref())
            .with_max_wait(config.polling.max_wait());

        self.record(recorder.enable_logging());
        self.record(recorder.start_session(&params));
        self.transition(MonitorState::AwaitingProcessStart, name)?;

        info!(process = name, "waiting for process to start");
        let started = watcher.wait_for_start(name, config.polling.start_interval())?;
        if let PollOutcome::TimedOut { polls } = started {
            warn!(process = name, polls, "process never started; closing session");
            self.transition(MonitorState::Terminated, name)?;
            self.record(recorder.stop_session());
            return Ok(self.finish(
                params,
                LifecycleEnd::WaitTimedOut {
                    condition: WaitCondition::Start,
                    polls,
                },
            ));
        }

        self.transition(MonitorState::Active, name)?;
        self.record(recorder.mark_step(&started_label(name)));

        info!(process = name, "watching process until it exits");
        let stopped = watcher.wait_for_stop(name, config.polling.stop_interval())?;
        let end = match stopped {
            PollOutcome::Satisfied { .. } => LifecycleEnd::ProcessStopped,
            PollOutcome::TimedOut { polls } => {
                warn!(process = name, polls, "process still running at wait limit; closing session");
                LifecycleEnd::WaitTimedOut {
                    condition: WaitCondition::Stop,
                    polls,
                }
            }
        };

        self.transition(MonitorState::Terminated, name)?;
        self.record(recorder.mark_step(&stopped_label(name)));
        self.record(recorder.stop_session());
        Ok(self.finish(params, end))
    }

    fn transition(&mut self, next: MonitorState, process: &str) -> Result<(), MonitorError> {
        validate_transition(self.state, next)?;
        info!(process, from = %self.state, to = %next, "state transition");
        self.events.record(
            "info",
            "state_transition",
            json!({ "process": process, "from": self.state, "to": next }),
        );
        self.state = next;
        self.states.push(next);
        Ok(())
    }

    fn record(&mut self, call: RecorderCall) {
        let level = match call.outcome {
            RecorderOutcome::Completed { exit_code: 0 } => "info",
            _ => "warn",
        };
        self.events.record(
            level,
            "recorder_call",
            json!({
                "subcommand": call.invocation.subcommand(),
                "args": call.invocation.arguments(),
                "outcome": call.outcome,
            }),
        );
        self.recorder_calls.push(call);
    }

    fn finish(self, params: SessionParameters, end: LifecycleEnd) -> LifecycleReport {
        LifecycleReport {
            params,
            states: self.states,
            recorder_calls: self.recorder_calls,
            end,
        }
    }
}
