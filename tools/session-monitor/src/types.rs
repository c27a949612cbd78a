use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    AwaitingProcessStart,
    Active,
    Terminated,
}

impl MonitorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingProcessStart => "awaiting_process_start",
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free list of recorder log collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCollectors(Vec<String>);

impl LogCollectors {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || out.iter().any(|existing| existing == name) {
                continue;
            }
            out.push(name.to_string());
        }
        Self(out)
    }

    pub fn parse_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn render(&self) -> String {
        self.0.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParameters {
    pub process_name: String,
    pub testcase_id: String,
    pub user_name: String,
    pub log_collectors: LogCollectors,
    pub test_domain: Option<String>,
    pub test_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderSubcommand {
    EnableLogging,
    Start,
    MarkStep,
    Stop,
}

impl RecorderSubcommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnableLogging => "enable_logging",
            Self::Start => "start",
            Self::MarkStep => "mark_step",
            Self::Stop => "stop",
        }
    }

    /// Leading flag on the recorder command line. `MarkStep` has none: its
    /// single `--test-step=` argument is the whole subcommand.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::EnableLogging => Some("--log-collection"),
            Self::Start => Some("--start"),
            Self::MarkStep => None,
            Self::Stop => Some("--stop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderInvocation {
    subcommand: RecorderSubcommand,
    arguments: Vec<String>,
}

impl RecorderInvocation {
    pub fn new(subcommand: RecorderSubcommand, arguments: Vec<(&str, String)>) -> Self {
        Self {
            subcommand,
            arguments: arguments
                .into_iter()
                .map(|(key, value)| format!("--{key}={value}"))
                .collect(),
        }
    }

    pub fn subcommand(&self) -> RecorderSubcommand {
        self.subcommand
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn argv(&self) -> Vec<String> {
        self.subcommand
            .flag()
            .map(str::to_string)
            .into_iter()
            .chain(self.arguments.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RecorderOutcome {
    Skipped,
    Completed { exit_code: i32 },
    Failed { reason: String },
}

impl RecorderOutcome {
    pub fn was_issued(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderCall {
    pub invocation: RecorderInvocation,
    pub outcome: RecorderOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collectors_keep_first_occurrence_order() {
        let collectors = LogCollectors::parse_csv(" WLAN, PnP,,ETL ,WLAN");
        assert_eq!(collectors.render(), "WLAN,PnP,ETL");
        assert!(LogCollectors::parse_csv(" , ").is_empty());
    }

    #[test]
    fn mark_step_argv_has_no_leading_flag() {
        let step = RecorderInvocation::new(
            RecorderSubcommand::MarkStep,
            vec![("test-step", "Process Started: app.exe".to_string())],
        );
        assert_eq!(step.argv(), vec!["--test-step=Process Started: app.exe"]);

        let stop = RecorderInvocation::new(RecorderSubcommand::Stop, Vec::new());
        assert_eq!(stop.argv(), vec!["--stop"]);
    }
}
