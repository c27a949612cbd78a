use thiserror::Error;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MISSING_PROCESS_NAME: i32 = 2;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("missing process name: pass the target image name including its extension (e.g. app.exe)")]
    MissingProcessName,
    #[error("illegal transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("gave up waiting for {process} to {condition} after {polls} polls")]
    WaitTimedOut {
        process: String,
        condition: String,
        polls: u64,
    },
}

impl MonitorError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingProcessName => EXIT_MISSING_PROCESS_NAME,
            _ => EXIT_FAILURE,
        }
    }
}
