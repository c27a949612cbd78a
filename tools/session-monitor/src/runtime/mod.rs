use crate::errors::MonitorError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};

pub type EnvMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stderr: String,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep_until(&self, deadline: SystemTime) -> Result<(), MonitorError>;
}

/// Runs a program to completion with stdin closed.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, MonitorError>;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, MonitorError>;
    fn exists(&self, path: &Path) -> bool;
}

/// Answers whether a process with the given image name is in the OS
/// process table right now.
pub trait ProcessTable: Send + Sync {
    fn is_running(&self, image_name: &str) -> Result<bool, MonitorError>;
}

/// Exact, ASCII case-insensitive match against either the reported process
/// name or the file name of its executable. Linux truncates `comm` to 15
/// bytes, so the executable path is the reliable source there.
pub fn image_name_matches(target: &str, name: &str, exe: Option<&Path>) -> bool {
    if name.eq_ignore_ascii_case(target) {
        return true;
    }
    exe.and_then(Path::file_name)
        .and_then(|file_name| file_name.to_str())
        .is_some_and(|file_name| file_name.eq_ignore_ascii_case(target))
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), MonitorError> {
        let now = SystemTime::now();
        if let Ok(duration) = deadline.duration_since(now) {
            std::thread::sleep(duration);
        }
        Ok(())
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, MonitorError> {
        std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

pub struct ProductionProcessRunner;

impl ProcessRunner for ProductionProcessRunner {
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, MonitorError> {
        let output = std::process::Command::new(&request.program)
            .args(&request.args)
            .stdin(std::process::Stdio::null())
            .output()
            .map_err(|e| MonitorError::Process(e.to_string()))?;
        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

pub struct SysinfoProcessTable {
    system: Mutex<System>,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn is_running(&self, image_name: &str) -> Result<bool, MonitorError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| MonitorError::Process("process table lock poisoned".to_string()))?;
        system.refresh_processes_specifics(
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        );
        Ok(system
            .processes()
            .values()
            .any(|process| image_name_matches(image_name, process.name(), process.exe())))
    }
}

pub struct MonitorRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub process_table: Arc<dyn ProcessTable>,
}

impl MonitorRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(ProductionProcessRunner),
            process_table: Arc::new(SysinfoProcessTable::new()),
        }
    }
}

impl Default for MonitorRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<SystemTime>>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<SystemTime> {
        self.sleeps.lock().expect("sleep lock").clone()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), MonitorError> {
        self.sleeps.lock().expect("sleep lock").push(deadline);
        *self.now.lock().expect("clock lock") = deadline;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.insert(path, contents);
        fs
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .expect("files lock")
            .insert(path.into(), contents.into());
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().expect("files lock").remove(path);
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, MonitorError> {
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| MonitorError::Io(format!("missing file {}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeProcessRunner {
    responses: Arc<Mutex<Vec<Result<ProcessOutput, MonitorError>>>>,
    spawned: Arc<Mutex<Vec<ProcessRequest>>>,
}

impl FakeProcessRunner {
    pub fn push_response(&self, output: Result<ProcessOutput, MonitorError>) {
        self.responses.lock().expect("responses lock").push(output);
    }

    pub fn push_exit_code(&self, exit_code: i32) {
        self.push_response(Ok(ProcessOutput {
            exit_code,
            stderr: String::new(),
        }));
    }

    pub fn spawned(&self) -> Vec<ProcessRequest> {
        self.spawned.lock().expect("spawned lock").clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    /// Unscripted runs succeed with exit code 0.
    fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, MonitorError> {
        self.spawned.lock().expect("spawned lock").push(request);
        let mut responses = self.responses.lock().expect("responses lock");
        if responses.is_empty() {
            return Ok(ProcessOutput {
                exit_code: 0,
                stderr: String::new(),
            });
        }
        responses.remove(0)
    }
}

/// Replays a scripted sequence of "is running" observations. Once the
/// script runs out the last observation repeats; an empty script reports
/// the process as absent.
#[derive(Default, Clone)]
pub struct FakeProcessTable {
    script: Arc<Mutex<Vec<bool>>>,
    last: Arc<Mutex<bool>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeProcessTable {
    pub fn scripted(observations: impl IntoIterator<Item = bool>) -> Self {
        let table = Self::default();
        table
            .script
            .lock()
            .expect("script lock")
            .extend(observations);
        table
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

impl ProcessTable for FakeProcessTable {
    fn is_running(&self, image_name: &str) -> Result<bool, MonitorError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(image_name.to_string());
        let mut script = self.script.lock().expect("script lock");
        let mut last = self.last.lock().expect("last lock");
        if !script.is_empty() {
            *last = script.remove(0);
        }
        Ok(*last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_name_match_is_exact_and_case_insensitive() {
        assert!(image_name_matches("App.EXE", "app.exe", None));
        assert!(!image_name_matches("app.exe", "app.exe.bak", None));
        assert!(!image_name_matches("app", "app.exe", None));
    }

    #[test]
    fn image_name_falls_back_to_executable_file_name() {
        let exe = Path::new("/opt/tools/very-long-helper-binary");
        assert!(image_name_matches(
            "very-long-helper-binary",
            "very-long-helpe",
            Some(exe)
        ));
        assert!(!image_name_matches("helper", "very-long-helpe", Some(exe)));
    }

    #[test]
    fn fake_process_table_repeats_last_observation() {
        let table = FakeProcessTable::scripted([false, true]);
        assert!(!table.is_running("app.exe").expect("query"));
        assert!(table.is_running("app.exe").expect("query"));
        assert!(table.is_running("app.exe").expect("query"));
        assert_eq!(table.queries().len(), 3);
    }

    #[test]
    fn fake_clock_advances_to_each_deadline() {
        let clock = FakeClock::default();
        let deadline = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(2);
        clock.sleep_until(deadline).expect("sleep");
        assert_eq!(clock.now(), deadline);
        assert_eq!(clock.sleeps(), vec![deadline]);
    }

    #[cfg(unix)]
    fn spawn_copied_sleep(dir: &Path, name: &str) -> std::process::Child {
        let source = [Path::new("/bin/sleep"), Path::new("/usr/bin/sleep")]
            .into_iter()
            .find(|path| path.is_file())
            .expect("sleep binary");
        let program = dir.join(name);
        std::fs::copy(source, &program).expect("copy sleep");

        // Another test thread forking while the copy was open leaves the
        // file briefly busy for exec.
        let mut attempts = 0;
        loop {
            match std::process::Command::new(&program).arg("30").spawn() {
                Ok(child) => return child,
                Err(error) if error.raw_os_error() == Some(26) && attempts < 20 => {
                    attempts += 1;
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                Err(error) => panic!("spawn {}: {error}", program.display()),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn sysinfo_table_sees_a_live_child_and_forgets_it_once_reaped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let name = format!("smon-{}", std::process::id() % 100_000);
        let mut child = spawn_copied_sleep(dir.path(), &name);

        let table = SysinfoProcessTable::new();
        let seen = table.is_running(&name);
        let upper = table.is_running(&name.to_uppercase());
        child.kill().expect("kill");
        child.wait().expect("reap");

        assert!(seen.expect("query"));
        assert!(upper.expect("query"));
        assert!(!table.is_running(&name).expect("query"));
        assert!(!table.is_running("smon").expect("query"));
    }
}
