//! Running a single external tool invocation.
//!
//! [`CommandLine`] spawns the process, drains stdout/stderr on helper threads
//! and polls for exit so that [`ProcessHandle::terminate`] can kill it from
//! another thread while `execute` is in flight.

use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use utils::{shell::resolve_executable_path_blocking, text::TextEncoding};

use crate::error::VcsError;

/// Exit code reported when the process was killed by a signal
pub const EXIT_CODE_KILLED: i32 = -1;

/// Exit code reported when the tool could not be started at all
pub const EXIT_CODE_NOT_STARTED: i32 = -2;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Stopped through [`ProcessHandle::terminate`]; output is partial
    pub killed: bool,
}

impl ProcessOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.killed
    }
}

/// Shared slot holding the currently running child, if any.
#[derive(Debug, Clone, Default)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
    terminated: Arc<AtomicBool>,
}

impl ProcessHandle {
    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the running process to stop.
    ///
    /// Returns whether a kill was sent. Returns `false` when nothing was
    /// running, including after the process has already exited.
    pub fn terminate(&self) -> bool {
        let mut slot = self.lock();
        let Some(child) = slot.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => match child.kill() {
                Ok(()) => {
                    self.terminated.store(true, Ordering::SeqCst);
                    tracing::debug!(pid = child.id(), "Terminated running command");
                    true
                }
                Err(e) => {
                    tracing::warn!(pid = child.id(), "Failed to terminate command: {}", e);
                    false
                }
            },
            Err(_) => false,
        }
    }

    pub fn is_running(&self) -> bool {
        let mut slot = self.lock();
        matches!(slot.as_mut().map(|child| child.try_wait()), Some(Ok(None)))
    }

    /// Whether the last run was stopped by [`terminate`](Self::terminate)
    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn start(&self, child: Child) {
        let mut slot = self.lock();
        self.terminated.store(false, Ordering::SeqCst);
        *slot = Some(child);
    }

    pub(crate) fn same_as(&self, other: &ProcessHandle) -> bool {
        Arc::ptr_eq(&self.child, &other.child)
    }
}

/// One external tool invocation: program, arguments, working directory and
/// output encoding.
///
/// Equality only looks at what would be run, never at runtime state.
#[derive(Debug)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    encoding: TextEncoding,
    process: ProcessHandle,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            encoding: TextEncoding::default(),
            process: ProcessHandle::default(),
        }
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    /// Render the invocation for logs, e.g. `hg pull (running in /tmp/repo)`
    pub fn describe(&self) -> String {
        let mut description = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(dir) = &self.working_dir {
            description.push_str(&format!(" (running in {})", dir.display()));
        }
        description
    }

    /// Run the process to completion and capture its output.
    ///
    /// Each call starts a fresh process. A non-zero exit code is not an error
    /// here; only failing to start the process is. A terminated run returns
    /// whatever it printed so far with `killed` set.
    pub fn execute(&self) -> Result<ProcessOutput, VcsError> {
        let executable = resolve_executable_path_blocking(&self.program)
            .ok_or_else(|| VcsError::NotAvailable(self.program.clone()))?;

        let mut cmd = Command::new(&executable);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::trace!(dir = ?self.working_dir, "Running command: {}", self.describe());

        let mut child = cmd.spawn().map_err(|e| VcsError::Spawn {
            command: self.describe(),
            message: e.to_string(),
        })?;

        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);
        self.process.start(child);

        let exit_code = match self.wait_for_exit() {
            Ok(code) => code,
            Err(e) => {
                if let Some(mut child) = self.process.lock().take() {
                    let _ = child.kill();
                }
                return Err(e);
            }
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);

        Ok(ProcessOutput {
            stdout: self.encoding.decode(&stdout),
            stderr: self.encoding.decode(&stderr),
            exit_code,
            killed: self.process.was_terminated(),
        })
    }

    /// [`execute`](Self::execute), treating a terminated run as
    /// [`VcsError::Cancelled`].
    pub fn execute_to_completion(&self) -> Result<ProcessOutput, VcsError> {
        let output = self.execute()?;
        if output.killed {
            tracing::debug!(
                partial_bytes = output.stdout.len(),
                "Command was cancelled: {}",
                self.describe()
            );
            return Err(VcsError::Cancelled {
                command: self.describe(),
                partial_stdout: output.stdout,
            });
        }
        Ok(output)
    }

    fn wait_for_exit(&self) -> Result<i32, VcsError> {
        loop {
            {
                let mut slot = self.process.lock();
                let Some(child) = slot.as_mut() else {
                    return Ok(EXIT_CODE_KILLED);
                };
                if let Some(status) = child.try_wait()? {
                    slot.take();
                    return Ok(status.code().unwrap_or(EXIT_CODE_KILLED));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PartialEq for CommandLine {
    fn eq(&self, other: &Self) -> bool {
        self.program == other.program
            && self.args == other.args
            && self.working_dir == other.working_dir
            && self.encoding == other.encoding
    }
}

impl Eq for CommandLine {}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = source.read_to_end(&mut buffer) {
            tracing::debug!("Stopped reading process output: {}", e);
        }
        buffer
    })
}

fn join_reader(reader: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
