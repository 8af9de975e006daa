//! Command abstraction and instrumentation.
//!
//! A [`VcsCommand`] is one unit of work against a backend. Roots run their
//! commands through a [`CommandRunner`], which notifies registered
//! [`CommandListener`]s and remembers in-flight processes for cancellation.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use crate::error::VcsError;
use crate::process::ProcessHandle;

/// Anything that can say exactly what it is going to run.
pub trait Described {
    fn describe(&self) -> String;
}

/// One invocation against a backend, producing a typed result.
pub trait VcsCommand: Described {
    type Output;

    /// Run the command. Each call starts a new process.
    fn execute(&self) -> Result<Self::Output, VcsError>;

    /// Handle of the process backing this command
    fn process(&self) -> &ProcessHandle;

    /// Best-effort request to stop the running process.
    ///
    /// Returns whether termination was requested, not whether the process
    /// has stopped yet.
    fn cancel(&self) -> bool {
        self.process().terminate()
    }
}

/// Hook notified around every command execution.
pub trait CommandListener: Send + Sync {
    fn before_command(&self, command: &dyn Described);

    fn after_command(&self, command: &dyn Described);
}

/// Shared list of listeners; clones see the same list.
#[derive(Clone, Default)]
pub struct CommandObserver {
    listeners: Arc<RwLock<Vec<Arc<dyn CommandListener>>>>,
}

impl CommandObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn CommandListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn CommandListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn CommandListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify_before(&self, command: &dyn Described) {
        for listener in self.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.before_command(command))) {
                tracing::warn!(
                    "Command listener panicked before `{}`: {}",
                    command.describe(),
                    VcsError::from_panic(payload)
                );
            }
        }
    }

    fn notify_after(&self, command: &dyn Described) {
        for listener in self.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.after_command(command))) {
                tracing::warn!(
                    "Command listener panicked after `{}`: {}",
                    command.describe(),
                    VcsError::from_panic(payload)
                );
            }
        }
    }
}

impl std::fmt::Debug for CommandObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandObserver")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Runs commands on behalf of one root.
#[derive(Debug, Default)]
pub struct CommandRunner {
    observer: CommandObserver,
    in_flight: Mutex<Vec<ProcessHandle>>,
}

impl CommandRunner {
    pub fn new(observer: CommandObserver) -> Self {
        Self {
            observer,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn observer(&self) -> &CommandObserver {
        &self.observer
    }

    pub fn set_observer(&mut self, observer: CommandObserver) {
        self.observer = observer;
    }

    fn in_flight(&self) -> MutexGuard<'_, Vec<ProcessHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute `command`, notifying listeners before and after.
    pub fn run<C: VcsCommand>(&self, command: &C) -> Result<C::Output, VcsError> {
        let handle = command.process().clone();
        self.in_flight().push(handle.clone());

        self.observer.notify_before(command);
        let result = command.execute();
        self.observer.notify_after(command);

        self.in_flight().retain(|h| !h.same_as(&handle));
        result
    }

    /// Terminate every command currently running through this runner.
    pub fn cancel(&self) -> bool {
        let handles = self.in_flight().clone();
        handles
            .iter()
            .fold(false, |cancelled, handle| handle.terminate() || cancelled)
    }
}
