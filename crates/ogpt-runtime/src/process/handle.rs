//! Handle to one supervised child.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::Stream;
use ogpt_core::{LogLine, LogStream, ProcessState, ProcessStatus, Role};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::warn;

/// Capacity of a child's log channel.
const LOG_CHANNEL_CAPACITY: usize = 1024;

type ExitCallback = Box<dyn FnOnce(Option<i32>, ProcessState) + Send>;

enum ExitNotice {
    Pending(Vec<ExitCallback>),
    Fired {
        exit_code: Option<i32>,
        state: ProcessState,
    },
}

/// State shared between the handle clones and the supervisor's monitor task.
struct Shared {
    status: watch::Sender<ProcessStatus>,
    exit: Mutex<ExitNotice>,
    /// Receiver created before the child was spawned; handed to the first
    /// subscriber so it sees output from the very first line.
    first_logs: Mutex<Option<broadcast::Receiver<LogLine>>>,
    /// Never read. Only used to resubscribe once `first_logs` is taken.
    log_anchor: broadcast::Receiver<LogLine>,
    stop_tx: mpsc::Sender<Duration>,
}

/// Identity and lifecycle of one spawned process.
///
/// Cheap to clone. Status reads always observe a whole snapshot; the
/// supervisor's monitor task is the only writer.
#[derive(Clone)]
pub struct ChildProcessHandle {
    id: u64,
    role: Role,
    command: PathBuf,
    args: Arc<[String]>,
    working_dir: PathBuf,
    shared: Arc<Shared>,
}

/// The supervisor's half of a freshly reserved handle.
pub(crate) struct HandleParts {
    pub handle: ChildProcessHandle,
    pub log_tx: broadcast::Sender<LogLine>,
    pub stop_rx: mpsc::Receiver<Duration>,
}

impl ChildProcessHandle {
    /// Create a handle in `Starting` state.
    pub(crate) fn reserve(
        id: u64,
        role: Role,
        command: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> HandleParts {
        let mut status = ProcessStatus::not_started();
        status.advance(ProcessState::Starting);
        let (status_tx, _) = watch::channel(status);
        let (log_tx, first) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        let log_anchor = log_tx.subscribe();
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let handle = Self {
            id,
            role,
            command: command.to_path_buf(),
            args: args.into(),
            working_dir: working_dir.to_path_buf(),
            shared: Arc::new(Shared {
                status: status_tx,
                exit: Mutex::new(ExitNotice::Pending(Vec::new())),
                first_logs: Mutex::new(Some(first)),
                log_anchor,
                stop_tx,
            }),
        };

        HandleParts {
            handle,
            log_tx,
            stop_rx,
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> ProcessStatus {
        self.shared.status.borrow().clone()
    }

    pub fn state(&self) -> ProcessState {
        self.shared.status.borrow().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.status.borrow().pid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.shared.status.borrow().exit_code
    }

    /// Wait until the process reaches a terminal state.
    pub async fn wait(&self) -> ProcessStatus {
        let mut rx = self.shared.status.subscribe();
        match rx.wait_for(|s| s.state.is_terminal()).await {
            Ok(status) => status.clone(),
            // The sender lives in `Shared`, which we hold.
            Err(_) => self.status(),
        }
    }

    /// Register a callback fired once with `(exit_code, state)` when the
    /// process ends. Fires immediately if it already has.
    pub fn on_exit<F>(&self, callback: F)
    where
        F: FnOnce(Option<i32>, ProcessState) + Send + 'static,
    {
        let mut exit = self
            .shared
            .exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &mut *exit {
            ExitNotice::Pending(callbacks) => callbacks.push(Box::new(callback)),
            ExitNotice::Fired { exit_code, state } => {
                let (code, state) = (*exit_code, *state);
                drop(exit);
                callback(code, state);
            }
        }
    }

    /// Subscribe to this child's filtered output (both streams).
    ///
    /// The first subscriber receives everything since spawn; later ones
    /// start at the current tail. The subscription ends once both output
    /// streams reach EOF.
    pub fn logs(&self) -> LogSubscription {
        let first = self
            .shared
            .first_logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let rx = first.unwrap_or_else(|| self.shared.log_anchor.resubscribe());
        LogSubscription { rx, filter: None }
    }

    /// Subscribe to stdout only.
    pub fn stdout(&self) -> LogSubscription {
        self.logs().only(LogStream::Stdout)
    }

    /// Subscribe to stderr only.
    pub fn stderr(&self) -> LogSubscription {
        self.logs().only(LogStream::Stderr)
    }

    /// Request a graceful stop. Returns `false` when the child is already
    /// gone or a stop is already pending.
    pub(crate) fn request_stop(&self, grace: Duration) -> bool {
        self.shared.stop_tx.try_send(grace).is_ok()
    }

    // ---- monitor-side mutations ----

    pub(crate) fn mark_running(&self, pid: Option<u32>) -> bool {
        self.shared.status.send_if_modified(|s| {
            if s.advance(ProcessState::Running) {
                s.pid = pid;
                true
            } else {
                false
            }
        })
    }

    /// Move to a terminal state and fire the exit callbacks.
    pub(crate) fn finish(&self, state: ProcessState, exit_code: Option<i32>) {
        let applied = self.shared.status.send_if_modified(|s| {
            if s.advance(state) {
                s.exit_code = exit_code;
                true
            } else {
                false
            }
        });
        if !applied {
            warn!(role = %self.role, ?state, "Ignoring illegal state transition");
            return;
        }

        let callbacks = {
            let mut exit = self
                .shared
                .exit
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *exit, ExitNotice::Fired { exit_code, state }) {
                ExitNotice::Pending(callbacks) => callbacks,
                ExitNotice::Fired { .. } => Vec::new(),
            }
        };
        for callback in callbacks {
            callback(exit_code, state);
        }
    }
}

impl std::fmt::Debug for ChildProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcessHandle")
            .field("role", &self.role)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("working_dir", &self.working_dir)
            .field("status", &self.status())
            .finish()
    }
}

/// Lazy sequence of a child's log lines.
///
/// No replay: lines dropped because the subscriber fell behind are skipped.
pub struct LogSubscription {
    rx: broadcast::Receiver<LogLine>,
    filter: Option<LogStream>,
}

impl LogSubscription {
    #[must_use]
    pub const fn only(mut self, stream: LogStream) -> Self {
        self.filter = Some(stream);
        self
    }

    /// Next line, or `None` once the child's output is exhausted.
    pub async fn next_line(&mut self) -> Option<LogLine> {
        loop {
            match self.rx.recv().await {
                Ok(line) if self.filter.is_none_or(|f| f == line.stream) => return Some(line),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Log subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Collect every remaining line.
    pub async fn collect(mut self) -> Vec<LogLine> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await {
            lines.push(line);
        }
        lines
    }

    pub fn into_stream(self) -> impl Stream<Item = LogLine> + Send {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.next_line().await.map(|line| (line, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogpt_core::LogSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reserve() -> HandleParts {
        ChildProcessHandle::reserve(1, Role::ListModels, Path::new("ollama"), &["list".into()], Path::new("."))
    }

    #[test]
    fn reserved_handle_is_starting() {
        let parts = reserve();
        assert_eq!(parts.handle.state(), ProcessState::Starting);
        assert_eq!(parts.handle.args(), ["list".to_string()]);
    }

    #[test]
    fn exit_callbacks_fire_exactly_once() {
        let parts = reserve();
        let handle = parts.handle;
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        handle.on_exit(move |code, state| {
            assert_eq!(code, Some(0));
            assert_eq!(state, ProcessState::ExitedOk);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.mark_running(Some(42)));
        handle.finish(ProcessState::ExitedOk, Some(0));
        handle.finish(ProcessState::ExitedError, Some(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(handle.exit_code(), Some(0));

        // Late registration fires immediately.
        let counter = fired.clone();
        handle.on_exit(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_subscriber_sees_early_lines() {
        let parts = reserve();
        let source = LogSource::Process(Role::ListModels);
        parts
            .log_tx
            .send(LogLine::new(source, LogStream::Stdout, "NAME SIZE"))
            .unwrap();
        parts
            .log_tx
            .send(LogLine::new(source, LogStream::Stderr, "warn"))
            .unwrap();
        drop(parts.log_tx);

        let lines = parts.handle.stdout().collect().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "NAME SIZE");
    }

    #[tokio::test]
    async fn wait_returns_terminal_status() {
        let parts = reserve();
        let handle = parts.handle.clone();
        tokio::spawn(async move {
            handle.mark_running(None);
            handle.finish(ProcessState::ExitedError, Some(3));
        });
        let status = parts.handle.wait().await;
        assert_eq!(status.state, ProcessState::ExitedError);
        assert_eq!(status.exit_code, Some(3));
    }
}
