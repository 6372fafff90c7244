//! Role-keyed supervision of child processes.
//!
//! The supervisor owns at most one live child per [`Role`]. Each child gets
//! one reader task per output stream and one monitor task that waits for
//! exit (or a stop request), publishes the terminal state and releases the
//! role slot.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use ogpt_core::{
    ConsoleEventEmitter, ListError, ListingParser, LogLine, LogSource, LogStream, ProcessEvent,
    ProcessState, ProcessStatus, Role, SpawnError,
};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::command::{display_command, resolve_executable};
use super::handle::{ChildProcessHandle, HandleParts};
use super::shutdown::shutdown_child;
use super::stream::spawn_log_reader;

/// Bound on waiting for output readers after the child exited. A grandchild
/// that inherited the pipes can keep them open indefinitely.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Extra time `stop` waits beyond the grace period for the forced kill.
const KILL_SETTLE: Duration = Duration::from_secs(2);

/// Supervises compile, serve, list and one-shot children.
///
/// Control calls may come from any task; the slot table is only locked for
/// short, non-async sections.
pub struct ProcessSupervisor {
    slots: Arc<Mutex<HashMap<Role, ChildProcessHandle>>>,
    emitter: Arc<dyn ConsoleEventEmitter>,
    start_timeout: Duration,
    next_id: AtomicU64,
}

impl ProcessSupervisor {
    pub fn new(emitter: Arc<dyn ConsoleEventEmitter>, start_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            emitter,
            start_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Start `command` for `role`.
    ///
    /// Fails with `AlreadyRunning` if a child for `role` is still live,
    /// `NotFound`/`ExecFailed` if the command cannot be launched and
    /// `StartTimeout` if the OS does not confirm the launch in time. In every
    /// failure case the handle ends in `FailedToStart`.
    pub async fn start(
        &self,
        role: Role,
        command: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<ChildProcessHandle, SpawnError> {
        let HandleParts {
            handle,
            log_tx,
            stop_rx,
        } = self.reserve(role, command, args, working_dir)?;

        let child = match self.launch(&handle).await {
            Ok(child) => child,
            Err(err) => {
                warn!(%role, error = %err, "Failed to start process");
                handle.finish(ProcessState::FailedToStart, None);
                self.release(&handle);
                self.emitter.emit(
                    ProcessEvent::FailedToStart {
                        role,
                        error: err.to_string(),
                    }
                    .into(),
                );
                return Err(err);
            }
        };

        let pid = child.id();
        handle.mark_running(pid);
        info!(%role, pid = ?pid, command = %command.display(), "Process started");
        self.emitter.emit(
            ProcessEvent::Started {
                role,
                pid,
                command: display_command(command, args),
            }
            .into(),
        );

        self.spawn_monitor(child, handle.clone(), log_tx, stop_rx);
        Ok(handle)
    }

    fn reserve(
        &self,
        role: Role,
        command: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<HandleParts, SpawnError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&role).is_some_and(|h| !h.state().is_terminal()) {
            return Err(SpawnError::AlreadyRunning { role });
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let parts = ChildProcessHandle::reserve(id, role, command, args, working_dir);
        slots.insert(role, parts.handle.clone());
        Ok(parts)
    }

    /// Drop the slot entry if it still belongs to `handle`.
    fn release(&self, handle: &ChildProcessHandle) {
        release_slot(&self.slots, handle);
    }

    async fn launch(&self, handle: &ChildProcessHandle) -> Result<Child, SpawnError> {
        let program = resolve_executable(handle.command())?;
        let mut cmd = Command::new(&program);
        cmd.args(handle.args())
            .current_dir(handle.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let path = handle.command().to_path_buf();
        let mut spawn = tokio::task::spawn_blocking(move || cmd.spawn());

        match timeout(self.start_timeout, &mut spawn).await {
            Ok(Ok(Ok(child))) => Ok(child),
            Ok(Ok(Err(e))) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpawnError::NotFound { path })
            }
            Ok(Ok(Err(e))) => Err(SpawnError::ExecFailed {
                path,
                reason: e.to_string(),
            }),
            Ok(Err(join_err)) => Err(SpawnError::ExecFailed {
                path,
                reason: join_err.to_string(),
            }),
            Err(_) => {
                // The spawn may still succeed later; reap whatever it yields.
                let role = handle.role();
                tokio::spawn(async move {
                    if let Ok(Ok(mut child)) = spawn.await {
                        warn!(%role, pid = ?child.id(), "Killing process that started after timeout");
                        let _ = child.kill().await;
                    }
                });
                Err(SpawnError::StartTimeout {
                    path,
                    timeout: self.start_timeout,
                })
            }
        }
    }

    fn spawn_monitor(
        &self,
        mut child: Child,
        handle: ChildProcessHandle,
        log_tx: broadcast::Sender<LogLine>,
        mut stop_rx: mpsc::Receiver<Duration>,
    ) {
        let role = handle.role();
        let source = LogSource::Process(role);
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_log_reader(
                stdout,
                source,
                LogStream::Stdout,
                log_tx.clone(),
                self.emitter.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_log_reader(
                stderr,
                source,
                LogStream::Stderr,
                log_tx,
                self.emitter.clone(),
            ));
        }

        let emitter = self.emitter.clone();
        let slots = self.slots.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Some(grace) = stop_rx.recv() => {
                    info!(%role, grace_ms = grace.as_millis(), "Stopping process");
                    emitter.emit(ProcessEvent::Stopping {
                        role,
                        grace_ms: u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    }.into());
                    shutdown_child(&mut child, grace).await
                }
            };

            if timeout(READER_DRAIN_TIMEOUT, join_all(readers)).await.is_err() {
                debug!(%role, "Output readers still open after exit");
            }

            let exit_code = match &status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(%role, error = %e, "Failed to wait for process");
                    None
                }
            };
            let state = ProcessState::from_exit_code(exit_code);
            info!(%role, exit_code = ?exit_code, ?state, "Process exited");

            handle.finish(state, exit_code);
            release_slot(&slots, &handle);
            emitter.emit(
                ProcessEvent::Exited {
                    role,
                    exit_code,
                    state,
                }
                .into(),
            );
        });
    }

    /// Handle of the live child for `role`, if any.
    pub fn get(&self, role: Role) -> Option<ChildProcessHandle> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&role)
            .cloned()
    }

    /// Whether a child for `role` is starting or running.
    pub fn is_running(&self, role: Role) -> bool {
        self.get(role).is_some_and(|h| h.state().is_live())
    }

    /// Stop a child: SIGTERM, wait up to `grace`, then kill.
    ///
    /// Idempotent; stopping an exited handle just returns its final status.
    /// Never waits longer than `grace` plus a short kill allowance.
    pub async fn stop(&self, handle: &ChildProcessHandle, grace: Duration) -> ProcessStatus {
        if handle.state().is_terminal() {
            return handle.status();
        }
        if !handle.request_stop(grace) {
            debug!(role = %handle.role(), "Stop already requested");
        }
        match timeout(grace + KILL_SETTLE, handle.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(role = %handle.role(), "Process did not exit after stop");
                handle.status()
            }
        }
    }

    /// Stop the live child for `role`, if any.
    pub async fn stop_role(&self, role: Role, grace: Duration) -> Option<ProcessStatus> {
        let handle = self.get(role)?;
        Some(self.stop(&handle, grace).await)
    }

    /// Stop every live child concurrently.
    pub async fn stop_all(&self, grace: Duration) {
        let handles: Vec<ChildProcessHandle> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "Stopping all processes");
        join_all(handles.iter().map(|h| self.stop(h, grace))).await;
    }

    /// Run `<binary> list` and parse its table into model names.
    pub async fn list_models(
        &self,
        binary: &Path,
        working_dir: &Path,
        parser: &ListingParser,
    ) -> Result<Vec<String>, ListError> {
        let handle = self
            .start(Role::ListModels, binary, &["list".to_string()], working_dir)
            .await?;
        let lines = handle.stdout().collect().await;
        let status = handle.wait().await;

        if status.state != ProcessState::ExitedOk {
            return Err(ListError::Exited {
                code: status.exit_code,
            });
        }

        let names = parser.parse(lines.iter().map(|l| l.text.as_str()));
        debug!(count = names.len(), "Parsed model list");
        Ok(names)
    }

    /// Start the server, give it `settle` to come up, then list its models.
    ///
    /// A server that is already running is reused. A server that dies during
    /// the settle delay does not abort the listing; the list command then
    /// fails on its own.
    pub async fn start_server_then_list(
        &self,
        binary: &Path,
        working_dir: &Path,
        settle: Duration,
        parser: &ListingParser,
    ) -> Result<Vec<String>, ListError> {
        let server = match self
            .start(Role::Serve, binary, &["serve".to_string()], working_dir)
            .await
        {
            Ok(handle) => Some(handle),
            Err(SpawnError::AlreadyRunning { .. }) => {
                debug!("Server already running, listing directly");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(server) = server {
            tokio::select! {
                () = sleep(settle) => {}
                status = server.wait() => {
                    warn!(state = ?status.state, exit_code = ?status.exit_code, "Server exited during settle delay");
                }
            }
        }

        self.list_models(binary, working_dir, parser).await
    }
}

fn release_slot(slots: &Mutex<HashMap<Role, ChildProcessHandle>>, handle: &ChildProcessHandle) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    if slots
        .get(&handle.role())
        .is_some_and(|current| current.id() == handle.id())
    {
        slots.remove(&handle.role());
    }
}
