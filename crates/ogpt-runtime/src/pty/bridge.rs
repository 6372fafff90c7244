//! Single interactive session bridged to a byte duplex.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use futures_util::Stream;
use ogpt_core::{
    ChildExit, ConsoleEventEmitter, InteractivePtyPort, LogStream, ProcessState, PtyChild,
    PtyError, PtyEvent, strip_output,
};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::process::send_terminate;

/// Bytes per read; one read is one emitted chunk.
const READ_CHUNK: usize = 1024;

/// Pause after an empty read while the child is still alive.
const IDLE_BACKOFF: Duration = Duration::from_millis(25);

/// Exit polling interval during `close`.
const EXIT_POLL: Duration = Duration::from_millis(50);

/// How long `close` waits for the child to be reaped after a forced kill.
const KILL_SETTLE: Duration = Duration::from_secs(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-session state shared with the reader threads.
struct SessionShared {
    child: Mutex<Box<dyn PtyChild>>,
    exit: Mutex<Option<ChildExit>>,
    closing: AtomicBool,
    closed_reported: AtomicBool,
    /// Reader threads still running. The last one out reports `Closed`.
    live_readers: AtomicUsize,
    emitter: Arc<dyn ConsoleEventEmitter>,
}

impl SessionShared {
    /// Exit status if the child has exited. Cached once observed.
    fn exit_status(&self) -> Option<ChildExit> {
        let mut exit = lock(&self.exit);
        if exit.is_none() {
            match lock(&self.child).try_wait() {
                Ok(status) => *exit = status,
                Err(e) => {
                    debug!(error = %e, "try_wait failed, treating child as gone");
                    *exit = Some(ChildExit { code: None });
                }
            }
        }
        *exit
    }

    /// Emit `Closed` the first time it is called.
    fn report_closed(&self, exit: Option<ChildExit>) {
        if !self.closed_reported.swap(true, Ordering::SeqCst) {
            let exit_code = exit.and_then(|e| e.code);
            info!(exit_code = ?exit_code, "Interactive session closed");
            self.emitter.emit(PtyEvent::Closed { exit_code }.into());
        }
    }
}

/// Input side of a session. Locked separately from the session slot so a
/// write blocked on a child that never reads cannot hold up `close`.
type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

struct ActiveSession {
    writer: SharedWriter,
    shared: Arc<SessionShared>,
}

/// A freshly opened session.
#[derive(Debug)]
pub struct PtySession {
    pub pid: Option<u32>,
    pub command: String,
    pub output: PtyOutput,
}

/// Lazy sequence of filtered output chunks of one session.
///
/// Ends once every reader of the session has stopped. A logical line may be
/// split across chunks.
#[derive(Debug)]
pub struct PtyOutput {
    rx: mpsc::UnboundedReceiver<String>,
}

impl PtyOutput {
    pub async fn next_chunk(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = String> + Send {
        futures_util::stream::unfold(self, |mut out| async move {
            out.next_chunk().await.map(|chunk| (chunk, out))
        })
    }
}

/// Bridges one interactive child to a line-oriented input and a chunked
/// output stream.
///
/// State machine: `Closed --open--> Running --eof & exit--> Closed(exited)`,
/// `Running --close--> Closed(terminated)`. Only one session exists at a
/// time; `open` while one is running fails with `AlreadyOpen`.
pub struct PtyBridge {
    port: Arc<dyn InteractivePtyPort>,
    emitter: Arc<dyn ConsoleEventEmitter>,
    session: Mutex<Option<ActiveSession>>,
    last_state: Mutex<ProcessState>,
}

impl PtyBridge {
    pub fn new(port: Arc<dyn InteractivePtyPort>, emitter: Arc<dyn ConsoleEventEmitter>) -> Self {
        Self {
            port,
            emitter,
            session: Mutex::new(None),
            last_state: Mutex::new(ProcessState::NotStarted),
        }
    }

    /// Spawn `command` attached to the terminal and start the readers.
    pub fn open(
        &self,
        command: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<PtySession, PtyError> {
        let mut guard = lock(&self.session);
        if let Some(existing) = guard.as_ref() {
            let exit = existing.shared.exit_status();
            if exit.is_none() {
                return Err(PtyError::AlreadyOpen);
            }
            debug!("Releasing exited interactive session");
            if let Some(old) = guard.take() {
                old.shared.report_closed(exit);
            }
        }

        *lock(&self.last_state) = ProcessState::Starting;
        let channels = match self.port.spawn(command, args, cwd) {
            Ok(channels) => channels,
            Err(e) => {
                warn!(backend = self.port.name(), error = %e, "Failed to open interactive session");
                *lock(&self.last_state) = ProcessState::FailedToStart;
                self.emitter.emit(
                    PtyEvent::Error {
                        error: e.to_string(),
                    }
                    .into(),
                );
                return Err(e);
            }
        };

        let pid = channels.child.pid();
        let shared = Arc::new(SessionShared {
            child: Mutex::new(channels.child),
            exit: Mutex::new(None),
            closing: AtomicBool::new(false),
            closed_reported: AtomicBool::new(false),
            live_readers: AtomicUsize::new(channels.readers.len()),
            emitter: self.emitter.clone(),
        });

        let command_line = crate::process::display_command(command, args);
        info!(backend = self.port.name(), pid = ?pid, command = %command_line, "Interactive session opened");
        self.emitter.emit(
            PtyEvent::Opened {
                pid,
                command: command_line.clone(),
            }
            .into(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        for (stream, reader) in channels.readers {
            let reader_shared = shared.clone();
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("pty-{}", stream.as_str()))
                .spawn(move || read_loop(stream, reader, &reader_shared, &tx));
            if let Err(e) = spawned {
                shared.closing.store(true, Ordering::SeqCst);
                let _ = lock(&shared.child).kill();
                *lock(&self.last_state) = ProcessState::FailedToStart;
                let err = PtyError::SpawnFailed(e.to_string());
                self.emitter.emit(
                    PtyEvent::Error {
                        error: err.to_string(),
                    }
                    .into(),
                );
                return Err(err);
            }
        }

        *guard = Some(ActiveSession {
            writer: Arc::new(Mutex::new(channels.writer)),
            shared,
        });
        *lock(&self.last_state) = ProcessState::Running;

        Ok(PtySession {
            pid,
            command: command_line,
            output: PtyOutput { rx },
        })
    }

    /// Write `line` followed by a newline.
    ///
    /// Blocks while the terminal's input buffer is full. A concurrent
    /// `close` still completes; the pending write then fails.
    pub fn send(&self, line: &str) -> Result<(), PtyError> {
        let writer = {
            let guard = lock(&self.session);
            let Some(session) = guard.as_ref() else {
                return Err(PtyError::NotRunning);
            };
            if session.shared.exit_status().is_some() {
                return Err(PtyError::NotRunning);
            }
            session.writer.clone()
        };

        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');
        let mut writer = lock(&writer);
        writer
            .write_all(data.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| PtyError::WriteFailed(e.to_string()))
    }

    /// Current session state.
    pub fn state(&self) -> ProcessState {
        if let Some(session) = lock(&self.session).as_ref() {
            return match session.shared.exit_status() {
                Some(exit) => ProcessState::from_exit_code(exit.code),
                None => ProcessState::Running,
            };
        }
        *lock(&self.last_state)
    }

    /// Terminate the child if alive (SIGTERM, `grace`, then kill) and
    /// release the terminal.
    ///
    /// Safe to call repeatedly and before any `open`.
    pub async fn close(&self, grace: Duration) -> Option<ChildExit> {
        let session = lock(&self.session).take()?;
        session.shared.closing.store(true, Ordering::SeqCst);

        let exit = terminate(&session.shared, grace).await;
        drop(session.writer);

        session.shared.report_closed(exit);
        *lock(&self.last_state) = match exit {
            Some(exit) => ProcessState::from_exit_code(exit.code),
            None => ProcessState::ExitedError,
        };
        exit
    }
}

impl Drop for PtyBridge {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.session).take() {
            if session.shared.exit_status().is_none() {
                let _ = lock(&session.shared.child).kill();
            }
        }
    }
}

async fn terminate(shared: &SessionShared, grace: Duration) -> Option<ChildExit> {
    if let Some(exit) = shared.exit_status() {
        return Some(exit);
    }

    let pid = lock(&shared.child).pid();
    let signalled = match pid.map(send_terminate) {
        Some(Ok(sent)) => sent,
        Some(Err(e)) => {
            warn!(error = %e, "Failed to signal interactive child");
            false
        }
        None => false,
    };

    if signalled {
        if let Some(exit) = poll_exit(shared, grace).await {
            return Some(exit);
        }
        warn!(pid = ?pid, grace_ms = grace.as_millis(), "Grace period elapsed, killing");
    }

    if let Err(e) = lock(&shared.child).kill() {
        debug!(error = %e, "Kill failed (child may have exited)");
    }
    poll_exit(shared, KILL_SETTLE).await
}

async fn poll_exit(shared: &SessionShared, limit: Duration) -> Option<ChildExit> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(exit) = shared.exit_status() {
            return Some(exit);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(EXIT_POLL).await;
    }
}

/// Blocking reader thread body, one per output endpoint.
fn read_loop(
    stream: LogStream,
    mut reader: Box<dyn Read + Send>,
    shared: &SessionShared,
    tx: &mpsc::UnboundedSender<String>,
) {
    drain(stream, &mut *reader, shared, tx);

    // Every chunk of this reader is out; only the last reader may close.
    let last = shared.live_readers.fetch_sub(1, Ordering::SeqCst) == 1;
    if last && !shared.closing.load(Ordering::SeqCst) {
        shared.report_closed(shared.exit_status());
    }
    debug!(stream = stream.as_str(), "Interactive reader exiting");
}

fn drain(
    stream: LogStream,
    reader: &mut dyn Read,
    shared: &SessionShared,
    tx: &mpsc::UnboundedSender<String>,
) {
    let mut buf = [0u8; READ_CHUNK];
    let mut carry = Utf8Carry::default();

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                if end_of_stream(shared) {
                    break;
                }
            }
            Ok(n) => {
                let text = strip_output(&carry.decode(&buf[..n]));
                if !text.is_empty() {
                    shared.emitter.emit(PtyEvent::chunk(stream, text.clone()).into());
                    let _ = tx.send(text);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            // Linux reports EIO on the master once the slave side is gone.
            Err(e) if is_hangup(&e) => {
                if end_of_stream(shared) {
                    break;
                }
            }
            Err(e) => {
                warn!(stream = stream.as_str(), error = %e, "Interactive reader failed");
                shared.emitter.emit(
                    PtyEvent::Error {
                        error: e.to_string(),
                    }
                    .into(),
                );
                return;
            }
        }
    }
}

/// Decide what an empty read means: final once the child has exited (or a
/// close is in progress), otherwise "no data yet".
fn end_of_stream(shared: &SessionShared) -> bool {
    if shared.exit_status().is_some() || shared.closing.load(Ordering::SeqCst) {
        return true;
    }
    thread::sleep(IDLE_BACKOFF);
    false
}

#[cfg(unix)]
fn is_hangup(e: &io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
}

#[cfg(not(unix))]
fn is_hangup(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
}

/// Holds back an incomplete UTF-8 sequence split across reads.
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Decode everything but a trailing incomplete sequence. Invalid bytes
    /// anywhere else become U+FFFD.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.pending.len();
                }
                Err(e) => {
                    let end = start + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[start..end]));
                    let Some(invalid) = e.error_len() else {
                        start = end;
                        break;
                    };
                    text.push(char::REPLACEMENT_CHARACTER);
                    start = end + invalid;
                }
            }
        }
        self.pending.drain(..start);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use ogpt_core::{ConsoleEvent, NoopEmitter, PtyChannels};

    mock! {
        pub Emitter {}
        impl ConsoleEventEmitter for Emitter {
            fn emit(&self, event: ConsoleEvent);
            fn clone_box(&self) -> Box<dyn ConsoleEventEmitter>;
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            lock(&self.0).extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FakeChild {
        alive: Arc<AtomicBool>,
    }

    impl PtyChild for FakeChild {
        fn pid(&self) -> Option<u32> {
            None
        }
        fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
            Ok((!self.alive.load(Ordering::SeqCst)).then_some(ChildExit { code: Some(0) }))
        }
        fn kill(&mut self) -> io::Result<()> {
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Child that stays alive until killed and never prints.
    #[derive(Default)]
    struct FakePort {
        written: SharedBuf,
        alive: Arc<AtomicBool>,
    }

    impl InteractivePtyPort for FakePort {
        fn spawn(&self, _: &Path, _: &[String], _: Option<&Path>) -> Result<PtyChannels, PtyError> {
            self.alive.store(true, Ordering::SeqCst);
            Ok(PtyChannels {
                readers: vec![(LogStream::Merged, Box::new(io::empty()) as Box<dyn Read + Send>)],
                writer: Box::new(self.written.clone()),
                child: Box::new(FakeChild {
                    alive: self.alive.clone(),
                }),
            })
        }
        fn name(&self) -> &'static str {
            "fake"
        }
    }

    struct FailingPort;

    impl InteractivePtyPort for FailingPort {
        fn spawn(&self, _: &Path, _: &[String], _: Option<&Path>) -> Result<PtyChannels, PtyError> {
            Err(PtyError::SpawnFailed("no such program".into()))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn bridge(port: Arc<dyn InteractivePtyPort>) -> PtyBridge {
        PtyBridge::new(port, Arc::new(NoopEmitter::new()))
    }

    #[test]
    fn send_before_open_is_not_running() {
        let bridge = bridge(Arc::new(FakePort::default()));
        assert_eq!(bridge.send("hi"), Err(PtyError::NotRunning));
        assert_eq!(bridge.state(), ProcessState::NotStarted);
    }

    #[test]
    fn spawn_failure_is_reported_once() {
        let mut emitter = MockEmitter::new();
        emitter
            .expect_emit()
            .withf(|e| matches!(e, ConsoleEvent::Pty { event: PtyEvent::Error { .. } }))
            .times(1)
            .return_const(());
        let bridge = PtyBridge::new(Arc::new(FailingPort), Arc::new(emitter));

        let err = bridge.open(Path::new("ollama"), &[], None).unwrap_err();
        assert!(matches!(err, PtyError::SpawnFailed(_)));
        assert_eq!(bridge.state(), ProcessState::FailedToStart);
        assert_eq!(bridge.send("x"), Err(PtyError::NotRunning));
    }

    #[tokio::test]
    async fn send_appends_newline_and_second_open_is_rejected() {
        let port = Arc::new(FakePort::default());
        let bridge = bridge(port.clone());

        let _session = bridge.open(Path::new("ollama"), &["run".into(), "m".into()], None).unwrap();
        assert_eq!(bridge.state(), ProcessState::Running);

        bridge.send("hello").unwrap();
        assert_eq!(lock(&port.written.0).as_slice(), b"hello\n");

        assert_eq!(
            bridge.open(Path::new("ollama"), &[], None).unwrap_err(),
            PtyError::AlreadyOpen
        );

        let exit = bridge.close(Duration::from_millis(100)).await;
        assert_eq!(exit, Some(ChildExit { code: Some(0) }));
        assert_eq!(bridge.send("late"), Err(PtyError::NotRunning));

        // Closing twice is a no-op.
        assert_eq!(bridge.close(Duration::from_millis(100)).await, None);
    }

    #[tokio::test]
    async fn close_without_open_is_noop() {
        let bridge = bridge(Arc::new(FakePort::default()));
        assert_eq!(bridge.close(Duration::from_millis(10)).await, None);
        assert_eq!(bridge.state(), ProcessState::NotStarted);
    }

    #[test]
    fn exited_session_is_replaced_on_open() {
        let port = Arc::new(FakePort::default());
        let bridge = bridge(port.clone());

        bridge.open(Path::new("a"), &[], None).unwrap();
        port.alive.store(false, Ordering::SeqCst);
        assert_eq!(bridge.send("x"), Err(PtyError::NotRunning));
        assert_eq!(bridge.state(), ProcessState::ExitedOk);

        bridge.open(Path::new("b"), &[], None).unwrap();
        assert_eq!(bridge.state(), ProcessState::Running);
        port.alive.store(false, Ordering::SeqCst);
    }

    #[test]
    fn utf8_split_across_reads_is_reassembled() {
        let mut carry = Utf8Carry::default();
        let bytes = "模型".as_bytes();
        let first = carry.decode(&bytes[..2]);
        let second = carry.decode(&bytes[2..]);
        assert_eq!(first, "");
        assert_eq!(second, "模型");

        assert_eq!(carry.decode(b"ok \xff"), "ok \u{fffd}");
    }

    #[test]
    fn invalid_byte_does_not_break_a_split_character() {
        let mut carry = Utf8Carry::default();
        let bytes = "型".as_bytes();
        let mut first = b"a\xffb".to_vec();
        first.extend_from_slice(&bytes[..1]);

        assert_eq!(carry.decode(&first), "a\u{fffd}b");
        assert_eq!(carry.decode(&bytes[1..]), "型");
    }
}
