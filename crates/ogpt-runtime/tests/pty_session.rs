//! Interactive sessions over both terminal backends.
#![cfg(unix)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ogpt_core::{
    ConsoleEvent, ConsoleEventEmitter, LogStream, NoopEmitter, ProcessState, PtyBackend, PtyError,
    PtyEvent,
};
use ogpt_runtime::{PtyBridge, PtyOutput, backend_for};
use tokio::time::timeout;

const GRACE: Duration = Duration::from_secs(1);

fn bridge(backend: PtyBackend) -> PtyBridge {
    PtyBridge::new(backend_for(backend), Arc::new(NoopEmitter::new()))
}

/// Keeps every emitted event in order.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<ConsoleEvent>>>);

impl Recorder {
    fn events(&self) -> Vec<ConsoleEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl ConsoleEventEmitter for Recorder {
    fn emit(&self, event: ConsoleEvent) {
        self.0.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn ConsoleEventEmitter> {
        Box::new(self.clone())
    }
}

fn is_closed(event: &ConsoleEvent) -> bool {
    matches!(event, ConsoleEvent::Pty { event: PtyEvent::Closed { .. } })
}

/// Read chunks until `needle` shows up in the accumulated output.
async fn read_until(output: &mut PtyOutput, needle: &str) -> String {
    let mut seen = String::new();
    timeout(Duration::from_secs(5), async {
        while let Some(chunk) = output.next_chunk().await {
            seen.push_str(&chunk);
            if seen.contains(needle) {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {seen:?}"));
    seen
}

async fn echo_round_trip(backend: PtyBackend) {
    let bridge = bridge(backend);
    let mut session = bridge.open(Path::new("cat"), &[], None).unwrap();
    assert!(session.pid.is_some());
    assert_eq!(bridge.state(), ProcessState::Running);

    bridge.send("hello").unwrap();
    let seen = read_until(&mut session.output, "hello").await;
    assert!(!seen.contains('\u{1b}'));

    bridge.close(GRACE).await;
    assert!(bridge.state().is_terminal());
    assert_eq!(bridge.send("again"), Err(PtyError::NotRunning));
}

#[tokio::test(flavor = "multi_thread")]
async fn native_echo_round_trip() {
    echo_round_trip(PtyBackend::Native).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn pipe_echo_round_trip() {
    echo_round_trip(PtyBackend::Pipe).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn exited_child_rejects_input_and_ends_output() {
    let bridge = bridge(PtyBackend::Native);
    let args = vec!["-c".to_string(), "echo bye".to_string()];
    let mut session = bridge.open(Path::new("sh"), &args, None).unwrap();

    read_until(&mut session.output, "bye").await;
    // Output ends once the readers observe the exit.
    timeout(Duration::from_secs(5), async {
        while session.output.next_chunk().await.is_some() {}
    })
    .await
    .unwrap();

    assert_eq!(bridge.state(), ProcessState::ExitedOk);
    assert_eq!(bridge.send("hello"), Err(PtyError::NotRunning));

    // An exited session is replaced by the next open.
    let mut next = bridge.open(Path::new("cat"), &[], None).unwrap();
    bridge.send("again").unwrap();
    read_until(&mut next.output, "again").await;
    bridge.close(GRACE).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn open_while_running_is_rejected() {
    let bridge = bridge(PtyBackend::Pipe);
    let _session = bridge.open(Path::new("cat"), &[], None).unwrap();

    let err = bridge.open(Path::new("cat"), &[], None).unwrap_err();
    assert_eq!(err, PtyError::AlreadyOpen);

    assert!(bridge.close(GRACE).await.is_some());
    assert!(bridge.close(GRACE).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_program_fails_to_spawn() {
    let bridge = bridge(PtyBackend::Pipe);
    let err = bridge
        .open(Path::new("/nonexistent/ollama"), &[], None)
        .unwrap_err();
    assert!(matches!(err, PtyError::SpawnFailed(_)));
    assert_eq!(bridge.state(), ProcessState::FailedToStart);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_completes_while_a_send_is_blocked() {
    let bridge = Arc::new(bridge(PtyBackend::Pipe));
    let _session = bridge.open(Path::new("sleep"), &["30".to_string()], None).unwrap();

    // Far more than a pipe buffer, and `sleep` never reads its input.
    let writer = {
        let bridge = bridge.clone();
        std::thread::spawn(move || bridge.send(&"x".repeat(512 * 1024)))
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let exit = timeout(Duration::from_secs(4), bridge.close(Duration::from_millis(200)))
        .await
        .expect("close waited on the blocked write");
    assert!(exit.is_some());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(bridge.state().is_terminal());

    let sent = writer.join().unwrap();
    assert!(matches!(sent, Err(PtyError::WriteFailed(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_follows_all_output_of_both_pipes() {
    let recorder = Recorder::default();
    let bridge = PtyBridge::new(backend_for(PtyBackend::Pipe), Arc::new(recorder.clone()));
    let script = "head -c 60000 /dev/zero | tr '\\0' e >&2; echo done";
    let args = vec!["-c".to_string(), script.to_string()];
    let mut session = bridge.open(Path::new("sh"), &args, None).unwrap();

    timeout(Duration::from_secs(10), async {
        while session.output.next_chunk().await.is_some() {}
    })
    .await
    .unwrap();

    let events = recorder.events();
    assert_eq!(events.iter().filter(|e| is_closed(e)).count(), 1);
    let closed_at = events.iter().position(is_closed).unwrap();
    assert!(
        events[closed_at + 1..]
            .iter()
            .all(|e| !matches!(e, ConsoleEvent::Pty { event: PtyEvent::Chunk { .. } })),
        "chunks emitted after the close"
    );

    let lines: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConsoleEvent::Pty {
                event: PtyEvent::Chunk { line },
            } => Some(line),
            _ => None,
        })
        .collect();
    let stderr_bytes: usize = lines
        .iter()
        .filter(|l| l.stream == LogStream::Stderr)
        .map(|l| l.text.len())
        .sum();
    assert_eq!(stderr_bytes, 60_000);
    assert!(lines
        .iter()
        .any(|l| l.stream == LogStream::Stdout && l.text.contains("done")));
}
