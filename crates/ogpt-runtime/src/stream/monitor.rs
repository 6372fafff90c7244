//! Cancellable NDJSON sessions over HTTP.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use ogpt_core::{ConsoleEventEmitter, StreamError, StreamEvent, StreamKind, StreamSessionId};
use reqwest::{Client, RequestBuilder};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lines::LineBuffer;
use super::parse::LineParser;

/// Caller's view of one running session.
///
/// Events are also published through the monitor's emitter; this receiver
/// is a private copy for the caller. It ends after the terminal event.
#[derive(Debug)]
pub struct StreamSession {
    id: StreamSessionId,
    kind: StreamKind,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl StreamSession {
    pub const fn id(&self) -> StreamSessionId {
        self.id
    }

    pub const fn kind(&self) -> StreamKind {
        self.kind
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Request cancellation. No-op when repeated or after the session ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures_util::stream::unfold(self, |mut session| async move {
            session.next_event().await.map(|event| (event, session))
        })
    }
}

struct ActiveStream {
    id: StreamSessionId,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// Runs at most one streaming session per [`StreamKind`].
pub struct StreamMonitor {
    client: Client,
    emitter: Arc<dyn ConsoleEventEmitter>,
    active: Mutex<HashMap<StreamKind, ActiveStream>>,
}

impl StreamMonitor {
    pub fn new(emitter: Arc<dyn ConsoleEventEmitter>) -> Self {
        Self::with_client(Client::new(), emitter)
    }

    pub fn with_client(client: Client, emitter: Arc<dyn ConsoleEventEmitter>) -> Self {
        Self {
            client,
            emitter,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// POST `payload` to `url` and stream the body on a worker task.
    ///
    /// A session of the same `kind` still in flight is cancelled and awaited
    /// first. `idle_timeout` bounds the wait for response headers and for
    /// each body chunk, not the whole body.
    pub async fn start(
        &self,
        url: &str,
        payload: serde_json::Value,
        kind: StreamKind,
        idle_timeout: Duration,
    ) -> StreamSession {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.remove(&kind) {
            debug!(session = %previous.id, %kind, "Replacing previous session");
            previous.cancel.cancel();
            if let Err(e) = previous.worker.await {
                warn!(session = %previous.id, error = %e, "Stream worker panicked");
            }
        }

        let id = StreamSessionId::new();
        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::unbounded_channel();

        let worker = Worker {
            id,
            kind,
            idle_timeout,
            cancel: cancel.clone(),
            tx,
            emitter: self.emitter.clone(),
        };
        let request = self.client.post(url).json(&payload);
        info!(session = %id, %kind, url, "Stream starting");
        let handle = tokio::spawn(worker.run(request));

        active.insert(
            kind,
            ActiveStream {
                id,
                cancel: cancel.clone(),
                worker: handle,
            },
        );

        StreamSession {
            id,
            kind,
            cancel,
            events,
        }
    }

    /// Cancel session `id` and wait for its worker to stop.
    ///
    /// Returns `false` when no such session is tracked.
    pub async fn cancel(&self, id: StreamSessionId) -> bool {
        let entry = {
            let mut active = self.active.lock().await;
            let kind = active
                .iter()
                .find_map(|(kind, stream)| (stream.id == id).then_some(*kind));
            kind.and_then(|kind| active.remove(&kind))
        };
        let Some(stream) = entry else {
            return false;
        };
        stream.cancel.cancel();
        let _ = stream.worker.await;
        true
    }

    /// Cancel every session and wait for all workers.
    pub async fn cancel_all(&self) {
        let streams: Vec<ActiveStream> = self.active.lock().await.drain().map(|(_, s)| s).collect();
        for stream in &streams {
            stream.cancel.cancel();
        }
        for stream in streams {
            let _ = stream.worker.await;
        }
    }

    /// Whether a session of `kind` is still being read.
    pub async fn is_active(&self, kind: StreamKind) -> bool {
        self.active
            .lock()
            .await
            .get(&kind)
            .is_some_and(|s| !s.worker.is_finished())
    }
}

enum Stop {
    Cancelled,
    Failed(StreamError),
}

struct Worker {
    id: StreamSessionId,
    kind: StreamKind,
    idle_timeout: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<StreamEvent>,
    emitter: Arc<dyn ConsoleEventEmitter>,
}

impl Worker {
    fn emit(&self, event: StreamEvent) {
        let _ = self.tx.send(event.clone());
        self.emitter.emit(event.into());
    }

    async fn run(self, request: RequestBuilder) {
        self.emit(StreamEvent::Started {
            session: self.id,
            kind: self.kind,
        });

        let terminal = match self.drive(request).await {
            Ok(()) => {
                info!(session = %self.id, kind = %self.kind, "Stream finished");
                StreamEvent::Done { session: self.id }
            }
            Err(Stop::Cancelled) => {
                info!(session = %self.id, kind = %self.kind, "Stream cancelled");
                StreamEvent::Cancelled { session: self.id }
            }
            Err(Stop::Failed(e)) => {
                warn!(session = %self.id, kind = %self.kind, error = %e, "Stream failed");
                StreamEvent::Failed {
                    session: self.id,
                    error: e.to_string(),
                }
            }
        };
        self.emit(terminal);
    }

    async fn drive(&self, request: RequestBuilder) -> Result<(), Stop> {
        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Stop::Cancelled),
            sent = timeout(self.idle_timeout, request.send()) => match sent {
                Err(_) => return Err(Stop::Failed(StreamError::Timeout(self.idle_timeout))),
                Ok(Err(e)) => return Err(Stop::Failed(StreamError::ConnectFailed(e.to_string()))),
                Ok(Ok(response)) => response,
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = timeout(self.idle_timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(Stop::Failed(StreamError::HttpStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            }));
        }

        let mut body = response.bytes_stream().boxed();
        let mut lines = LineBuffer::default();
        let mut parser = LineParser::new(self.id, self.kind);

        loop {
            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Stop::Cancelled),
                next = timeout(self.idle_timeout, body.next()) => match next {
                    Err(_) => return Err(Stop::Failed(StreamError::Timeout(self.idle_timeout))),
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        return Err(Stop::Failed(StreamError::UnexpectedClose(e.to_string())));
                    }
                    Ok(Some(Ok(chunk))) => chunk,
                }
            };

            lines.push(&chunk);
            while let Some(line) = lines.next_line() {
                if self.cancel.is_cancelled() {
                    return Err(Stop::Cancelled);
                }
                for event in parser.parse(&line) {
                    self.emit(event);
                }
            }
        }

        if let Some(line) = lines.finish() {
            for event in parser.parse(&line) {
                self.emit(event);
            }
        }
        if let Some(event) = parser.finish() {
            self.emit(event);
        }
        Ok(())
    }
}
