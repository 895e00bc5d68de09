use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::batcher::DEFAULT_FLUSH_INTERVAL;
use crate::errors::StreamError;
use crate::parser::FrameParser;
use crate::session::{Ingest, StreamSession};
use crate::transport::{StreamRequest, Transport};

/// Receives the output of one generation.
///
/// Calls arrive in order on the task running the generation, never
/// concurrently. Exactly one of `on_complete` / `on_error` is the last call.
pub trait StreamCallbacks: Send {
    /// A batch of newly generated text. Provisional until `on_complete`:
    /// a retried attempt starts the answer over.
    fn on_fragment(&mut self, text: &str);

    /// The generation finished; `full_text` is the whole answer.
    fn on_complete(&mut self, full_text: String);

    /// The generation failed or was cancelled (see [`StreamError::is_cancelled`]).
    fn on_error(&mut self, error: StreamError);
}

/// Handle used to cancel a running generation.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Idempotent. Before the first byte, during streaming, or during a retry
    /// pause, the generation ends with `StreamError::Cancelled`. Once the
    /// generation has finished this does nothing.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of an [`AbortHandle`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once abort has been requested. Never resolves if every
    /// handle is dropped without aborting.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Drives the read loop of one streaming call at a time.
///
/// Each [`attempt`](StreamCoordinator::attempt) opens the call, feeds every
/// chunk through a fresh [`StreamSession`] and forwards batched fragments to
/// the callbacks. Terminal callbacks are left to the caller so that retries
/// can wrap whole attempts.
pub struct StreamCoordinator {
    parser: FrameParser,
    flush_interval: Duration,
    abort: AbortSignal,
}

impl StreamCoordinator {
    pub fn new(parser: FrameParser, abort: AbortSignal) -> Self {
        Self {
            parser,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            abort,
        }
    }

    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn parser(&self) -> FrameParser {
        self.parser
    }

    /// Runs one attempt and returns the accumulated text on natural end of
    /// stream.
    ///
    /// Pending fragments are flushed to `on_fragment` before returning,
    /// whatever the outcome.
    pub async fn attempt(
        &mut self,
        transport: &dyn Transport,
        request: &StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<String, StreamError> {
        let provider = request.provider;
        if self.abort.is_aborted() {
            return Err(StreamError::Cancelled);
        }

        let mut stream = tokio::select! {
            biased;
            _ = self.abort.cancelled() => return Err(StreamError::Cancelled),
            opened = transport.open(request) => opened?,
        };

        let mut session = StreamSession::new(self.parser, self.flush_interval);
        let outcome = loop {
            let deadline = session.batcher.deadline();
            tokio::select! {
                biased;
                _ = self.abort.cancelled() => break Err(StreamError::Cancelled),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(text) = session.batcher.on_timer() {
                        callbacks.on_fragment(&text);
                    }
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => {
                        if let Ingest::ProviderError(message) = session.ingest(&chunk) {
                            break Err(StreamError::provider_error(provider, message));
                        }
                    }
                    Some(Err(err)) => break Err(err),
                    None => {
                        session.close();
                        break Ok(());
                    }
                },
            }
        };

        if let Some(text) = session.batcher.finish() {
            callbacks.on_fragment(&text);
        }

        match outcome {
            Ok(()) => {
                debug!(
                    event = "stream.attempt_completed",
                    domain = "stream",
                    provider = %provider,
                    deltas = session.deltas(),
                    text_len = session.full_text().len() as u64
                );
                Ok(session.into_full_text())
            }
            Err(err) => {
                warn!(
                    event = "stream.attempt_failed",
                    domain = "stream",
                    provider = %provider,
                    code = err.code(),
                    deltas = session.deltas(),
                    error = %err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;

    use super::*;
    use crate::transport::ByteStream;

    /// What one scripted `open` call does.
    pub(crate) enum Script {
        Fail(StreamError),
        /// Yields the chunks, then ends.
        Chunks(Vec<Result<&'static [u8], StreamError>>),
        /// Yields the chunks, then never ends.
        ChunksThenHang(Vec<Result<&'static [u8], StreamError>>),
    }

    /// Transport that replays one script per `open` call.
    pub(crate) struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        pub(crate) opened: Mutex<Vec<StreamRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                opened: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn open_count(&self) -> usize {
            self.opened.lock().expect("lock").len()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&self, request: &StreamRequest) -> Result<ByteStream, StreamError> {
            self.opened.lock().expect("lock").push(request.clone());
            let script = self
                .scripts
                .lock()
                .expect("lock")
                .pop_front()
                .expect("unexpected open call");
            match script {
                Script::Fail(err) => Err(err),
                Script::Chunks(chunks) => Ok(Box::pin(stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| c.map(bytes::Bytes::from_static))
                        .collect::<Vec<_>>(),
                ))),
                Script::ChunksThenHang(chunks) => Ok(Box::pin(
                    stream::iter(
                        chunks
                            .into_iter()
                            .map(|c| c.map(bytes::Bytes::from_static))
                            .collect::<Vec<_>>(),
                    )
                    .chain(stream::pending()),
                )),
            }
        }
    }

    /// Callback sink that records every call in order.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub(crate) calls: Vec<Call>,
    }

    #[derive(Debug, PartialEq)]
    pub(crate) enum Call {
        Fragment(String),
        Complete(String),
        Error(StreamError),
    }

    impl Recorder {
        pub(crate) fn fragments(&self) -> String {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Fragment(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn terminal_calls(&self) -> Vec<&Call> {
            self.calls
                .iter()
                .filter(|c| !matches!(c, Call::Fragment(_)))
                .collect()
        }
    }

    impl StreamCallbacks for Recorder {
        fn on_fragment(&mut self, text: &str) {
            self.calls.push(Call::Fragment(text.to_string()));
        }

        fn on_complete(&mut self, full_text: String) {
            self.calls.push(Call::Complete(full_text));
        }

        fn on_error(&mut self, error: StreamError) {
            self.calls.push(Call::Error(error));
        }
    }

    /// Scripted chunk; the helper coerces byte-string literals to slices.
    pub(crate) fn ok(bytes: &'static [u8]) -> Result<&'static [u8], StreamError> {
        Ok(bytes)
    }

    pub(crate) fn gemini_request() -> StreamRequest {
        StreamRequest {
            provider: crate::model::ProviderKind::Gemini,
            url: "http://localhost/gemini".into(),
            headers: Vec::new(),
            body: serde_json::json!({}),
        }
    }

    pub(crate) fn claude_request() -> StreamRequest {
        StreamRequest {
            provider: crate::model::ProviderKind::Claude,
            url: "http://localhost/claude".into(),
            headers: Vec::new(),
            body: serde_json::json!({}),
        }
    }
}
