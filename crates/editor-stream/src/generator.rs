use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::batcher::DEFAULT_FLUSH_INTERVAL;
use crate::context::ContextWindow;
use crate::coordinator::{AbortHandle, AbortSignal, StreamCallbacks, StreamCoordinator, abort_pair};
use crate::errors::{SetupError, StreamError};
use crate::message::{Message, dialogue_turns};
use crate::model::{GenerationOptions, ProviderKind};
use crate::retry::RetryPolicy;
use crate::stream::{StreamUpdate, TextCollector};
use crate::transport::{ReqwestTransport, StreamRequest, Transport};
use crate::vendors::ProviderConfig;

/// Entry point for starting generations against one provider.
///
/// Cheap to clone; every [`start`](Generator::start) creates an independent
/// [`Generation`] with its own parser, batcher and abort handle.
#[derive(Clone)]
pub struct Generator {
    provider: ProviderConfig,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    flush_interval: Duration,
    context: ContextWindow,
    options: GenerationOptions,
}

impl Generator {
    /// Starts a builder; a provider config is required.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn context_window(&self) -> ContextWindow {
        self.context
    }

    /// Trims `messages` to the token budget and prepares a generation.
    ///
    /// Nothing is sent until [`Generation::run`] is awaited.
    pub fn start(&self, messages: &[Message]) -> Result<Generation, SetupError> {
        if messages.is_empty() {
            return Err(SetupError::Validation(
                "at least one message is required".into(),
            ));
        }
        let fitted = self.context.fit(messages);
        if dialogue_turns(fitted).next().is_none() {
            return Err(SetupError::Validation(format!(
                "no user message left to send ({} of {} messages fit the context window)",
                fitted.len(),
                messages.len()
            )));
        }
        let request = self.provider.build_request(fitted, &self.options);
        let (abort_handle, abort) = abort_pair();
        let coordinator = StreamCoordinator::new(self.provider.parser(), abort.clone())
            .flush_interval(self.flush_interval);
        let id = uuid::Uuid::new_v4();

        debug!(
            event = "generation.prepared",
            domain = "generation",
            generation_id = %id,
            provider = %self.provider.kind(),
            model = self.provider.model(),
            messages = messages.len() as u64,
            kept = fitted.len() as u64
        );

        Ok(Generation {
            id,
            request,
            transport: self.transport.clone(),
            retry_policy: self.retry_policy.clone(),
            coordinator,
            abort_handle,
            abort,
        })
    }
}

/// Builder for [`Generator`].
#[derive(Default)]
pub struct GeneratorBuilder {
    provider: Option<ProviderConfig>,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Option<RetryPolicy>,
    flush_interval: Option<Duration>,
    token_budget: Option<usize>,
    options: GenerationOptions,
}

impl GeneratorBuilder {
    pub fn provider(mut self, provider: impl Into<ProviderConfig>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Replaces the default `reqwest` transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Minimum interval between `on_fragment` calls (default 50 ms).
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Approximate context size in tokens. Defaults to the provider's budget.
    pub fn token_budget(mut self, tokens: usize) -> Self {
        self.token_budget = Some(tokens);
        self
    }

    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the configuration and builds the generator.
    pub fn build(self) -> Result<Generator, SetupError> {
        let provider = self
            .provider
            .ok_or_else(|| SetupError::Config("a provider config is required".into()))?;
        provider.validate()?;

        let flush_interval = self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL);
        if flush_interval.is_zero() {
            return Err(SetupError::Validation(
                "flush_interval must be greater than 0".into(),
            ));
        }
        if self.token_budget == Some(0) {
            return Err(SetupError::Validation(
                "token_budget must be greater than 0".into(),
            ));
        }
        if self.options.max_output_tokens == 0 {
            return Err(SetupError::Validation(
                "max_output_tokens must be greater than 0".into(),
            ));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(provider.timeout())?),
        };
        let context =
            ContextWindow::new(self.token_budget.unwrap_or(provider.default_token_budget()));

        Ok(Generator {
            provider,
            transport,
            retry_policy: self.retry_policy.unwrap_or_default(),
            flush_interval,
            context,
            options: self.options,
        })
    }
}

/// One prepared request. Consumed by [`run`](Generation::run), so a
/// generation streams at most once.
pub struct Generation {
    id: uuid::Uuid,
    request: StreamRequest,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    coordinator: StreamCoordinator,
    abort_handle: AbortHandle,
    abort: AbortSignal,
}

/// State shared by every attempt of one generation.
struct Attempts<'a> {
    coordinator: StreamCoordinator,
    transport: &'a dyn Transport,
    request: &'a StreamRequest,
    callbacks: &'a mut dyn StreamCallbacks,
}

impl Generation {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Returns a handle that cancels this generation.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Streams the answer with retries.
    ///
    /// `on_fragment` may fire any number of times; then exactly one of
    /// `on_complete` / `on_error` fires.
    pub async fn run(self, callbacks: &mut dyn StreamCallbacks) {
        let Generation {
            id,
            request,
            transport,
            retry_policy,
            coordinator,
            mut abort,
            ..
        } = self;
        let provider = request.provider;
        info!(
            event = "generation.started",
            domain = "generation",
            generation_id = %id,
            provider = %provider,
            max_attempts = retry_policy.max_attempts
        );

        let mut attempts = Attempts {
            coordinator,
            transport: transport.as_ref(),
            request: &request,
            callbacks: &mut *callbacks,
        };
        let result = retry_policy
            .run(&mut abort, &mut attempts, |state, number| {
                debug!(
                    event = "stream.attempt_started",
                    domain = "stream",
                    generation_id = %id,
                    attempt = number
                );
                Box::pin(state.coordinator.attempt(
                    state.transport,
                    state.request,
                    &mut *state.callbacks,
                ))
            })
            .await;

        match result {
            Ok(full_text) => {
                info!(
                    event = "generation.completed",
                    domain = "generation",
                    generation_id = %id,
                    provider = %provider,
                    text_len = full_text.len() as u64
                );
                callbacks.on_complete(full_text);
            }
            Err(err) if err.is_cancelled() => {
                info!(
                    event = "generation.cancelled",
                    domain = "generation",
                    generation_id = %id,
                    provider = %provider
                );
                callbacks.on_error(err);
            }
            Err(err) => {
                warn!(
                    event = "generation.failed",
                    domain = "generation",
                    generation_id = %id,
                    provider = %provider,
                    code = err.code(),
                    error = %err
                );
                callbacks.on_error(err);
            }
        }
    }

    /// Runs to the end and returns the whole answer.
    pub async fn collect_text(self) -> Result<String, StreamError> {
        let mut collector = TextCollector::new();
        self.run(&mut collector).await;
        // `run` always records an outcome before returning.
        collector.take_outcome().unwrap_or(Err(StreamError::Cancelled))
    }

    /// Runs on a new tokio task and returns a handle for consuming updates.
    pub fn spawn(self) -> SpawnedGeneration {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.id;
        let abort_handle = self.abort_handle();
        let task = tokio::spawn(async move {
            let mut tx = tx;
            self.run(&mut tx).await;
        });
        SpawnedGeneration {
            id,
            rx,
            abort_handle,
            task,
        }
    }
}

/// A generation running on its own task.
pub struct SpawnedGeneration {
    id: uuid::Uuid,
    rx: mpsc::UnboundedReceiver<StreamUpdate>,
    abort_handle: AbortHandle,
    task: tokio::task::JoinHandle<()>,
}

impl SpawnedGeneration {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next update. Returns `None` after the terminal update.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        self.rx.recv().await
    }

    /// Drains remaining updates and returns the terminal outcome.
    pub async fn finish(mut self) -> Result<String, StreamError> {
        let mut outcome = None;
        while let Some(update) = self.rx.recv().await {
            match update {
                StreamUpdate::Fragment(_) => {}
                StreamUpdate::Completed(text) => outcome = Some(Ok(text)),
                StreamUpdate::Failed(err) => outcome = Some(Err(err)),
            }
        }
        if let Err(err) = self.task.await {
            warn!(
                event = "generation.task_failed",
                domain = "generation",
                generation_id = %self.id,
                error = %err
            );
        }
        outcome.unwrap_or(Err(StreamError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::test_support::*;
    use crate::vendors::{ClaudeConfig, GeminiConfig};

    const HELLO: &[u8] = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\n";

    fn generator(transport: Arc<ScriptedTransport>, policy: RetryPolicy) -> Generator {
        Generator::builder()
            .provider(GeminiConfig::new("test-key"))
            .transport(transport)
            .retry_policy(policy)
            .build()
            .expect("build generator")
    }

    #[test]
    fn build_requires_a_valid_provider() {
        assert!(matches!(
            Generator::builder().build(),
            Err(SetupError::Config(msg)) if msg.contains("provider")
        ));
        assert!(matches!(
            Generator::builder().provider(ClaudeConfig::new("")).build(),
            Err(SetupError::Config(_))
        ));
        assert!(matches!(
            Generator::builder()
                .provider(ClaudeConfig::new("k"))
                .flush_interval(Duration::ZERO)
                .build(),
            Err(SetupError::Validation(_))
        ));
    }

    #[test]
    fn token_budget_defaults_to_provider_limit() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::new(Vec::new()));
        let claude = Generator::builder()
            .provider(ClaudeConfig::new("k"))
            .transport(transport.clone())
            .build()
            .expect("claude");
        let gemini = Generator::builder()
            .provider(GeminiConfig::new("k"))
            .transport(transport)
            .token_budget(1_000)
            .build()
            .expect("gemini");
        assert_eq!(claude.context_window().token_budget(), 200_000);
        assert_eq!(gemini.context_window().token_budget(), 1_000);
        assert_eq!(claude.provider(), ProviderKind::Claude);
    }

    #[test]
    fn empty_history_is_rejected() {
        let generator = generator(
            Arc::new(ScriptedTransport::new(Vec::new())),
            RetryPolicy::none(),
        );
        assert!(matches!(
            generator.start(&[]),
            Err(SetupError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn oversized_history_is_trimmed_before_the_request_is_built() {
        let transport = Arc::new(ScriptedTransport::new(vec![Script::Chunks(vec![ok(HELLO)])]));
        let generator = Generator::builder()
            .provider(GeminiConfig::new("k"))
            .transport(transport.clone())
            .token_budget(10)
            .build()
            .expect("build");
        let history = vec![
            Message::user("x".repeat(400)),
            Message::assistant("y".repeat(400)),
            Message::user("latest question"),
        ];

        let text = generator
            .start(&history)
            .expect("start")
            .collect_text()
            .await;

        assert_eq!(text.as_deref(), Ok("Hello"));
        let opened = transport.opened.lock().expect("lock");
        let contents = opened[0].body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"][0]["text"], "latest question");
    }

    #[test]
    fn history_without_a_user_turn_after_trimming_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let generator = Generator::builder()
            .provider(ClaudeConfig::new("k"))
            .transport(transport.clone())
            .token_budget(10)
            .build()
            .expect("build");
        let history = vec![
            Message::user("x".repeat(400)),
            Message::assistant("only the answer fits"),
        ];

        assert!(matches!(
            generator.start(&history),
            Err(SetupError::Validation(msg)) if msg.contains("no user message")
        ));
        assert!(matches!(
            generator.start(&[Message::system("rules only")]),
            Err(SetupError::Validation(_))
        ));
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test]
    async fn trimmed_history_is_sent_from_its_first_user_turn() {
        let transport = Arc::new(ScriptedTransport::new(vec![Script::Chunks(vec![ok(
            b"event: message_stop\ndata: {}\n\n",
        )])]));
        let generator = Generator::builder()
            .provider(ClaudeConfig::new("k"))
            .transport(transport.clone())
            .token_budget(20)
            .build()
            .expect("build");
        let history = vec![
            Message::user("x".repeat(400)),
            Message::assistant("short reply"),
            Message::user("follow-up"),
        ];

        let result = generator.start(&history).expect("start").collect_text().await;

        assert_eq!(result.as_deref(), Ok(""));
        let opened = transport.opened.lock().expect("lock");
        let messages = opened[0].body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "follow-up");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_then_completes_once() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Script::Fail(StreamError::status(ProviderKind::Gemini, 503, "unavailable")),
            Script::Chunks(vec![ok(HELLO)]),
        ]));
        let generation = generator(transport.clone(), RetryPolicy::default())
            .start(&[Message::user("hi")])
            .expect("start");
        let mut recorder = Recorder::default();

        generation.run(&mut recorder).await;

        assert_eq!(transport.open_count(), 2);
        assert_eq!(
            recorder.calls,
            vec![
                Call::Fragment("Hello".into()),
                Call::Complete("Hello".into())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_last_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Script::Fail(StreamError::status(ProviderKind::Gemini, 500, "first")),
            Script::Fail(StreamError::status(ProviderKind::Gemini, 502, "second")),
        ]));
        let generation = generator(transport.clone(), RetryPolicy::exponential(2, 10, 2.0))
            .start(&[Message::user("hi")])
            .expect("start");
        let mut recorder = Recorder::default();

        generation.run(&mut recorder).await;

        assert_eq!(transport.open_count(), 2);
        assert_eq!(
            recorder.terminal_calls(),
            vec![&Call::Error(StreamError::status(
                ProviderKind::Gemini,
                502,
                "second"
            ))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_stream_fires_only_on_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![Script::ChunksThenHang(vec![
            ok(HELLO),
        ])]));
        let mut spawned = generator(transport.clone(), RetryPolicy::default())
            .start(&[Message::user("hi")])
            .expect("start")
            .spawn();

        assert_eq!(
            spawned.next_update().await,
            Some(StreamUpdate::Fragment("Hello".into()))
        );
        spawned.abort_handle().abort();

        assert_eq!(
            spawned.next_update().await,
            Some(StreamUpdate::Failed(StreamError::Cancelled))
        );
        assert_eq!(spawned.next_update().await, None);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn abort_after_completion_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::new(vec![Script::Chunks(vec![ok(HELLO)])]));
        let generation = generator(transport, RetryPolicy::default())
            .start(&[Message::user("hi")])
            .expect("start");
        let handle = generation.abort_handle();
        let mut recorder = Recorder::default();

        generation.run(&mut recorder).await;
        handle.abort();
        handle.abort();

        assert_eq!(recorder.terminal_calls(), vec![&Call::Complete("Hello".into())]);
    }

    #[tokio::test]
    async fn abort_before_run_never_opens_a_call() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let generation = generator(transport.clone(), RetryPolicy::default())
            .start(&[Message::user("hi")])
            .expect("start");
        generation.abort_handle().abort();

        let result = generation.spawn().finish().await;

        assert_eq!(result, Err(StreamError::Cancelled));
        assert_eq!(transport.open_count(), 0);
    }
}
