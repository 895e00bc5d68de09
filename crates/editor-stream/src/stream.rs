use tokio::sync::mpsc;

use crate::coordinator::StreamCallbacks;
use crate::errors::StreamError;

/// Generation output as a sequence of messages, for consumers that prefer a
/// channel over callbacks.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamUpdate {
    /// A batch of newly generated text.
    Fragment(String),
    /// Terminal success with the whole answer.
    Completed(String),
    /// Terminal failure (or cancellation).
    Failed(StreamError),
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment(_))
    }
}

/// Forwards every callback as a [`StreamUpdate`]. A closed receiver is
/// ignored; the generation still runs to its end.
impl StreamCallbacks for mpsc::UnboundedSender<StreamUpdate> {
    fn on_fragment(&mut self, text: &str) {
        let _ = self.send(StreamUpdate::Fragment(text.to_string()));
    }

    fn on_complete(&mut self, full_text: String) {
        let _ = self.send(StreamUpdate::Completed(full_text));
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.send(StreamUpdate::Failed(error));
    }
}

/// Sink that keeps the streamed text and the terminal outcome.
#[derive(Debug, Default)]
pub struct TextCollector {
    streamed: String,
    fragments: usize,
    outcome: Option<Result<String, StreamError>>,
}

impl TextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received through `on_fragment`, including text from failed
    /// attempts that were retried.
    pub fn streamed(&self) -> &str {
        &self.streamed
    }

    /// Number of `on_fragment` calls received.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// The terminal outcome, once the generation has ended.
    pub fn outcome(&self) -> Option<&Result<String, StreamError>> {
        self.outcome.as_ref()
    }

    pub fn take_outcome(&mut self) -> Option<Result<String, StreamError>> {
        self.outcome.take()
    }
}

impl StreamCallbacks for TextCollector {
    fn on_fragment(&mut self, text: &str) {
        self.fragments += 1;
        self.streamed.push_str(text);
    }

    fn on_complete(&mut self, full_text: String) {
        self.outcome = Some(Ok(full_text));
    }

    fn on_error(&mut self, error: StreamError) {
        self.outcome = Some(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_forwards_callbacks_in_order() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.on_fragment("He");
        tx.on_fragment("llo");
        tx.on_complete("Hello".into());

        assert_eq!(rx.try_recv().ok(), Some(StreamUpdate::Fragment("He".into())));
        assert_eq!(rx.try_recv().ok(), Some(StreamUpdate::Fragment("llo".into())));
        let last = rx.try_recv().expect("terminal update");
        assert!(last.is_terminal());
        assert_eq!(last, StreamUpdate::Completed("Hello".into()));
    }

    #[test]
    fn sender_ignores_closed_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel::<StreamUpdate>();
        drop(rx);
        tx.on_fragment("lost");
        tx.on_error(StreamError::Cancelled);
    }

    #[test]
    fn collector_keeps_streamed_text_and_outcome() {
        let mut collector = TextCollector::new();
        collector.on_fragment("par");
        collector.on_fragment("tial");
        collector.on_error(StreamError::Cancelled);

        assert_eq!(collector.streamed(), "partial");
        assert_eq!(collector.fragments(), 2);
        assert_eq!(collector.take_outcome(), Some(Err(StreamError::Cancelled)));
        assert!(collector.outcome().is_none());
    }
}
