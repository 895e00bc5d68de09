use std::time::Duration;

use tokio::time::Instant;

/// Default interval between consumer notifications.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Coalesces text fragments so the consumer is notified at most once per
/// `flush_interval`.
///
/// The batcher does not own a task. The read loop waits on [`deadline`]
/// alongside the transport and calls [`on_timer`] when it passes.
///
/// [`deadline`]: OutputBatcher::deadline
/// [`on_timer`]: OutputBatcher::on_timer
#[derive(Debug)]
pub struct OutputBatcher {
    pending: String,
    deadline: Option<Instant>,
    flush_interval: Duration,
}

impl Default for OutputBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}

impl OutputBatcher {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            pending: String::new(),
            deadline: None,
            flush_interval,
        }
    }

    /// Buffers `text` and arms the timer if it is not armed yet.
    pub fn add(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.pending.push_str(text);
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.flush_interval);
        }
    }

    /// When the armed timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Timer fired: disarms and returns the buffered text, if any.
    pub fn on_timer(&mut self) -> Option<String> {
        self.deadline = None;
        self.take_pending()
    }

    /// Fires the timer only if its deadline is at or before `now`.
    pub fn flush_due(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.on_timer(),
            _ => None,
        }
    }

    /// Session end: cancels the timer and returns everything still buffered.
    pub fn finish(&mut self) -> Option<String> {
        self.deadline = None;
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
