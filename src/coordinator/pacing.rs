use std::collections::VecDeque;

/// Number of queued fragments joined into one displayed message.
const DISPLAY_BATCH: usize = 3;

/// Paces agent text so it does not outrun the avatar's spoken playback.
///
/// Inbound fragments queue in arrival order. While nothing is animating and a
/// media stream is live, up to [`DISPLAY_BATCH`] fragments are dequeued and
/// concatenated as the displayed message; the next batch waits for the
/// display-complete signal.
#[derive(Debug)]
pub struct DisplayPacer {
    queue: VecDeque<String>,
    displayed: Option<String>,
    animating: bool,
    batch: usize,
}

impl DisplayPacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            displayed: None,
            animating: false,
            batch: DISPLAY_BATCH,
        }
    }

    pub fn push_fragment(&mut self, fragment: impl Into<String>) {
        self.queue.push_back(fragment.into());
    }

    /// Move the next batch into the displayed slot. Returns the new displayed
    /// message, or None when blocked (animating, no live stream, or empty
    /// queue).
    pub fn advance(&mut self, stream_active: bool) -> Option<String> {
        if self.animating || !stream_active || self.queue.is_empty() {
            return None;
        }

        let take = self.batch.min(self.queue.len());
        let text: String = self.queue.drain(..take).collect();
        self.displayed = Some(text.clone());
        self.animating = true;
        Some(text)
    }

    /// The render layer finished animating the displayed message.
    pub fn display_complete(&mut self) {
        self.animating = false;
    }

    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for DisplayPacer {
    fn default() -> Self {
        Self::new()
    }
}
