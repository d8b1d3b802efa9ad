//! Configuration for the chat client.

/// Configuration for a conversation session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the messaging REST API.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Page size for message fetches.
    pub page_limit: u32,
    /// Background poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Typing debounce window in milliseconds.
    pub typing_debounce_ms: u64,
    /// Grace added after the breaker's reset ETA before resuming polls.
    pub resume_grace_ms: u64,
    /// Image attachment ceiling in bytes.
    pub max_image_bytes: u64,
    /// Document attachment ceiling in bytes.
    pub max_document_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 30_000,
            page_limit: 50,
            poll_interval_ms: 5_000,
            typing_debounce_ms: 2_000,
            resume_grace_ms: 1_000,
            max_image_bytes: 10 * 1024 * 1024,
            max_document_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_typing_debounce_ms(mut self, ms: u64) -> Self {
        self.typing_debounce_ms = ms;
        self
    }
}
