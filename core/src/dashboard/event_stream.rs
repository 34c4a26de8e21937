// Event streaming for Dashboard
//
// Uses tokio broadcast channel to stream crawl progress to multiple SSE clients

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Crawl progress event sent to Dashboard clients
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlEvent {
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    /// Event type
    pub event_type: CrawlEventType,
    /// Service URL the event concerns
    pub url: Option<String>,
    /// Portal item the event concerns
    pub item_id: Option<String>,
    /// Related items of `url` after the change
    pub related_count: Option<usize>,
    /// Distinct services known when the event was emitted
    pub service_count: usize,
    /// Human-readable detail
    pub message: Option<String>,
}

impl CrawlEvent {
    pub fn new(event_type: CrawlEventType, service_count: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event_type,
            url: None,
            item_id: None,
            related_count: None,
            service_count,
            message: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_related_count(mut self, count: usize) -> Self {
        self.related_count = Some(count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlEventType {
    /// New service URL discovered
    ServiceAdded,
    /// Known service URL gained a related item
    RelatedItemAdded,
    /// A search page and all of its inspections settled
    PageInspected,
    /// An item branch failed and was skipped
    BranchFailed,
    /// Both queries finished
    CrawlCompleted,
}

/// Event broadcaster for Dashboard
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<CrawlEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event: CrawlEvent) {
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000) // Buffer last 1000 events
    }
}
