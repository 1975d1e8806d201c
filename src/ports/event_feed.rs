//! EventFeed port - Paged access to the provider's recent events.
//!
//! The reconciler replays recent provider events through the ingestion
//! pipeline to close gaps left by missed or delayed webhook deliveries.
//! This port wraps the provider's event-list API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;
use crate::domain::payments::StripeEvent;

/// Filter for one page of the provider's event listing.
#[derive(Debug, Clone)]
pub struct EventListRequest {
    /// Page size, 1..=100.
    pub limit: u32,

    /// Only events created after this instant.
    pub created_after: DateTime<Utc>,

    /// Provider-side cursor: return events after this event id.
    pub starting_after: Option<String>,

    /// Event type strings to include.
    pub types: Vec<String>,
}

/// One page of provider events.
#[derive(Debug, Clone)]
pub struct EventPage {
    /// Events in provider order.
    pub events: Vec<StripeEvent>,

    /// Whether the provider holds more events past this page.
    pub has_more: bool,
}

/// Port for listing recent provider events.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Fetches one page of events matching the request.
    async fn list_events(&self, request: &EventListRequest) -> Result<EventPage, DomainError>;
}
