//! Domain event publishing over NATS.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::events::DomainEvent;

#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a> {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: &'a DomainEvent,
}

impl<'a> EventEnvelope<'a> {
    pub fn new(event: &'a DomainEvent) -> Self {
        Self { event_id: Uuid::now_v7(), occurred_at: Utc::now(), event }
    }
}

/// Publishes events when a NATS client is configured; otherwise only logs them.
/// Delivery is best effort and never fails the caller.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.nats else {
            debug!(subject = event.subject(), order_id = event.order_id(), "event not published, NATS disabled");
            return;
        };
        let payload = match serde_json::to_vec(&EventEnvelope::new(event)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject = event.subject(), error = %e, "failed to encode event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            warn!(subject = event.subject(), order_id = event.order_id(), error = %e, "failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events {
            self.publish(event).await;
        }
    }
}
