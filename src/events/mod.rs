//! Process-wide broadcast of lifecycle events.
//!
//! Every connected client receives every event. Events are signals to refetch
//! the relevant listing, not authoritative deltas: a payload carries just
//! enough for a client to decide which fetch to repeat. Delivery is best
//! effort; a disconnected or lagging client misses events and reconciles on
//! its next explicit fetch.

use serde::Serialize;
use tokio::sync::broadcast;

/// A lifecycle event as it is sent to connected clients, serialized as a
/// single JSON object with a `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    NewSubmission,
    TemplateCreated,
    StatusUpdated {
        #[serde(rename = "submissionId")]
        submission_id: String,
        status: String,
    },
    SubmissionDeleted {
        id: String,
    },
}

/// Fan-out handle stored in `AppState`. Cloning is cheap; all clones feed the
/// same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Fire-and-forget: having no
    /// subscribers is not an error and never fails the originating request.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No event subscribers connected: {}", e);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = Event::NewSubmission;
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"new-submission"}"#
        );

        let event = Event::TemplateCreated;
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"template-created"}"#
        );

        let event = Event::StatusUpdated {
            submission_id: "abc".to_string(),
            status: "Approved".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"status-updated","submissionId":"abc","status":"Approved"}"#
        );

        let event = Event::SubmissionDeleted {
            id: "abc".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"submission-deleted","id":"abc"}"#
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(8);
        bus.publish(Event::NewSubmission);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_every_event() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::TemplateCreated);
        bus.publish(Event::SubmissionDeleted {
            id: "s1".to_string(),
        });

        assert_eq!(rx1.recv().await.unwrap(), Event::TemplateCreated);
        assert_eq!(rx2.recv().await.unwrap(), Event::TemplateCreated);
        assert_eq!(
            rx1.recv().await.unwrap(),
            Event::SubmissionDeleted {
                id: "s1".to_string()
            }
        );
        assert_eq!(
            rx2.recv().await.unwrap(),
            Event::SubmissionDeleted {
                id: "s1".to_string()
            }
        );
    }
}
