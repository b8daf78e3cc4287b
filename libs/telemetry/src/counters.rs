use metrics::counter;
use tracing::Span;

const DELIVERIES_COUNTER: &str = "linkbot_webhook_deliveries_total";
const EVENTS_COUNTER: &str = "linkbot_events_total";
const REPLIES_COUNTER: &str = "linkbot_replies_total";
const UPSTREAM_FAILURES_COUNTER: &str = "linkbot_upstream_failures_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Delivered,
    Failed,
}

impl ReplyOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ReplyOutcome::Delivered => "delivered",
            ReplyOutcome::Failed => "failed",
        }
    }
}

/// Counts one webhook delivery by how it was answered (`accepted`, `invalid_signature`, ...).
pub fn record_delivery(outcome: &'static str) {
    counter!(DELIVERIES_COUNTER, "outcome" => outcome).increment(1);
}

pub fn record_event(kind: &'static str) {
    counter!(EVENTS_COUNTER, "kind" => kind).increment(1);
}

pub fn record_reply(outcome: ReplyOutcome) {
    counter!(REPLIES_COUNTER, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_upstream_failure(operation: &'static str) {
    counter!(UPSTREAM_FAILURES_COUNTER, "operation" => operation).increment(1);
}

/// Span wrapping the handling of one webhook delivery.
pub fn start_delivery_span(request_id: &str, destination: Option<&str>, events: usize) -> Span {
    tracing::info_span!(
        "webhook.delivery",
        request_id = %request_id,
        destination = %destination.unwrap_or(""),
        events
    )
}
