use serde::Deserialize;

/// One frame from the tick stream: a single event or a batch of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedFrame {
    Batch(Vec<FeedEvent>),
    Single(FeedEvent),
}

impl FeedFrame {
    pub fn into_events(self) -> Vec<FeedEvent> {
        match self {
            FeedFrame::Batch(events) => events,
            FeedFrame::Single(event) => vec![event],
        }
    }
}

/// Raw upstream event.
///
/// Only the fields the feed cares about are mapped; everything else in the
/// frame is ignored. The instrument id arrives under either of two keys
/// depending on event kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedEvent {
    /// Event-kind discriminator.
    pub ev: Option<String>,

    /// Status code on `status` frames (`auth_success`, `auth_failed`, ...).
    pub status: Option<String>,

    /// Human-readable detail on `status` frames.
    pub message: Option<String>,

    #[serde(alias = "S")]
    pub sym: Option<String>,

    /// Aggregate close.
    pub c: Option<f64>,

    /// Volume-weighted price.
    pub vw: Option<f64>,

    /// Last trade price.
    pub p: Option<f64>,

    /// Bid price.
    pub bp: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEventKind {
    Status,
    Aggregate,
    Trade,
    Quote,
    Other,
}

impl FeedEvent {
    pub fn kind(&self) -> FeedEventKind {
        match self.ev.as_deref() {
            Some("status") => FeedEventKind::Status,
            Some("A") | Some("AM") => FeedEventKind::Aggregate,
            Some("T") => FeedEventKind::Trade,
            Some("Q") => FeedEventKind::Quote,
            _ => FeedEventKind::Other,
        }
    }

    /// Best available price for a price-bearing event: aggregate close,
    /// then volume-weighted price, then last trade, then bid.
    pub fn price(&self) -> Option<f64> {
        self.c.or(self.vw).or(self.p).or(self.bp)
    }
}
