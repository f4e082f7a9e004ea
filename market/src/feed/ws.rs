//! Tick stream client.
//!
//! Maintains one streaming connection to the tick source and exposes the
//! latest observed price per tracked instrument.
//!
//! Responsibilities:
//!   • authenticate, then subscribe to the universe in bounded batches
//!   • keep the latest price per instrument under a single lock
//!   • reconnect with a delay on any transport failure, forever
//!
//! The loop **never stops** unless the whole application is shut down.
//! Malformed frames are dropped without killing the connection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::config::StasisConfig;
use crate::feed::PriceSource;
use crate::feed::types::{FeedEvent, FeedEventKind, FeedFrame};

/// Connection-level health of the tick stream.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct FeedStatus {
    /// Instruments with at least one observed update.
    pub connected: usize,
    /// Instruments tracked.
    pub total: usize,
    /// Price-bearing messages accepted since startup.
    pub messages: u64,
}

#[derive(Default)]
struct PriceTable {
    prices: HashMap<String, f64>,
    messages: u64,
}

pub struct PriceFeed {
    cfg: Arc<StasisConfig>,
    tracked: HashSet<String>,
    table: Mutex<PriceTable>,
}

impl PriceFeed {
    pub fn new(cfg: Arc<StasisConfig>) -> Arc<Self> {
        let tracked = cfg.symbols.iter().cloned().collect();
        Arc::new(Self {
            cfg,
            tracked,
            table: Mutex::new(PriceTable::default()),
        })
    }

    /// Spawn the connection loop. Returns immediately.
    pub fn start(self: &Arc<Self>) {
        let feed = Arc::clone(self);
        tokio::spawn(async move { feed.run_ws_loop().await });
        info!("price feed starting");
    }

    /// Connect → authenticate → read until the transport drops, forever.
    async fn run_ws_loop(self: Arc<Self>) {
        loop {
            match connect_async(&self.cfg.ws_url).await {
                Ok((ws, _)) => {
                    info!(url = %self.cfg.ws_url, "tick stream connected, authenticating");
                    let (mut write, mut read) = ws.split();

                    let auth = serde_json::json!({
                        "action": "auth",
                        "params": self.cfg.api_key,
                    });

                    match write.send(Message::Text(auth.to_string().into())).await {
                        Err(e) => warn!(error = %e, "failed to send auth request"),
                        Ok(()) => {
                            while let Some(msg) = read.next().await {
                                let msg = match msg {
                                    Ok(m) => m,
                                    Err(e) => {
                                        warn!(error = %e, "tick stream read error");
                                        break;
                                    }
                                };

                                if !msg.is_text() {
                                    continue;
                                }
                                let Ok(raw) = msg.to_text() else { continue };
                                let Ok(frame) = serde_json::from_str::<FeedFrame>(raw) else {
                                    continue;
                                };

                                for event in frame.into_events() {
                                    self.handle_event(event, &mut write).await;
                                }
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "tick stream connection failed"),
            }

            warn!(
                delay_ms = self.cfg.reconnect_delay.as_millis() as u64,
                "reconnecting tick stream"
            );
            tokio::time::sleep(self.cfg.reconnect_delay).await;
        }
    }

    async fn handle_event(
        &self,
        event: FeedEvent,
        write: &mut (impl futures::Sink<Message, Error = tungstenite::Error> + Unpin),
    ) {
        match event.kind() {
            FeedEventKind::Status => {
                let status = event.status.as_deref().unwrap_or("");
                info!(
                    status,
                    message = event.message.as_deref().unwrap_or(""),
                    "stream status"
                );
                match status {
                    "auth_success" => {
                        if let Err(e) = self.subscribe_all(write).await {
                            warn!(error = %e, "subscription failed");
                        }
                    }
                    // Requires operator action; never retried with
                    // alternate credentials.
                    "auth_failed" => error!("stream authentication failed, check FEED_API_KEY"),
                    _ => {}
                }
            }
            FeedEventKind::Aggregate | FeedEventKind::Trade | FeedEventKind::Quote => {
                let (Some(sym), Some(price)) = (event.sym.as_deref(), event.price()) else {
                    return;
                };
                if !self.tracked.contains(sym) {
                    return;
                }
                let mut table = self.table.lock().await;
                table.prices.insert(sym.to_string(), price);
                table.messages += 1;
            }
            FeedEventKind::Other => {}
        }
    }

    /// Subscribe to aggregate events for the whole universe, paced in
    /// bounded batches so the upstream does not drop the connection.
    async fn subscribe_all(
        &self,
        write: &mut (impl futures::Sink<Message, Error = tungstenite::Error> + Unpin),
    ) -> anyhow::Result<()> {
        for batch in self.cfg.symbols.chunks(self.cfg.subscribe_batch) {
            let params = batch
                .iter()
                .map(|s| format!("A.{s}"))
                .collect::<Vec<_>>()
                .join(",");
            let req = serde_json::json!({
                "action": "subscribe",
                "params": params,
            });
            write.send(Message::Text(req.to_string().into())).await?;
            tokio::time::sleep(self.cfg.subscribe_pace).await;
        }
        info!(symbols = self.cfg.symbols.len(), "subscribed to tick stream");
        Ok(())
    }
}

#[async_trait]
impl PriceSource for PriceFeed {
    async fn latest_prices(&self) -> HashMap<String, f64> {
        self.table.lock().await.prices.clone()
    }

    async fn status(&self) -> FeedStatus {
        let table = self.table.lock().await;
        FeedStatus {
            connected: table.prices.len(),
            total: self.tracked.len(),
            messages: table.messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::sink;

    fn test_cfg() -> Arc<StasisConfig> {
        let mut cfg = StasisConfig::from_env();
        cfg.subscribe_pace = std::time::Duration::ZERO;
        Arc::new(cfg)
    }

    /// A sink that records every outgoing message.
    fn drain_sink(
        sent: Arc<std::sync::Mutex<Vec<String>>>,
    ) -> impl futures::Sink<Message, Error = tungstenite::Error> + Unpin {
        Box::pin(sink::unfold((), move |(), msg: Message| {
            let sent = Arc::clone(&sent);
            async move {
                if let Message::Text(text) = msg {
                    sent.lock().unwrap().push(text.to_string());
                }
                Ok::<(), tungstenite::Error>(())
            }
        }))
    }

    #[tokio::test]
    async fn tracked_price_updates_are_stored_and_counted() {
        let feed = PriceFeed::new(test_cfg());
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut write = drain_sink(Arc::clone(&sent));

        let event: FeedEvent =
            serde_json::from_str(r#"{"ev":"A","sym":"SPY","c":512.25}"#).unwrap();
        feed.handle_event(event, &mut write).await;

        let prices = feed.latest_prices().await;
        assert_eq!(prices.get("SPY"), Some(&512.25));

        let status = feed.status().await;
        assert_eq!(status.connected, 1);
        assert_eq!(status.messages, 1);
    }

    #[tokio::test]
    async fn untracked_instruments_are_dropped() {
        let feed = PriceFeed::new(test_cfg());
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut write = drain_sink(Arc::clone(&sent));

        let event: FeedEvent =
            serde_json::from_str(r#"{"ev":"T","sym":"ZZZT","p":1.0}"#).unwrap();
        feed.handle_event(event, &mut write).await;

        assert!(feed.latest_prices().await.is_empty());
        assert_eq!(feed.status().await.messages, 0);
    }

    #[tokio::test]
    async fn auth_success_triggers_batched_subscriptions() {
        let feed = PriceFeed::new(test_cfg());
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut write = drain_sink(Arc::clone(&sent));

        let event: FeedEvent =
            serde_json::from_str(r#"{"ev":"status","status":"auth_success"}"#).unwrap();
        feed.handle_event(event, &mut write).await;

        let sent = sent.lock().unwrap();
        let total_symbols = feed.cfg.symbols.len();
        let batch = feed.cfg.subscribe_batch;
        assert_eq!(sent.len(), total_symbols.div_ceil(batch));
        assert!(sent[0].contains("\"action\":\"subscribe\""));
        assert!(sent[0].contains("A.SPY"));
    }
}
