//! In-process price feed.
//!
//! [`LocalFeed`] is fed by whoever owns the real ticks (a replay file, a
//! test, an embedding application) via [`LocalFeed::publish`] and forwards
//! only the subscribed instruments to its [`TickReceiver`].

use ahash::AHashSet;
use anyhow::Result;
use async_trait::async_trait;
use lw_core::types::{InstrumentToken, Tick};
use parking_lot::Mutex;
use tracing::debug;

use crate::{PriceFeed, TickReceiver, TickSender};

pub struct LocalFeed {
    name: String,
    subscribed: Mutex<AHashSet<InstrumentToken>>,
    tx: TickSender,
}

impl LocalFeed {
    /// Create a feed and the receiver its subscribed ticks are delivered to.
    pub fn new(name: impl Into<String>) -> (Self, TickReceiver) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let feed = Self { name: name.into(), subscribed: Mutex::new(AHashSet::new()), tx };
        (feed, rx)
    }

    /// Offer a tick to the feed.
    ///
    /// Returns `true` if the tick was forwarded, `false` if its instrument is
    /// not subscribed or the receiver has been dropped.
    pub fn publish(&self, tick: Tick) -> bool {
        if !self.subscribed.lock().contains(&tick.instrument_token) {
            return false;
        }
        self.tx.send(tick).is_ok()
    }

    /// Currently subscribed tokens, sorted.
    pub fn subscribed(&self) -> Vec<InstrumentToken> {
        let mut tokens: Vec<_> = self.subscribed.lock().iter().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn is_subscribed(&self, token: InstrumentToken) -> bool {
        self.subscribed.lock().contains(&token)
    }
}

#[async_trait]
impl PriceFeed for LocalFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self, tokens: &[InstrumentToken]) -> Result<()> {
        self.subscribed.lock().extend(tokens.iter().copied());
        debug!("[{}] subscribed {:?}", self.name, tokens);
        Ok(())
    }

    async fn unsubscribe(&self, tokens: &[InstrumentToken]) -> Result<()> {
        let mut subscribed = self.subscribed.lock();
        for token in tokens {
            subscribed.remove(token);
        }
        debug!("[{}] unsubscribed {:?}", self.name, tokens);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_only_subscribed_tokens() {
        let (feed, mut rx) = LocalFeed::new("test");
        feed.subscribe(&[1, 2]).await.unwrap();

        assert!(feed.publish(Tick::new(1, 10.0, 1)));
        assert!(!feed.publish(Tick::new(3, 30.0, 1)));
        assert_eq!(rx.recv().await.unwrap().instrument_token, 1);
        assert!(rx.try_recv().is_err());

        feed.unsubscribe(&[1]).await.unwrap();
        assert!(!feed.publish(Tick::new(1, 11.0, 2)));
        assert_eq!(feed.subscribed(), vec![2]);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let (feed, _rx) = LocalFeed::new("test");
        feed.subscribe(&[5, 5]).await.unwrap();
        feed.subscribe(&[5]).await.unwrap();
        feed.unsubscribe(&[9]).await.unwrap();
        assert_eq!(feed.subscribed(), vec![5]);
        assert!(feed.is_subscribed(5));
    }

    #[tokio::test]
    async fn publish_after_receiver_dropped() {
        let (feed, rx) = LocalFeed::new("test");
        feed.subscribe(&[1]).await.unwrap();
        drop(rx);
        assert!(!feed.publish(Tick::new(1, 1.0, 1)));
    }
}
