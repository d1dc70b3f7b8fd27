// src/services/subscriptions.rs

//! Subscriber registry.
//!
//! One task owns the subscriber set and its file. Command handlers and the
//! poll loop talk to it through a [`SubscriberHandle`], so the file only ever
//! has a single writer.

use std::collections::BTreeSet;
use std::sync::Arc;

use teloxide::utils::command::BotCommands;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::storage::StateStore;

/// Chat commands that register the sender as a subscriber.
#[derive(BotCommands, Debug, Clone, Copy, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "SAGA Monitor commands:")]
pub enum SubscriberCommand {
    #[command(description = "subscribe to new offers")]
    Start,
    #[command(description = "subscribe to new offers")]
    Subscribe,
}

/// Acknowledgement for a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeAck {
    Added,
    AlreadySubscribed,
}

enum Request {
    Subscribe {
        id: String,
        reply: oneshot::Sender<Result<SubscribeAck>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Owner of the subscriber set.
pub struct SubscriberRegistry {
    subscribers: BTreeSet<String>,
    store: Arc<dyn StateStore>,
    requests: mpsc::Receiver<Request>,
}

impl SubscriberRegistry {
    /// Load the persisted subscribers and spawn the owner task.
    pub async fn spawn(store: Arc<dyn StateStore>) -> Result<SubscriberHandle> {
        let subscribers = store.load_subscribers().await?;
        log::info!("Loaded {} subscriber(s)", subscribers.len());

        let (tx, rx) = mpsc::channel(32);
        let registry = Self {
            subscribers,
            store,
            requests: rx,
        };
        tokio::spawn(registry.run());

        Ok(SubscriberHandle { requests: tx })
    }

    async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            match request {
                Request::Subscribe { id, reply } => {
                    let result = self.subscribe(id).await;
                    let _ = reply.send(result);
                }
                Request::Snapshot { reply } => {
                    let _ = reply.send(self.subscribers.iter().cloned().collect());
                }
            }
        }
        log::debug!("Subscriber registry stopped");
    }

    async fn subscribe(&mut self, id: String) -> Result<SubscribeAck> {
        if self.subscribers.contains(&id) {
            return Ok(SubscribeAck::AlreadySubscribed);
        }
        self.store.append_subscriber(&id).await?;
        log::info!("New subscriber {id}");
        self.subscribers.insert(id);
        Ok(SubscribeAck::Added)
    }
}

/// Cloneable client of the [`SubscriberRegistry`].
#[derive(Clone)]
pub struct SubscriberHandle {
    requests: mpsc::Sender<Request>,
}

impl SubscriberHandle {
    /// Register a recipient. Re-subscribing is a no-op.
    pub async fn subscribe(&self, id: impl Into<String>) -> Result<SubscribeAck> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(AppError::validation("subscriber id is empty"));
        }

        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Subscribe { id, reply })
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())?
    }

    /// Current subscribers in sorted order.
    pub async fn snapshot(&self) -> Result<Vec<String>> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Snapshot { reply })
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }
}

fn closed() -> AppError {
    AppError::config("subscriber registry closed")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::storage::LocalStorage;

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::new(tmp.path()));
        let handle = SubscriberRegistry::spawn(store.clone()).await.unwrap();

        assert_eq!(handle.subscribe("200").await.unwrap(), SubscribeAck::Added);
        assert_eq!(handle.subscribe("100").await.unwrap(), SubscribeAck::Added);
        assert_eq!(
            handle.subscribe(" 200 ").await.unwrap(),
            SubscribeAck::AlreadySubscribed
        );

        assert_eq!(handle.snapshot().await.unwrap(), vec!["100", "200"]);

        let persisted = std::fs::read_to_string(tmp.path().join("subscribers.txt")).unwrap();
        assert_eq!(persisted, "200\n100\n");
    }

    #[tokio::test]
    async fn test_loads_existing_subscribers() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("subscribers.txt"), "aaa\n\nbbb\naaa\n").unwrap();
        let store = Arc::new(LocalStorage::new(tmp.path()));

        let handle = SubscriberRegistry::spawn(store).await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap(), vec!["aaa", "bbb"]);
        assert_eq!(
            handle.subscribe("bbb").await.unwrap(),
            SubscribeAck::AlreadySubscribed
        );
    }

    #[test]
    fn test_subscriber_commands() {
        assert_eq!(
            SubscriberCommand::parse("/start", "saga_bot").unwrap(),
            SubscriberCommand::Start
        );
        assert_eq!(
            SubscriberCommand::parse("/subscribe@saga_bot", "saga_bot").unwrap(),
            SubscriberCommand::Subscribe
        );
        assert!(SubscriberCommand::parse("/help", "saga_bot").is_err());
        assert!(SubscriberCommand::parse("/subscribe@other_bot", "saga_bot").is_err());
        assert!(SubscriberCommand::parse("hallo", "saga_bot").is_err());
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let tmp = TempDir::new().unwrap();
        let handle = SubscriberRegistry::spawn(Arc::new(LocalStorage::new(tmp.path())))
            .await
            .unwrap();
        assert!(handle.subscribe("  ").await.is_err());
    }
}
