//! Pub/sub fan-out bridge.
//!
//! Every process runs one copy of this loop. It subscribes to the shared
//! broker topic, resolves each envelope's delivery filter against the
//! room's current membership, and pushes the event into the local
//! registry. Members whose sockets live on other processes are simply
//! not registered here; their own process delivers to them.

use std::sync::Arc;

use futures::StreamExt;

use crate::domain::foundation::GameError;
use crate::domain::game::Envelope;
use crate::ports::{EventSubscriber, GameStore, MessageSender, GAME_TOPIC};

/// Bridges broker envelopes into the local connection registry.
pub struct FanoutBridge {
    store: Arc<dyn GameStore>,
    subscriber: Arc<dyn EventSubscriber>,
    sender: Arc<dyn MessageSender>,
}

impl FanoutBridge {
    pub fn new(
        store: Arc<dyn GameStore>,
        subscriber: Arc<dyn EventSubscriber>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            store,
            subscriber,
            sender,
        }
    }

    /// Consumes the broker stream until it ends.
    ///
    /// A malformed message or a vanished game skips that envelope; only a
    /// failed subscription or a closed stream ends the loop.
    pub async fn run(&self) -> Result<(), GameError> {
        let mut stream = self.subscriber.subscribe(GAME_TOPIC).await?;
        tracing::info!(topic = GAME_TOPIC, "fan-out bridge subscribed");

        while let Some(raw) = stream.next().await {
            if let Err(err) = self.dispatch(&raw).await {
                tracing::warn!(error = %err, "failed to fan out envelope");
            }
        }

        tracing::warn!("broker stream closed, fan-out bridge stopping");
        Ok(())
    }

    async fn dispatch(&self, raw: &str) -> Result<(), GameError> {
        let envelope: Envelope = serde_json::from_str(raw)?;

        let members = match self.store.get_game(&envelope.room_id).await {
            Ok(game) => game.user_ids(),
            // The game is purged at finish, before its last envelopes are
            // consumed here. Those envelopes carry their membership in the
            // include list; anything without one is undeliverable.
            Err(err) if err.is_not_found() => {
                if envelope.include_users.is_empty() {
                    tracing::debug!(room_id = %envelope.room_id, "envelope for vanished game");
                    return Ok(());
                }
                envelope.include_users.clone()
            }
            Err(err) => return Err(err),
        };

        let targets = envelope.targets(&members);
        if targets.is_empty() {
            return Ok(());
        }
        self.sender.broadcast(&targets, envelope.payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryEventBus, MemoryGameStore};
    use crate::domain::foundation::{RoomId, UserId};
    use crate::domain::game::{Game, GameEvent, User};
    use crate::domain::room::{Room, RoomStatus};
    use crate::ports::EventPublisher;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sender that records every (target, event) pair.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(UserId, GameEvent)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, to: &UserId, event: GameEvent) -> Result<(), GameError> {
            self.sent.lock().unwrap().push((to.clone(), event));
            Ok(())
        }

        async fn broadcast(&self, ids: &[UserId], event: GameEvent) -> Result<(), GameError> {
            for id in ids {
                self.sent.lock().unwrap().push((id.clone(), event.clone()));
            }
            Ok(())
        }
    }

    async fn seed_game(store: &MemoryGameStore, members: &[&str]) {
        let room = Room {
            id: RoomId::new("r1"),
            owner_id: UserId::new(members[0]),
            name: "room".into(),
            min_user_num: 2,
            max_user_num: 8,
            status: RoomStatus::Pending,
        };
        let mut game = Game::from_room(room);
        for m in members {
            game.add_user(User::new(UserId::new(*m), *m)).unwrap();
        }
        store.put_game(&game).await.unwrap();
    }

    fn typing_envelope(exclude: &[&str]) -> Envelope {
        Envelope::except_users(
            RoomId::new("r1"),
            GameEvent::TypingKey(crate::domain::game::TypingPayload {
                user_id: UserId::new("a"),
                input_seq: "he".into(),
            }),
            exclude.iter().map(|n| UserId::new(*n)).collect(),
        )
    }

    #[tokio::test]
    async fn fans_out_to_members_minus_excluded() {
        let store = Arc::new(MemoryGameStore::new());
        seed_game(&store, &["a", "b", "c"]).await;
        let bus = Arc::new(MemoryEventBus::default());
        let sender = Arc::new(RecordingSender::default());

        let bridge = FanoutBridge::new(store, bus.clone(), sender.clone());
        let handle = tokio::spawn(async move { bridge.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(GAME_TOPIC, &typing_envelope(&["a"])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sent = sender.sent.lock().unwrap();
        let mut targets: Vec<&str> = sent.iter().map(|(id, _)| id.as_str()).collect();
        targets.sort_unstable();
        assert_eq!(targets, vec!["b", "c"]);
        drop(sent);
        handle.abort();
    }

    #[tokio::test]
    async fn final_result_reaches_members_after_the_game_is_purged() {
        let store = Arc::new(MemoryGameStore::new());
        seed_game(&store, &["a", "b"]).await;
        let bus = Arc::new(MemoryEventBus::default());
        let sender = Arc::new(RecordingSender::default());

        let bridge = FanoutBridge::new(store.clone(), bus.clone(), sender.clone());
        let handle = tokio::spawn(async move { bridge.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Finalization publishes with explicit membership, then purges.
        let envelope = Envelope::to_users(
            RoomId::new("r1"),
            GameEvent::Result(Vec::new()),
            vec![UserId::new("a"), UserId::new("b")],
        );
        store.delete_game(&RoomId::new("r1")).await.unwrap();
        bus.publish(GAME_TOPIC, &envelope).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sent = sender.sent.lock().unwrap();
        let mut targets: Vec<&str> = sent.iter().map(|(id, _)| id.as_str()).collect();
        targets.sort_unstable();
        assert_eq!(targets, vec!["a", "b"]);
        assert!(sent.iter().all(|(_, e)| matches!(e, GameEvent::Result(_))));
        drop(sent);
        handle.abort();
    }

    #[tokio::test]
    async fn envelope_for_unknown_game_is_skipped() {
        let store = Arc::new(MemoryGameStore::new());
        let bus = Arc::new(MemoryEventBus::default());
        let sender = Arc::new(RecordingSender::default());

        let bridge = FanoutBridge::new(store, bus.clone(), sender.clone());
        let handle = tokio::spawn(async move { bridge.run().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(GAME_TOPIC, &typing_envelope(&[])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(sender.sent.lock().unwrap().is_empty());
        handle.abort();
    }
}
