//! End-to-end game flow over the in-memory adapters.
//!
//! Exercises the rules engine exactly as the WebSocket sessions would,
//! with stub relational repositories and a recording message sender.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::{sleep, timeout};

use typeclash::adapters::memory::{MemoryEventBus, MemoryGameStore};
use typeclash::application::GameManager;
use typeclash::config::GameConfig;
use typeclash::domain::foundation::{GameError, RoomId, UserId};
use typeclash::domain::game::{
    DifficultyCause, Envelope, FinishCause, Game, GameEvent, Sequence, SequenceKind, User,
    INITIAL_LIFE,
};
use typeclash::domain::room::{Problem, Room, RoomStatus};
use typeclash::ports::{
    EditFn, EventSubscriber, GameStore, MessageSender, MessageStream, ProblemRepository,
    RoomRepository, GAME_TOPIC,
};

struct StubRooms {
    rooms: Mutex<HashMap<RoomId, Room>>,
}

impl StubRooms {
    fn with_room(room: Room) -> Arc<Self> {
        let mut rooms = HashMap::new();
        rooms.insert(room.id.clone(), room);
        Arc::new(Self {
            rooms: Mutex::new(rooms),
        })
    }

    fn status_of(&self, id: &RoomId) -> RoomStatus {
        self.rooms.lock().unwrap()[id].status
    }
}

#[async_trait]
impl RoomRepository for StubRooms {
    async fn get_room_by_id(&self, id: &RoomId) -> Result<Room, GameError> {
        self.rooms
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::RoomNotFound(id.clone()))
    }

    async fn create_room(&self, room: &Room) -> Result<RoomId, GameError> {
        self.rooms
            .lock()
            .unwrap()
            .insert(room.id.clone(), room.clone());
        Ok(room.id.clone())
    }

    async fn matching(&self) -> Result<Option<RoomId>, GameError> {
        Ok(self
            .rooms
            .lock()
            .unwrap()
            .values()
            .find(|r| r.status == RoomStatus::Pending)
            .map(|r| r.id.clone()))
    }

    async fn update_status(&self, id: &RoomId, status: RoomStatus) -> Result<(), GameError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(id)
            .ok_or_else(|| GameError::RoomNotFound(id.clone()))?;
        room.status = status;
        Ok(())
    }
}

/// Deterministic problems: one per requested slot at the requested level.
struct StubProblems;

#[async_trait]
impl ProblemRepository for StubProblems {
    async fn get_problems(&self, level: u8, limit: u32) -> Result<Vec<Problem>, GameError> {
        Ok((0..limit)
            .map(|i| Problem {
                id: i as i32,
                text: format!("sequence {level} {i}"),
                level,
            })
            .collect())
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(UserId, GameEvent)>>,
}

impl RecordingSender {
    fn events_for(&self, user: &str) -> Vec<GameEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == user)
            .map(|(_, e)| e.clone())
            .collect()
    }
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

struct Harness {
    store: Arc<MemoryGameStore>,
    rooms: Arc<StubRooms>,
    sender: Arc<RecordingSender>,
    manager: Arc<GameManager>,
    envelopes: MessageStream,
}

impl Harness {
    async fn new(room: Room) -> Self {
        let store = Arc::new(MemoryGameStore::new());
        let bus = Arc::new(MemoryEventBus::default());
        let rooms = StubRooms::with_room(room);
        let sender = Arc::new(RecordingSender::default());
        let config = GameConfig {
            // no heal rolls, so every assigned sequence is deterministic
            heal_probability: 0.0,
            ..Default::default()
        };

        let envelopes = bus.subscribe(GAME_TOPIC).await.unwrap();
        let manager = Arc::new(GameManager::new(
            store.clone(),
            rooms.clone(),
            Arc::new(StubProblems),
            bus,
            sender.clone(),
            config,
        ));
        Self {
            store,
            rooms,
            sender,
            manager,
            envelopes,
        }
    }

    /// Drains every envelope published so far.
    async fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(Some(raw)) = timeout(Duration::from_millis(20), self.envelopes.next()).await {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    /// Fails the user's sequences until they run out of lives.
    async fn eliminate(&self, room: &RoomId, user: &str) {
        for _ in 0..INITIAL_LIFE {
            self.manager
                .fin_current_seq(room, &UserId::new(user), FinishCause::Failed)
                .await
                .unwrap();
        }
        // keep elimination stamps strictly ordered
        sleep(Duration::from_millis(3)).await;
    }
}

fn room(id: &str, owner: &str, max: u32) -> Room {
    Room {
        id: RoomId::new(id),
        owner_id: UserId::new(owner),
        name: "arena".into(),
        min_user_num: 2,
        max_user_num: max,
        status: RoomStatus::Pending,
    }
}

fn room_id() -> RoomId {
    RoomId::new("r1")
}

async fn join_all(h: &Harness, users: &[&str]) {
    for u in users {
        h.manager
            .join(&room_id(), &UserId::new(*u), u)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn full_game_runs_to_a_ranked_result() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob", "carol", "dave"]).await;

    let game = h.store.get_game(&room_id()).await.unwrap();
    assert_eq!(game.users.len(), 4);

    // every joiner got their first sequence
    for u in ["alice", "bob", "carol", "dave"] {
        assert!(h
            .sender
            .events_for(u)
            .iter()
            .any(|e| matches!(e, GameEvent::NextSeq(_))));
    }

    // only the owner may start
    let err = h
        .manager
        .start_game(&room_id(), &UserId::new("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Unauthorized(_)));

    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();
    assert_eq!(h.rooms.status_of(&room_id()), RoomStatus::Playing);

    h.drain().await;

    // eliminations in order: bob first out, dave last out
    h.eliminate(&room_id(), "bob").await;
    h.eliminate(&room_id(), "carol").await;
    h.eliminate(&room_id(), "dave").await;

    let envelopes = h.drain().await;
    let result_env = envelopes
        .iter()
        .find(|env| matches!(&env.payload, GameEvent::Result(_)))
        .expect("a Result event must be published");

    // membership travels with the envelope: the game is purged before
    // the fan-out loop can resolve it
    let mut included: Vec<&str> = result_env
        .include_users
        .iter()
        .map(|id| id.as_str())
        .collect();
    included.sort_unstable();
    assert_eq!(included, vec!["alice", "bob", "carol", "dave"]);

    let results = match &result_env.payload {
        GameEvent::Result(results) => results.clone(),
        _ => unreachable!(),
    };
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].user_id, UserId::new("alice"));
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].user_id, UserId::new("dave"));
    assert_eq!(results[2].user_id, UserId::new("carol"));
    assert_eq!(results[3].user_id, UserId::new("bob"));
    assert_eq!(results[3].rank, 4);

    // finished state is purged
    let err = h.store.get_game(&room_id()).await.unwrap_err();
    assert!(matches!(err, GameError::GameNotFound(_)));
    for u in ["alice", "bob", "carol", "dave"] {
        assert!(h.store.get_user(&UserId::new(u)).await.is_err());
    }

    // the room-state broadcast after the result reports finished
    let finished = envelopes.iter().any(|env| {
        matches!(&env.payload, GameEvent::ChangeRoomState(state) if state.status == "finished")
    });
    assert!(finished);
    assert_eq!(h.rooms.status_of(&room_id()), RoomStatus::Finished);

    // a rejoin cannot resurrect the finished room
    let err = h
        .manager
        .join(&room_id(), &UserId::new("erin"), "erin")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::RoomNotPending(_)));
}

#[tokio::test]
async fn join_is_idempotent_and_capped() {
    let h = Harness::new(room("r1", "alice", 2)).await;
    join_all(&h, &["alice", "alice", "bob"]).await;

    let game = h.store.get_game(&room_id()).await.unwrap();
    assert_eq!(game.users.len(), 2);

    let err = h
        .manager
        .join(&room_id(), &UserId::new("carol"), "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::RoomFull));
}

#[tokio::test]
async fn successful_sequence_attacks_a_living_opponent() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob"]).await;
    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();
    h.drain().await;

    h.manager
        .fin_current_seq(&room_id(), &UserId::new("alice"), FinishCause::Succeeded)
        .await
        .unwrap();

    let envelopes = h.drain().await;
    let attack = envelopes
        .iter()
        .find_map(|env| match &env.payload {
            GameEvent::Attack(a) => Some(a.clone()),
            _ => None,
        })
        .expect("an Attack event must be published");

    // level 1 sequence, streak 1, default factor
    assert_eq!(attack.from, UserId::new("alice"));
    assert_eq!(attack.to, UserId::new("bob"));
    assert_eq!(attack.damage, 20);

    let bob = h.store.get_user(&UserId::new("bob")).await.unwrap();
    assert_eq!(bob.difficulty, 20);

    // the victim alone is told their difficulty moved
    let difficulty_env = envelopes
        .iter()
        .find(|env| matches!(&env.payload, GameEvent::ChangeWordDifficult(_)))
        .unwrap();
    assert_eq!(difficulty_env.include_users, vec![UserId::new("bob")]);

    // the attacker got a fresh sequence
    let next_seqs = h
        .sender
        .events_for("alice")
        .iter()
        .filter(|e| matches!(e, GameEvent::NextSeq(_)))
        .count();
    assert_eq!(next_seqs, 2);
}

#[tokio::test]
async fn typing_relays_to_everyone_else() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob", "carol"]).await;
    h.drain().await;

    h.manager
        .type_key(&room_id(), &UserId::new("alice"), "hel")
        .await
        .unwrap();

    let envelopes = h.drain().await;
    let typing = envelopes
        .iter()
        .find(|env| matches!(&env.payload, GameEvent::TypingKey(_)))
        .unwrap();
    assert_eq!(typing.exclude_users, vec![UserId::new("alice")]);

    let alice = h.store.get_user(&UserId::new("alice")).await.unwrap();
    assert_eq!(alice.pos, 3);
}

#[tokio::test]
async fn eliminated_player_commands_are_inert() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob", "carol"]).await;
    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();

    h.eliminate(&room_id(), "bob").await;
    h.drain().await;

    h.manager
        .fin_current_seq(&room_id(), &UserId::new("bob"), FinishCause::Succeeded)
        .await
        .unwrap();
    h.manager
        .fin_current_seq(&room_id(), &UserId::new("bob"), FinishCause::Failed)
        .await
        .unwrap();

    assert!(h.drain().await.is_empty());
    let bob = h.store.get_user(&UserId::new("bob")).await.unwrap();
    assert_eq!(bob.life, 0);
}

#[tokio::test]
async fn join_after_start_is_rejected() {
    let h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob"]).await;
    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();

    let err = h
        .manager
        .join(&room_id(), &UserId::new("carol"), "carol")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::RoomNotPending(_)));
}

#[tokio::test]
async fn concurrent_failures_across_users_lose_no_life_updates() {
    let h = Harness::new(room("r1", "alice", 8)).await;
    join_all(&h, &["alice", "bob", "carol", "dave"]).await;
    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();

    // waves of simultaneous failures, one per user per wave
    for _ in 0..3 {
        let mut handles = Vec::new();
        for user in ["bob", "carol", "dave"] {
            let manager = h.manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .fin_current_seq(&room_id(), &UserId::new(user), FinishCause::Failed)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    let game = h.store.get_game(&room_id()).await.unwrap();
    for user in ["bob", "carol", "dave"] {
        let stored = h.store.get_user(&UserId::new(user)).await.unwrap();
        assert_eq!(stored.life, INITIAL_LIFE - 3);
        assert_eq!(game.users[&UserId::new(user)].life, INITIAL_LIFE - 3);
    }
}

#[tokio::test]
async fn heal_settlement_lowers_difficulty_and_resets_streak() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob"]).await;
    h.manager
        .start_game(&room_id(), &UserId::new("alice"))
        .await
        .unwrap();

    h.store
        .edit_user(
            &UserId::new("alice"),
            Box::new(|u| {
                u.difficulty = 120;
                u.streak = 7;
                u.sequences[0] = Sequence::new("breathe", 3, SequenceKind::Heal);
                Ok(())
            }),
        )
        .await
        .unwrap();
    h.drain().await;

    h.manager
        .fin_current_seq(&room_id(), &UserId::new("alice"), FinishCause::Succeeded)
        .await
        .unwrap();

    // default heal amount is 50
    let alice = h.store.get_user(&UserId::new("alice")).await.unwrap();
    assert_eq!(alice.difficulty, 70);
    assert_eq!(alice.streak, 0);

    let game = h.store.get_game(&room_id()).await.unwrap();
    assert_eq!(game.users[&UserId::new("alice")].difficulty, 70);
    assert_eq!(game.users[&UserId::new("alice")].streak, 0);

    let healed = h.sender.events_for("alice").iter().any(|e| {
        matches!(e, GameEvent::ChangeWordDifficult(p)
            if p.difficulty == 70 && p.cause == DifficultyCause::Heal)
    });
    assert!(healed);

    // healing attacks nobody
    let envelopes = h.drain().await;
    assert!(envelopes
        .iter()
        .all(|env| !matches!(env.payload, GameEvent::Attack(_))));
    let bob = h.store.get_user(&UserId::new("bob")).await.unwrap();
    assert_eq!(bob.difficulty, 0);
}

/// Store whose next `get_game` fails with a storage error.
struct FlakyGameStore {
    inner: MemoryGameStore,
    fail_get_game: AtomicBool,
}

#[async_trait]
impl GameStore for FlakyGameStore {
    async fn get_game(&self, id: &RoomId) -> Result<Game, GameError> {
        if self.fail_get_game.swap(false, Ordering::SeqCst) {
            return Err(GameError::Storage("connection reset".into()));
        }
        self.inner.get_game(id).await
    }

    async fn get_user(&self, id: &UserId) -> Result<User, GameError> {
        self.inner.get_user(id).await
    }

    async fn put_game(&self, game: &Game) -> Result<(), GameError> {
        self.inner.put_game(game).await
    }

    async fn put_user(&self, user: &User) -> Result<(), GameError> {
        self.inner.put_user(user).await
    }

    async fn delete_game(&self, id: &RoomId) -> Result<(), GameError> {
        self.inner.delete_game(id).await
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), GameError> {
        self.inner.delete_user(id).await
    }

    async fn edit_game(&self, id: &RoomId, mutate: EditFn<Game>) -> Result<Game, GameError> {
        self.inner.edit_game(id, mutate).await
    }

    async fn edit_user(&self, id: &UserId, mutate: EditFn<User>) -> Result<User, GameError> {
        self.inner.edit_user(id, mutate).await
    }
}

#[tokio::test]
async fn join_propagates_store_failures_instead_of_reseeding() {
    let store = Arc::new(FlakyGameStore {
        inner: MemoryGameStore::new(),
        fail_get_game: AtomicBool::new(true),
    });
    let manager = GameManager::new(
        store.clone(),
        StubRooms::with_room(room("r1", "alice", 4)),
        Arc::new(StubProblems),
        Arc::new(MemoryEventBus::default()),
        Arc::new(RecordingSender::default()),
        GameConfig::default(),
    );

    let err = manager
        .join(&room_id(), &UserId::new("alice"), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Storage(_)));

    // the failed attempt seeded nothing
    assert!(store.inner.get_user(&UserId::new("alice")).await.is_err());
    assert!(store.inner.get_game(&room_id()).await.is_err());

    // once the store recovers, joining works
    manager
        .join(&room_id(), &UserId::new("alice"), "alice")
        .await
        .unwrap();
    assert_eq!(store.inner.get_game(&room_id()).await.unwrap().users.len(), 1);
}

#[tokio::test]
async fn join_announces_newcomer_to_the_others_only() {
    let mut h = Harness::new(room("r1", "alice", 4)).await;
    join_all(&h, &["alice", "bob"]).await;

    let envelopes = h.drain().await;
    let announce = envelopes
        .iter()
        .filter(|env| matches!(&env.payload, GameEvent::ChangeOtherUserState(_)))
        .last()
        .unwrap();
    assert_eq!(announce.exclude_users, vec![UserId::new("bob")]);
}
