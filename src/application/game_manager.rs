//! The game-session rules engine.
//!
//! The only writer of game semantics: it consumes the store through its
//! atomic edit primitives, publishes room-scoped envelopes to the fan-out
//! bridge, and unicasts per-player messages through the local registry.
//!
//! Every `Game`/`User` mutation goes through `edit_game`/`edit_user`;
//! a get-then-put here would reintroduce the lost-update hazard the
//! store contract exists to prevent.

use std::sync::Arc;

use rand::Rng;

use crate::config::GameConfig;
use crate::domain::foundation::{unix_now, unix_now_millis, GameError, RoomId, UserId};
use crate::domain::game::{
    AttackPayload, DifficultyCause, DifficultyPayload, Envelope, FinishCause, Game, GameEvent,
    GameStatus, NextSeqPayload, OtherUserStatePayload, RoomStatePayload, Sequence, SequenceKind,
    TypingPayload, User, MAX_LEVEL,
};
use crate::domain::room::RoomStatus;
use crate::ports::{
    EventPublisher, GameStore, MessageSender, ProblemRepository, RoomRepository, GAME_TOPIC,
};

/// How a failed-or-settled sequence left the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailOutcome {
    /// Still playing; assign the next sequence.
    Survived,
    /// Out of lives; no further sequences.
    Eliminated,
    /// This elimination ended the whole game.
    Finalized,
}

/// State machine and combat/ranking logic for game sessions.
pub struct GameManager {
    store: Arc<dyn GameStore>,
    rooms: Arc<dyn RoomRepository>,
    problems: Arc<dyn ProblemRepository>,
    publisher: Arc<dyn EventPublisher>,
    sender: Arc<dyn MessageSender>,
    config: GameConfig,
}

impl GameManager {
    pub fn new(
        store: Arc<dyn GameStore>,
        rooms: Arc<dyn RoomRepository>,
        problems: Arc<dyn ProblemRepository>,
        publisher: Arc<dyn EventPublisher>,
        sender: Arc<dyn MessageSender>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            rooms,
            problems,
            publisher,
            sender,
            config,
        }
    }

    /// Adds a user to a room's game, creating the game from the persisted
    /// room on first join.
    ///
    /// Idempotent: a user already in the game is left untouched.
    #[tracing::instrument(skip(self, display_name), fields(room_id = %room_id, user_id = %user_id))]
    pub async fn join(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), GameError> {
        match self.store.get_game(room_id).await {
            Ok(game) if game.users.contains_key(user_id) => {
                tracing::debug!("user already joined, ignoring");
                return Ok(());
            }
            Ok(_) => {}
            // No game yet is the first-join case; anything else is real.
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let mut user = User::new(user_id.clone(), display_name);
        for problem in self.fetch_problems(1, 2).await? {
            user.sequences
                .push(Sequence::new(problem.text, problem.level, SequenceKind::Default));
        }
        self.store.put_user(&user).await?;

        let game = self.add_to_game(room_id, &user).await?;
        tracing::info!(user_num = game.users.len(), "user joined game");

        self.publish(Envelope::broadcast(
            room_id.clone(),
            GameEvent::ChangeRoomState(self.room_state(&game, None)),
        ))
        .await?;

        // Announce the joiner to everyone already in the room.
        self.publish(Envelope::except_users(
            room_id.clone(),
            GameEvent::ChangeOtherUserState(user_state(&user, 0)),
            vec![user_id.clone()],
        ))
        .await?;

        if let Some(head) = user.head_sequence() {
            self.sender
                .send(user_id, GameEvent::NextSeq(next_seq_payload(head)))
                .await?;
        }

        Ok(())
    }

    /// Starts the game; only the room owner may do this.
    #[tracing::instrument(skip(self), fields(room_id = %room_id, user_id = %user_id))]
    pub async fn start_game(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), GameError> {
        let caller = user_id.clone();
        let game = self
            .store
            .edit_game(
                room_id,
                Box::new(move |game| {
                    if game.base_room.owner_id != caller {
                        return Err(GameError::Unauthorized(caller.clone()));
                    }
                    game.start()
                }),
            )
            .await?;

        self.rooms.update_status(room_id, RoomStatus::Playing).await?;

        let started_at = unix_now() + i64::from(self.config.start_delay_secs);
        tracing::info!(started_at, "game started");

        self.publish(Envelope::broadcast(
            room_id.clone(),
            GameEvent::ChangeRoomState(self.room_state(&game, Some(started_at))),
        ))
        .await?;

        // Field snapshot so every client renders the full roster.
        let mut states: Vec<OtherUserStatePayload> =
            game.users.values().map(|u| user_state(u, 0)).collect();
        states.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        self.publish(Envelope::broadcast(
            room_id.clone(),
            GameEvent::ChangeOtherUsersState(states),
        ))
        .await?;

        Ok(())
    }

    /// Relays live typing progress to every other room member.
    ///
    /// No server-side validation; correctness is judged only at sequence
    /// completion.
    #[tracing::instrument(skip(self, input_seq), fields(room_id = %room_id, user_id = %user_id))]
    pub async fn type_key(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        input_seq: &str,
    ) -> Result<(), GameError> {
        let pos = input_seq.chars().count();
        self.store
            .edit_user(
                user_id,
                Box::new(move |user| {
                    user.pos = pos;
                    Ok(())
                }),
            )
            .await?;

        self.publish(Envelope::except_users(
            room_id.clone(),
            GameEvent::TypingKey(TypingPayload {
                user_id: user_id.clone(),
                input_seq: input_seq.to_string(),
            }),
            vec![user_id.clone()],
        ))
        .await
    }

    /// Settles a finished sequence: attack, heal, or life loss, then
    /// assigns the next sequence unless the game just ended.
    #[tracing::instrument(skip(self), fields(room_id = %room_id, user_id = %user_id, ?cause))]
    pub async fn fin_current_seq(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        cause: FinishCause,
    ) -> Result<(), GameError> {
        let user = self.store.get_user(user_id).await?;
        if !user.is_alive() {
            tracing::debug!("eliminated user, ignoring");
            return Ok(());
        }
        let head = user
            .head_sequence()
            .cloned()
            .ok_or_else(|| GameError::Storage(format!("user {user_id} has no sequence")))?;

        let outcome = match (cause, head.kind) {
            (FinishCause::Succeeded, SequenceKind::Default) => {
                self.attack(room_id, user_id, &head).await?;
                FailOutcome::Survived
            }
            (FinishCause::Succeeded, SequenceKind::Heal) => {
                self.heal(room_id, user_id).await?;
                FailOutcome::Survived
            }
            (FinishCause::Failed, _) => self.fail(room_id, user_id, &head).await?,
        };

        if outcome == FailOutcome::Survived {
            self.assign_next_sequence(room_id, user_id).await?;
        }
        Ok(())
    }

    /// Succeeded default sequence: damage a random living opponent.
    async fn attack(
        &self,
        room_id: &RoomId,
        attacker_id: &UserId,
        head: &Sequence,
    ) -> Result<(), GameError> {
        let attacker = self
            .store
            .edit_user(
                attacker_id,
                Box::new(|user| {
                    user.streak += 1;
                    Ok(())
                }),
            )
            .await?;

        let game = self.store.get_game(room_id).await?;
        let mut candidates = game.living_user_ids(Some(attacker_id));
        if candidates.is_empty() {
            tracing::debug!("no living target, skipping attack");
            return Ok(());
        }
        candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let target_id = {
            let mut rng = rand::rng();
            candidates.swap_remove(rng.random_range(0..candidates.len()))
        };

        let damage = head.damage(attacker.streak, self.config.damage_factor);
        let target = self
            .store
            .edit_user(
                &target_id,
                Box::new(move |user| {
                    user.take_damage(damage);
                    Ok(())
                }),
            )
            .await?;

        let attacker_streak = attacker.streak;
        let mirror_attacker = attacker_id.clone();
        let mirror_target = target_id.clone();
        self.store
            .edit_game(
                room_id,
                Box::new(move |game| {
                    if let Some(u) = game.users.get_mut(&mirror_attacker) {
                        u.streak = attacker_streak;
                    }
                    if let Some(u) = game.users.get_mut(&mirror_target) {
                        u.take_damage(damage);
                    }
                    Ok(())
                }),
            )
            .await?;

        tracing::debug!(target = %target_id, damage, "attack landed");

        self.publish(Envelope::to_users(
            room_id.clone(),
            GameEvent::ChangeWordDifficult(DifficultyPayload {
                difficulty: target.difficulty,
                cause: DifficultyCause::Damage,
            }),
            vec![target_id.clone()],
        ))
        .await?;

        self.publish(Envelope::broadcast(
            room_id.clone(),
            GameEvent::Attack(AttackPayload {
                from: attacker_id.clone(),
                to: target_id,
                damage,
            }),
        ))
        .await
    }

    /// Succeeded heal sequence: lower the caller's own difficulty.
    async fn heal(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), GameError> {
        let amount = self.config.heal_amount;
        let user = self
            .store
            .edit_user(
                user_id,
                Box::new(move |user| {
                    user.heal(amount);
                    user.streak = 0;
                    Ok(())
                }),
            )
            .await?;

        let difficulty = user.difficulty;
        let mirror_id = user_id.clone();
        self.store
            .edit_game(
                room_id,
                Box::new(move |game| {
                    if let Some(u) = game.users.get_mut(&mirror_id) {
                        u.difficulty = difficulty;
                        u.streak = 0;
                    }
                    Ok(())
                }),
            )
            .await?;

        self.sender
            .send(
                user_id,
                GameEvent::ChangeWordDifficult(DifficultyPayload {
                    difficulty,
                    cause: DifficultyCause::Heal,
                }),
            )
            .await
    }

    /// Failed sequence: lose a life, possibly eliminating the player and
    /// finishing the game.
    async fn fail(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        head: &Sequence,
    ) -> Result<FailOutcome, GameError> {
        let now = unix_now_millis();
        let user = self
            .store
            .edit_user(
                user_id,
                Box::new(move |user| {
                    user.streak = 0;
                    user.lose_life(now);
                    Ok(())
                }),
            )
            .await?;

        let life = user.life;
        let dead_at = user.dead_at;
        let mirror_id = user_id.clone();
        let game = self
            .store
            .edit_game(
                room_id,
                Box::new(move |game| {
                    if let Some(u) = game.users.get_mut(&mirror_id) {
                        u.life = life;
                        u.dead_at = dead_at;
                        u.streak = 0;
                    }
                    Ok(())
                }),
            )
            .await?;

        let typed: String = head.value.chars().take(user.pos).collect();
        if user.is_alive() {
            self.publish(Envelope::broadcast(
                room_id.clone(),
                GameEvent::ChangeOtherUserState(OtherUserStatePayload {
                    id: user.id.clone(),
                    name: user.display_name.clone(),
                    life: user.life,
                    seq: head.value.clone(),
                    input_seq: typed,
                    rank: 0,
                }),
            ))
            .await?;
            return Ok(FailOutcome::Survived);
        }

        // Eliminated: placement is fixed now, under the canonical ordering.
        let rank = game.rank_of(user_id)?;
        tracing::info!(rank, "user eliminated");

        self.publish(Envelope::broadcast(
            room_id.clone(),
            GameEvent::ChangeOtherUserState(OtherUserStatePayload {
                id: user.id.clone(),
                name: user.display_name.clone(),
                life: 0,
                seq: head.value.clone(),
                input_seq: typed,
                rank,
            }),
        ))
        .await?;

        if rank == 2 {
            self.finalize(room_id).await?;
            return Ok(FailOutcome::Finalized);
        }
        Ok(FailOutcome::Eliminated)
    }

    /// Ends the game: publish results and a finished room state, then
    /// purge every aggregate from the store.
    async fn finalize(&self, room_id: &RoomId) -> Result<(), GameError> {
        let game = self
            .store
            .edit_game(
                room_id,
                Box::new(|game| {
                    game.finish();
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(users = game.users.len(), "game finished");

        // The aggregates are purged right after these envelopes, so the
        // fan-out loop cannot resolve membership anymore. Carry the final
        // membership explicitly instead of broadcasting by room.
        let members = game.user_ids();

        self.publish(Envelope::to_users(
            room_id.clone(),
            GameEvent::Result(game.results()),
            members.clone(),
        ))
        .await?;

        self.publish(Envelope::to_users(
            room_id.clone(),
            GameEvent::ChangeRoomState(RoomStatePayload {
                user_num: game.users.len() as u32,
                max_user_num: game.base_room.max_user_num,
                status: GameStatus::Finished.as_str().to_string(),
                started_at: None,
                start_delay: self.config.start_delay_secs,
                owner_id: game.base_room.owner_id.clone(),
            }),
            members,
        ))
        .await?;

        self.rooms
            .update_status(room_id, RoomStatus::Finished)
            .await?;

        for user_id in game.user_ids() {
            self.store.delete_user(&user_id).await?;
        }
        self.store.delete_game(room_id).await?;
        Ok(())
    }

    /// Rotates the caller's sequence queue and unicasts the new entry.
    async fn assign_next_sequence(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<(), GameError> {
        let user = self.store.get_user(user_id).await?;
        let mut level = user.next_level();
        let mut kind = SequenceKind::Default;
        {
            let mut rng = rand::rng();
            if rng.random_bool(self.config.heal_probability) {
                kind = SequenceKind::Heal;
                level = level.saturating_add(self.config.heal_level_bonus).min(MAX_LEVEL);
            }
        }

        let problem = self
            .fetch_problems(level, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(GameError::NoProblems(level))?;
        let next = Sequence::new(problem.text, problem.level, kind);

        let rotated = next.clone();
        let user = self
            .store
            .edit_user(
                user_id,
                Box::new(move |user| {
                    user.rotate_sequence(rotated.clone());
                    Ok(())
                }),
            )
            .await?;

        let sequences = user.sequences.clone();
        let mirror_id = user_id.clone();
        self.store
            .edit_game(
                room_id,
                Box::new(move |game| {
                    if let Some(u) = game.users.get_mut(&mirror_id) {
                        u.sequences = sequences.clone();
                        u.pos = 0;
                    }
                    Ok(())
                }),
            )
            .await?;

        self.sender
            .send(user_id, GameEvent::NextSeq(next_seq_payload(&next)))
            .await
    }

    /// Inserts the user into an existing game, or seeds one from the
    /// persisted room on first join.
    async fn add_to_game(&self, room_id: &RoomId, user: &User) -> Result<Game, GameError> {
        let joiner = user.clone();
        match self
            .store
            .edit_game(
                room_id,
                Box::new(move |game| game.add_user(joiner.clone())),
            )
            .await
        {
            Ok(game) => Ok(game),
            Err(GameError::GameNotFound(_)) => {
                let room = self.rooms.get_room_by_id(room_id).await?;
                if room.status != RoomStatus::Pending {
                    return Err(GameError::RoomNotPending(room_id.clone()));
                }
                let mut game = Game::from_room(room);
                game.add_user(user.clone())?;
                self.store.put_game(&game).await?;
                Ok(game)
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_problems(
        &self,
        level: u8,
        limit: u32,
    ) -> Result<Vec<crate::domain::room::Problem>, GameError> {
        let problems = self.problems.get_problems(level, limit).await?;
        if problems.is_empty() {
            return Err(GameError::NoProblems(level));
        }
        Ok(problems)
    }

    fn room_state(&self, game: &Game, started_at: Option<i64>) -> RoomStatePayload {
        RoomStatePayload {
            user_num: game.users.len() as u32,
            max_user_num: game.base_room.max_user_num,
            status: game.status.as_str().to_string(),
            started_at,
            start_delay: self.config.start_delay_secs,
            owner_id: game.base_room.owner_id.clone(),
        }
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), GameError> {
        self.publisher.publish(GAME_TOPIC, &envelope).await
    }
}

fn user_state(user: &User, rank: u32) -> OtherUserStatePayload {
    let seq = user
        .head_sequence()
        .map(|s| s.value.clone())
        .unwrap_or_default();
    OtherUserStatePayload {
        id: user.id.clone(),
        name: user.display_name.clone(),
        life: user.life,
        seq,
        input_seq: String::new(),
        rank,
    }
}

fn next_seq_payload(seq: &Sequence) -> NextSeqPayload {
    NextSeqPayload {
        value: seq.value.clone(),
        level: seq.level,
        kind: seq.kind,
    }
}
