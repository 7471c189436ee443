//! The room registry: owns every live room behind a per-room lock, hands
//! requests to the room state machine, and drives the autonomous timer
//! transitions (round expiry, inter-round delay) with cancellable tokio
//! tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;
use serde_json::Value;

use crate::config::GameConfig;
use crate::error::BattleError;
use crate::problems::{answers_from_value, Catalog};
use crate::room::{AnswerOutcome, FinishReason, Room, RoomState, RoundStatus, MAX_PLAYERS_PER_ROOM};
use crate::view::{build_view, GameView};

/// Rooms with no members are evicted after this much idle time.
pub const EMPTY_ROOM_TTL_MS: u64 = 2 * 60 * 1000;

/// Populated rooms are evicted once idle this long, regardless of members.
pub const ROOM_TTL_MS: u64 = 6 * 60 * 60 * 1000;

const GENERATED_ROOM_ID_LEN: usize = 6;
const ROOM_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A caller-supplied room id: 4-12 characters of uppercase alphanumerics or
/// hyphens.
pub fn is_valid_room_id(id: &str) -> bool {
    (4..=12).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
}

fn lock_poisoned() -> BattleError {
    BattleError::Internal("lock poisoned".to_string())
}

/// Result of a join request.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room_id: String,
    pub token: String,
    pub player_id: String,
    pub rejoined: bool,
}

/// Result of a quick-join probe: the oldest waiting room with free seats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickJoinOutcome {
    pub room_id: String,
    pub player_count: usize,
}

/// Result of one answer submission, already shaped for the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReply {
    pub ok: bool,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_solved: Option<bool>,
    pub score: i64,
    pub message: String,
}

/// Manages every live battle room.
///
/// Cloning is cheap and shares the same registry. Each operation acquires
/// the target room's lock for its full duration, which serializes all
/// mutations per room exactly as the engine's design requires.
#[derive(Clone)]
pub struct RoomRegistry {
    pub(crate) rooms: Arc<RwLock<HashMap<String, Arc<RwLock<Room>>>>>,
    /// Pending timer per room, tagged with the round index it was armed
    /// for so a stale callback cannot release a successor's handle.
    pub(crate) timers: Arc<Mutex<HashMap<String, (u32, tokio::task::JoinHandle<()>)>>>,
    catalog: Arc<Catalog>,
}

impl RoomRegistry {
    pub fn new() -> RoomRegistry {
        RoomRegistry::with_catalog(Catalog::standard())
    }

    pub fn with_catalog(catalog: Catalog) -> RoomRegistry {
        RoomRegistry {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            timers: Arc::new(Mutex::new(HashMap::new())),
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Join or create a room. A recognized token reconnects the existing
    /// player; otherwise a new member is registered.
    pub fn join(
        &self,
        room_id: Option<&str>,
        name: Option<&str>,
        token: Option<&str>,
    ) -> Result<JoinOutcome, BattleError> {
        let now = epoch_ms_now();
        self.evict_stale(now);

        let requested = room_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_uppercase);
        let (room_id, room_arc) = match requested {
            Some(id) => {
                let existing = {
                    let rooms = self.rooms.read().map_err(|_| lock_poisoned())?;
                    rooms.get(&id).cloned()
                };
                match existing {
                    Some(arc) => (id, arc),
                    None => self.create_room(Some(&id), now)?,
                }
            }
            None => self.create_room(None, now)?,
        };

        let mut room = room_arc.write().map_err(|_| lock_poisoned())?;
        if let Some(token) = token {
            if room.player(token).is_some() {
                let player = room.rejoin(token, name, now)?;
                self.ensure_round_timer(&room, now);
                return Ok(JoinOutcome {
                    room_id,
                    token: player.token,
                    player_id: player.id,
                    rejoined: true,
                });
            }
        }
        let player = room.add_player(name.unwrap_or(""), now)?;
        self.ensure_round_timer(&room, now);
        Ok(JoinOutcome {
            room_id,
            token: player.token,
            player_id: player.id,
            rejoined: false,
        })
    }

    /// A room emptied mid-game has its timer cancelled; when someone joins
    /// it again the pending transition must be re-armed or the round would
    /// never advance on its own.
    fn ensure_round_timer(&self, room: &Room, now: u64) {
        if room.state != RoomState::Active {
            return;
        }
        let armed = self
            .timers
            .lock()
            .map(|timers| timers.contains_key(&room.id))
            .unwrap_or(true);
        if armed {
            return;
        }
        if let Some(round) = &room.round {
            match round.status {
                RoundStatus::Active => self.schedule_round_expiry(
                    &room.id,
                    round.index,
                    round.ends_at.saturating_sub(now),
                ),
                RoundStatus::Finished => {
                    if let Some(next_start_at) = round.next_start_at {
                        self.schedule_round_begin(
                            &room.id,
                            round.index + 1,
                            next_start_at.saturating_sub(now),
                        );
                    }
                }
            }
        }
    }

    /// Creates a room, generating an id when none was requested. A caller
    /// supplied id must pass [`is_valid_room_id`]; if it already exists the
    /// existing room is returned (join semantics).
    pub fn create_room(
        &self,
        desired_id: Option<&str>,
        now: u64,
    ) -> Result<(String, Arc<RwLock<Room>>), BattleError> {
        let mut rooms = self.rooms.write().map_err(|_| lock_poisoned())?;
        let id = match desired_id {
            Some(id) => {
                if !is_valid_room_id(id) {
                    return Err(BattleError::InvalidRoomId);
                }
                if let Some(existing) = rooms.get(id) {
                    return Ok((id.to_string(), existing.clone()));
                }
                id.to_string()
            }
            None => {
                let mut rng = rand::thread_rng();
                loop {
                    let candidate: String = (0..GENERATED_ROOM_ID_LEN)
                        .map(|_| ROOM_ID_CHARS[rng.gen_range(0..ROOM_ID_CHARS.len())] as char)
                        .collect();
                    if !rooms.contains_key(&candidate) {
                        break candidate;
                    }
                }
            }
        };
        let room = Arc::new(RwLock::new(Room::new(id.clone(), now)));
        rooms.insert(id.clone(), room.clone());
        Ok((id, room))
    }

    /// The oldest waiting room with at least one player and a free seat.
    pub fn quick_join(&self) -> Result<QuickJoinOutcome, BattleError> {
        let now = epoch_ms_now();
        self.evict_stale(now);
        let rooms = self.rooms.read().map_err(|_| lock_poisoned())?;
        let mut best: Option<QuickJoinOutcome> = None;
        let mut best_created = u64::MAX;
        for room_lock in rooms.values() {
            let room = match room_lock.read() {
                Ok(room) => room,
                Err(_) => continue,
            };
            if room.state != RoomState::Waiting
                || room.players.is_empty()
                || room.players.len() >= MAX_PLAYERS_PER_ROOM
            {
                continue;
            }
            if room.created_at < best_created {
                best_created = room.created_at;
                best = Some(QuickJoinOutcome {
                    room_id: room.id.clone(),
                    player_count: room.players.len(),
                });
            }
        }
        best.ok_or(BattleError::NoJoinableRoom)
    }

    /// Host-only: replace the room's config wholesale with a normalized one.
    pub fn set_config(
        &self,
        room_id: &str,
        token: &str,
        raw: &Value,
    ) -> Result<GameConfig, BattleError> {
        let now = epoch_ms_now();
        let room_lock = self.resolve(room_id)?;
        let mut room = room_lock.write().map_err(|_| lock_poisoned())?;
        if room.host_token.as_deref() != Some(token) {
            return Err(BattleError::Forbidden);
        }
        if room.state == RoomState::Active {
            return Err(BattleError::SettingsLocked);
        }
        let config = GameConfig::from_value(raw)?;
        room.config = Some(config.clone());
        room.touch(now);
        Ok(config)
    }

    /// Host-only: start (or restart) the game and schedule round 1's expiry.
    pub fn start(&self, room_id: &str, token: &str) -> Result<(), BattleError> {
        let now = epoch_ms_now();
        let room_lock = self.resolve(room_id)?;
        let mut room = room_lock.write().map_err(|_| lock_poisoned())?;
        room.start_game(token, &self.catalog, now)?;
        if let Some(round) = &room.round {
            self.schedule_round_expiry(&room.id, round.index, round.ends_at.saturating_sub(now));
        }
        Ok(())
    }

    /// Arbitrates one answer submission. Filling the last award slot
    /// finishes the round synchronously and schedules the next one before
    /// this returns.
    pub fn submit_answer(
        &self,
        room_id: &str,
        token: &str,
        answers: Option<&Value>,
    ) -> Result<AnswerReply, BattleError> {
        let now = epoch_ms_now();
        let room_lock = self.resolve(room_id)?;
        let mut room = room_lock.write().map_err(|_| lock_poisoned())?;
        let answer_map = answers_from_value(answers);
        let outcome = room.record_answer(token, &answer_map, now)?;

        if let AnswerOutcome::Correct { finished_round: true, .. } = &outcome {
            // the max-correct finish supersedes the pending expiry timer
            self.cancel_timer(&room.id);
            if let Some(next_start_at) = room.round.as_ref().and_then(|r| r.next_start_at) {
                let next_index = room.round.as_ref().map(|r| r.index + 1).unwrap_or(1);
                self.schedule_round_begin(&room.id, next_index, next_start_at.saturating_sub(now));
            }
        }

        Ok(match outcome {
            AnswerOutcome::AlreadySolved => {
                let score = room.player(token).map(|p| p.score).unwrap_or(0);
                AnswerReply {
                    ok: true,
                    correct: false,
                    placement: None,
                    awarded: None,
                    penalty_applied: None,
                    penalty: None,
                    already_solved: Some(true),
                    score,
                    message: "Already solved this round.".to_string(),
                }
            }
            AnswerOutcome::Correct { placement, awarded, score, message, .. } => AnswerReply {
                ok: true,
                correct: true,
                placement: Some(placement),
                awarded: Some(awarded),
                penalty_applied: None,
                penalty: None,
                already_solved: None,
                score,
                message,
            },
            AnswerOutcome::Incorrect { penalty, score, message } => AnswerReply {
                ok: true,
                correct: false,
                placement: None,
                awarded: None,
                penalty_applied: Some(penalty > 0),
                penalty: Some(penalty),
                already_solved: None,
                score,
                message,
            },
        })
    }

    /// Removes a player; history keeps whatever they already earned. An
    /// emptied room stops ticking but stays registered until eviction.
    pub fn leave(&self, room_id: &str, token: &str) -> Result<(), BattleError> {
        let now = epoch_ms_now();
        let room_lock = self.resolve(room_id)?;
        let mut room = room_lock.write().map_err(|_| lock_poisoned())?;
        room.remove_player(token, now)?;
        if room.players.is_empty() {
            self.cancel_timer(&room.id);
        }
        Ok(())
    }

    /// Read-only projection for one viewer. Refreshes `lastSeenAt` and
    /// `updatedAt` as eviction bookkeeping; a supplied token must belong to
    /// the room.
    pub fn get_view(
        &self,
        room_id: &str,
        viewer_token: Option<&str>,
    ) -> Result<GameView, BattleError> {
        let now = epoch_ms_now();
        self.evict_stale(now);
        let room_lock = self.resolve(room_id)?;
        let mut room = room_lock.write().map_err(|_| lock_poisoned())?;
        if let Some(token) = viewer_token {
            if room.player(token).is_none() {
                return Err(BattleError::Unauthorized);
            }
            room.touch_player(token, now);
        } else {
            room.touch(now);
        }
        Ok(build_view(&room, viewer_token, now))
    }

    /// Drops rooms nobody is using: empty past the short threshold, or any
    /// room past the long TTL. Runs opportunistically at the head of
    /// registry operations instead of on a background scheduler.
    pub fn evict_stale(&self, now: u64) {
        let stale: Vec<String> = {
            let rooms = match self.rooms.read() {
                Ok(rooms) => rooms,
                Err(_) => return,
            };
            rooms
                .iter()
                .filter_map(|(id, room_lock)| {
                    let room = room_lock.read().ok()?;
                    let idle = now.saturating_sub(room.updated_at);
                    let dead = (room.players.is_empty() && idle > EMPTY_ROOM_TTL_MS)
                        || idle > ROOM_TTL_MS;
                    if dead {
                        Some(id.clone())
                    } else {
                        None
                    }
                })
                .collect()
        };
        if stale.is_empty() {
            return;
        }
        if let Ok(mut rooms) = self.rooms.write() {
            for id in &stale {
                rooms.remove(id);
            }
        }
        for id in &stale {
            self.cancel_timer(id);
            println!("Evicted idle room {}", id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    fn resolve(&self, room_id: &str) -> Result<Arc<RwLock<Room>>, BattleError> {
        let id = room_id.trim().to_uppercase();
        let rooms = self.rooms.read().map_err(|_| lock_poisoned())?;
        rooms.get(&id).cloned().ok_or(BattleError::RoomNotFound)
    }

    fn cancel_timer(&self, room_id: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some((_, handle)) = timers.remove(room_id) {
                handle.abort();
            }
        }
    }

    /// Drops the room's timer entry, but only if it still carries the
    /// round index the caller was armed for. An aborted callback that
    /// slipped past its sleep must not release a successor's handle.
    pub(crate) fn release_timer(&self, room_id: &str, round_index: u32) {
        if let Ok(mut timers) = self.timers.lock() {
            if timers.get(room_id).map(|(index, _)| *index) == Some(round_index) {
                timers.remove(room_id);
            }
        }
    }

    /// Spawns the autonomous finish(time) transition for a round, replacing
    /// any timer the room already had pending.
    fn schedule_round_expiry(&self, room_id: &str, round_index: u32, delay_ms: u64) {
        let registry = self.clone();
        let id = room_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            registry.handle_round_expiry(&id, round_index);
        });
        self.store_timer(room_id, round_index, handle);
    }

    /// Spawns the inter-round begin transition after the fixed delay.
    fn schedule_round_begin(&self, room_id: &str, next_index: u32, delay_ms: u64) {
        let registry = self.clone();
        let id = room_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            registry.handle_round_begin(&id, next_index);
        });
        self.store_timer(room_id, next_index, handle);
    }

    fn store_timer(&self, room_id: &str, round_index: u32, handle: tokio::task::JoinHandle<()>) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some((_, old)) = timers.insert(room_id.to_string(), (round_index, handle)) {
                old.abort();
            }
        }
    }

    /// Timer callback: the round's clock ran out. Verifies the round is
    /// still the one the timer was armed for before finishing it; a
    /// superseded timer is a no-op.
    fn handle_round_expiry(&self, room_id: &str, round_index: u32) {
        self.release_timer(room_id, round_index);
        let now = epoch_ms_now();
        let room_lock = {
            let rooms = match self.rooms.read() {
                Ok(rooms) => rooms,
                Err(_) => return,
            };
            match rooms.get(room_id) {
                Some(room_lock) => room_lock.clone(),
                None => return,
            }
        };
        let mut room = match room_lock.write() {
            Ok(room) => room,
            Err(_) => return,
        };
        match &room.round {
            Some(round) if round.index == round_index && round.status == RoundStatus::Active => {}
            _ => return,
        }
        if room.finish_round(FinishReason::Time, now) {
            if let Some(next_start_at) = room.round.as_ref().and_then(|r| r.next_start_at) {
                self.schedule_round_begin(&room.id, round_index + 1, next_start_at.saturating_sub(now));
            }
        }
    }

    /// Timer callback: the inter-round pause elapsed. Begins the next round
    /// if the room is still waiting on exactly this transition.
    fn handle_round_begin(&self, room_id: &str, next_index: u32) {
        self.release_timer(room_id, next_index);
        let now = epoch_ms_now();
        let room_lock = {
            let rooms = match self.rooms.read() {
                Ok(rooms) => rooms,
                Err(_) => return,
            };
            match rooms.get(room_id) {
                Some(room_lock) => room_lock.clone(),
                None => return,
            }
        };
        let mut room = match room_lock.write() {
            Ok(room) => room,
            Err(_) => return,
        };
        let ready = room.state == RoomState::Active
            && matches!(
                &room.round,
                Some(round)
                    if round.status == RoundStatus::Finished && round.index + 1 == next_index
            );
        if !ready {
            return;
        }
        if room.begin_round(&self.catalog, now) {
            if let Some(round) = &room.round {
                self.schedule_round_expiry(&room.id, round.index, round.ends_at.saturating_sub(now));
            }
        } else {
            eprintln!("Room {} could not begin round {}; left in results", room_id, next_index);
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        RoomRegistry::new()
    }
}
