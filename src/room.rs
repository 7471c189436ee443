//! Room, player, and round state. Everything here is a synchronous state
//! machine driven by the registry; methods take an explicit `now` so the
//! timing rules stay testable without a clock.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::error::BattleError;
use crate::problems::{run_check, AnswerMap, Catalog};
use crate::validation::sanitize_player_name;

/// Hard cap on room membership.
pub const MAX_PLAYERS_PER_ROOM: usize = 24;

/// Pause between a finished round and the next one, surfaced to clients as
/// `nextStartAt` so they can render a countdown.
pub const NEXT_ROUND_DELAY_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Waiting,
    Active,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Time,
    MaxCorrect,
}

/// One room member. The token is the reconnection secret and never appears
/// in views; the short display id (`P01`, `P02`, ...) is what other players
/// see.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub number: u32,
    pub id: String,
    pub token: String,
    pub name: String,
    pub score: i64,
    pub joined_at: u64,
    pub last_seen_at: u64,
}

/// A winning entry, in the order correctness was accepted by the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectEntry {
    #[serde(skip_serializing)]
    pub token: String,
    pub player_id: String,
    pub name: String,
    pub placement: usize,
    pub awarded: u32,
    pub answered_at: u64,
}

/// One submission, correct or not, kept for audit and for the viewer's own
/// attempt history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(skip_serializing)]
    pub token: String,
    pub at: u64,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Round {
    pub index: u32,
    pub status: RoundStatus,
    pub problem: crate::problems::Problem,
    pub started_at: u64,
    pub ends_at: u64,
    pub finished_at: Option<u64>,
    pub attempts: Vec<Attempt>,
    pub correct: Vec<CorrectEntry>,
    pub finish_reason: Option<FinishReason>,
    pub next_start_at: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundWinner {
    pub player_id: String,
    pub name: String,
    pub placement: usize,
    pub awarded: u32,
    pub time_to_answer_ms: u64,
}

/// Completed-round record appended to the room's history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub index: u32,
    pub problem_id: String,
    pub problem_title: String,
    pub winners: Vec<RoundWinner>,
    pub started_at: u64,
    pub finished_at: u64,
    pub reason: FinishReason,
}

/// What a submission did, handed back to the registry so it can shape the
/// HTTP response and schedule follow-up transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    AlreadySolved,
    Correct {
        placement: usize,
        awarded: u32,
        score: i64,
        finished_round: bool,
        message: String,
    },
    Incorrect {
        penalty: i64,
        score: i64,
        message: String,
    },
}

/// One battle room. Owned exclusively by the registry behind a per-room
/// lock; no method here ever blocks or performs I/O.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub state: RoomState,
    pub host_token: Option<String>,
    pub config: Option<GameConfig>,
    pub players: Vec<Player>,
    pub next_player_number: u32,
    pub used_problem_ids: HashSet<String>,
    pub round: Option<Round>,
    pub history: Vec<RoundSummary>,
    pub created_at: u64,
    pub updated_at: u64,
    pub finished_at: Option<u64>,
}

impl Room {
    pub fn new(id: String, now: u64) -> Room {
        Room {
            id,
            state: RoomState::Waiting,
            host_token: None,
            config: None,
            players: Vec::new(),
            next_player_number: 0,
            used_problem_ids: HashSet::new(),
            round: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn player(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.token == token)
    }

    /// Config currently in force; the defaults when the host never set one.
    pub fn effective_config(&self) -> GameConfig {
        self.config.clone().unwrap_or_default()
    }

    pub fn touch(&mut self, now: u64) {
        self.updated_at = now;
    }

    pub fn touch_player(&mut self, token: &str, now: u64) {
        if let Some(player) = self.players.iter_mut().find(|p| p.token == token) {
            player.last_seen_at = now;
        }
        self.updated_at = now;
    }

    /// Registers a new member: allocates a fresh token and the next display
    /// id, and promotes the player to host if the room has none.
    pub fn add_player(&mut self, requested_name: &str, now: u64) -> Result<Player, BattleError> {
        if self.players.len() >= MAX_PLAYERS_PER_ROOM {
            return Err(BattleError::RoomFull);
        }
        self.next_player_number += 1;
        let number = self.next_player_number;
        let player = Player {
            number,
            id: format!("P{:02}", number),
            token: Uuid::new_v4().to_string(),
            name: sanitize_player_name(requested_name, number),
            score: 0,
            joined_at: now,
            last_seen_at: now,
        };
        if self.host_token.is_none() {
            self.host_token = Some(player.token.clone());
        }
        self.players.push(player.clone());
        self.updated_at = now;
        Ok(player)
    }

    /// Reconnect for a known token: refresh the name if a non-blank one was
    /// sent, bump `lastSeenAt`, and leave score/history untouched.
    pub fn rejoin(
        &mut self,
        token: &str,
        requested_name: Option<&str>,
        now: u64,
    ) -> Result<Player, BattleError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.token == token)
            .ok_or(BattleError::PlayerNotFound)?;
        if let Some(name) = requested_name {
            if !name.trim().is_empty() {
                player.name = sanitize_player_name(name, player.number);
            }
        }
        player.last_seen_at = now;
        let snapshot = player.clone();
        self.updated_at = now;
        Ok(snapshot)
    }

    /// Removes a member. If the host left, the earliest-joined remaining
    /// player inherits the role; an emptied room keeps no host.
    pub fn remove_player(&mut self, token: &str, now: u64) -> Result<(), BattleError> {
        let before = self.players.len();
        self.players.retain(|p| p.token != token);
        if self.players.len() == before {
            return Err(BattleError::PlayerNotFound);
        }
        if self.host_token.as_deref() == Some(token) {
            self.host_token = self.players.first().map(|p| p.token.clone());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Host-only game start: resets scores, history, and the used-problem
    /// set, then begins round 1.
    pub fn start_game(
        &mut self,
        requesting_token: &str,
        catalog: &Catalog,
        now: u64,
    ) -> Result<(), BattleError> {
        if self.host_token.as_deref() != Some(requesting_token) {
            return Err(BattleError::Forbidden);
        }
        if self.players.is_empty() {
            return Err(BattleError::NoPlayers);
        }
        if self.state == RoomState::Active {
            return Err(BattleError::AlreadyActive);
        }
        if self.config.is_none() {
            self.config = Some(GameConfig::default());
        }
        self.history.clear();
        self.used_problem_ids.clear();
        self.round = None;
        self.finished_at = None;
        for player in &mut self.players {
            player.score = 0;
        }
        if self.begin_round(catalog, now) {
            Ok(())
        } else {
            Err(BattleError::StartFailed)
        }
    }

    /// Begins the next round: draws an unused problem (resetting the pool
    /// once exhausted), stamps the deadline, and activates the room. On
    /// failed preconditions the room lands in `results` and `false` comes
    /// back instead of an error.
    pub fn begin_round(&mut self, catalog: &Catalog, now: u64) -> bool {
        let config = match &self.config {
            Some(config) => config.clone(),
            None => {
                self.enter_results(now);
                return false;
            }
        };
        if self.history.len() as u32 >= config.rounds || catalog.is_empty() {
            self.enter_results(now);
            return false;
        }

        let mut pool: Vec<_> = catalog
            .all()
            .iter()
            .filter(|p| !self.used_problem_ids.contains(p.id))
            .collect();
        if pool.is_empty() {
            // every problem has been served this game; allow repeats
            self.used_problem_ids.clear();
            pool = catalog.all().iter().collect();
        }
        let problem = match pool.choose(&mut rand::thread_rng()) {
            Some(problem) => (*problem).clone(),
            None => {
                self.enter_results(now);
                return false;
            }
        };
        self.used_problem_ids.insert(problem.id.to_string());

        let ends_at = now + config.round_time_seconds * 1000;
        self.round = Some(Round {
            index: self.history.len() as u32 + 1,
            status: RoundStatus::Active,
            problem,
            started_at: now,
            ends_at,
            finished_at: None,
            attempts: Vec::new(),
            correct: Vec::new(),
            finish_reason: None,
            next_start_at: None,
        });
        self.state = RoomState::Active;
        self.updated_at = now;
        true
    }

    fn enter_results(&mut self, now: u64) {
        self.state = RoomState::Results;
        self.round = None;
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    /// Finishes the current round, appends its summary, and either parks the
    /// room in `results` or stamps `nextStartAt` for the follow-up round.
    /// Idempotent: a round already finished returns `false` untouched.
    pub fn finish_round(&mut self, reason: FinishReason, now: u64) -> bool {
        let config = self.effective_config();
        let summary;
        {
            let round = match self.round.as_mut() {
                Some(round) if round.status == RoundStatus::Active => round,
                _ => return false,
            };
            round.status = RoundStatus::Finished;
            round.finished_at = Some(now);
            round.finish_reason = Some(reason);
            let winners = round
                .correct
                .iter()
                .map(|entry| RoundWinner {
                    player_id: entry.player_id.clone(),
                    name: entry.name.clone(),
                    placement: entry.placement,
                    awarded: entry.awarded,
                    time_to_answer_ms: entry.answered_at.saturating_sub(round.started_at),
                })
                .collect();
            summary = RoundSummary {
                index: round.index,
                problem_id: round.problem.id.to_string(),
                problem_title: round.problem.title.to_string(),
                winners,
                started_at: round.started_at,
                finished_at: now,
                reason,
            };
        }
        self.history.push(summary);

        if self.history.len() as u32 >= config.rounds {
            if let Some(round) = self.round.as_mut() {
                round.next_start_at = None;
            }
            self.state = RoomState::Results;
            self.finished_at = Some(now);
        } else if let Some(round) = self.round.as_mut() {
            round.next_start_at = Some(now + NEXT_ROUND_DELAY_MS);
        }
        self.updated_at = now;
        true
    }

    /// Arbitrates one submission. Placement is assigned strictly in the
    /// order correct answers are accepted here, never from client
    /// timestamps. Filling the last award slot finishes the round
    /// synchronously before this returns.
    pub fn record_answer(
        &mut self,
        token: &str,
        answers: &AnswerMap,
        now: u64,
    ) -> Result<AnswerOutcome, BattleError> {
        if self.player(token).is_none() {
            return Err(BattleError::PlayerNotFound);
        }
        if self.state != RoomState::Active {
            return Err(BattleError::NotActive);
        }
        let config = self.effective_config();
        let slots = config.placement_points.len();

        let already = match self.round.as_ref() {
            Some(round) if round.status == RoundStatus::Active => {
                round.correct.iter().any(|e| e.token == token)
            }
            _ => return Err(BattleError::NotActive),
        };
        if already {
            self.touch_player(token, now);
            return Ok(AnswerOutcome::AlreadySolved);
        }

        let check = match self.round.as_ref() {
            Some(round) => run_check(&round.problem, answers),
            None => return Err(BattleError::NotActive),
        };

        if check.ok {
            let placement;
            let awarded;
            let score;
            let filled;
            {
                let player = match self.players.iter_mut().find(|p| p.token == token) {
                    Some(player) => player,
                    None => return Err(BattleError::PlayerNotFound),
                };
                let round = match self.round.as_mut() {
                    Some(round) => round,
                    None => return Err(BattleError::NotActive),
                };
                if round.correct.len() >= slots {
                    // a burst of near-simultaneous correct answers can race
                    // the round closing; reject without touching the score
                    return Err(BattleError::RoundResolved);
                }
                placement = round.correct.len() + 1;
                awarded = config.placement_points.get(placement - 1).copied().unwrap_or(0);
                player.score += awarded as i64;
                player.last_seen_at = now;
                score = player.score;
                round.correct.push(CorrectEntry {
                    token: player.token.clone(),
                    player_id: player.id.clone(),
                    name: player.name.clone(),
                    placement,
                    awarded,
                    answered_at: now,
                });
                round.attempts.push(Attempt {
                    token: token.to_string(),
                    at: now,
                    correct: true,
                    placement: Some(placement),
                    awarded: Some(awarded),
                    penalty: None,
                });
                filled = round.correct.len() >= slots;
            }
            let finished_round = if filled {
                self.finish_round(FinishReason::MaxCorrect, now)
            } else {
                false
            };
            self.updated_at = now;
            Ok(AnswerOutcome::Correct {
                placement,
                awarded,
                score,
                finished_round: filled && finished_round,
                message: check.message,
            })
        } else {
            let penalty = config.penalty;
            let score;
            {
                let player = match self.players.iter_mut().find(|p| p.token == token) {
                    Some(player) => player,
                    None => return Err(BattleError::PlayerNotFound),
                };
                player.score -= penalty;
                player.last_seen_at = now;
                score = player.score;
                if let Some(round) = self.round.as_mut() {
                    round.attempts.push(Attempt {
                        token: token.to_string(),
                        at: now,
                        correct: false,
                        placement: None,
                        awarded: None,
                        penalty: Some(penalty),
                    });
                }
            }
            self.updated_at = now;
            Ok(AnswerOutcome::Incorrect {
                penalty,
                score,
                message: check.message,
            })
        }
    }

    /// Core invariant from the design: an active room always has a round
    /// and a config. Checked by tests after every operation.
    pub fn invariant_holds(&self) -> bool {
        if self.state == RoomState::Active && (self.round.is_none() || self.config.is_none()) {
            return false;
        }
        match (&self.host_token, self.players.is_empty()) {
            (None, empty) => empty,
            (Some(token), _) => self.players.iter().any(|p| &p.token == token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::{CheckResult, Problem};

    fn test_catalog() -> Catalog {
        fn always_right(_: &AnswerMap) -> CheckResult {
            CheckResult { ok: true, message: "ok".to_string() }
        }
        fn wants_one(answers: &AnswerMap) -> CheckResult {
            let ok = answers.get("ans").map(String::as_str) == Some("1");
            CheckResult { ok, message: String::new() }
        }
        Catalog::with_problems(vec![
            Problem {
                id: "t1",
                title: "One",
                difficulty: "Easy",
                statement: "",
                inputs: vec![],
                check: wants_one,
            },
            Problem {
                id: "t2",
                title: "Two",
                difficulty: "Easy",
                statement: "",
                inputs: vec![],
                check: always_right,
            },
        ])
    }

    fn answers_one() -> AnswerMap {
        [("ans".to_string(), "1".to_string())].into_iter().collect()
    }

    fn answers_wrong() -> AnswerMap {
        [("ans".to_string(), "9".to_string())].into_iter().collect()
    }

    fn room_with_players(count: usize) -> (Room, Vec<String>) {
        let mut room = Room::new("TEST01".to_string(), 1_000);
        let mut tokens = Vec::new();
        for i in 0..count {
            let player = room.add_player(&format!("player {}", i + 1), 1_000 + i as u64).unwrap();
            tokens.push(player.token);
        }
        (room, tokens)
    }

    #[test]
    fn first_player_becomes_host() {
        let (room, tokens) = room_with_players(2);
        assert_eq!(room.host_token.as_deref(), Some(tokens[0].as_str()));
        assert_eq!(room.players[0].id, "P01");
        assert_eq!(room.players[1].id, "P02");
        assert!(room.invariant_holds());
    }

    #[test]
    fn host_migrates_to_earliest_joined_on_leave() {
        let (mut room, tokens) = room_with_players(3);
        room.remove_player(&tokens[0], 2_000).unwrap();
        assert_eq!(room.host_token.as_deref(), Some(tokens[1].as_str()));
        room.remove_player(&tokens[1], 2_001).unwrap();
        room.remove_player(&tokens[2], 2_002).unwrap();
        assert_eq!(room.host_token, None);
        assert!(room.invariant_holds());
    }

    #[test]
    fn rejoin_updates_name_but_not_score() {
        let (mut room, tokens) = room_with_players(1);
        room.players[0].score = 7;
        let player = room.rejoin(&tokens[0], Some("  New   Name "), 3_000).unwrap();
        assert_eq!(player.name, "New Name");
        assert_eq!(player.score, 7);
        assert_eq!(player.id, "P01");
        // blank name on auto-rejoin keeps the old one
        let player = room.rejoin(&tokens[0], None, 3_001).unwrap();
        assert_eq!(player.name, "New Name");
    }

    #[test]
    fn room_capacity_is_enforced() {
        let (mut room, _) = room_with_players(MAX_PLAYERS_PER_ROOM);
        assert_eq!(
            room.add_player("late", 5_000).unwrap_err(),
            BattleError::RoomFull
        );
    }

    #[test]
    fn start_requires_host_and_players() {
        let (mut room, tokens) = room_with_players(2);
        let catalog = test_catalog();
        assert_eq!(
            room.start_game(&tokens[1], &catalog, 2_000).unwrap_err(),
            BattleError::Forbidden
        );
        room.start_game(&tokens[0], &catalog, 2_000).unwrap();
        assert_eq!(room.state, RoomState::Active);
        assert!(room.round.is_some());
        assert!(room.config.is_some());
        assert!(room.invariant_holds());
        assert_eq!(
            room.start_game(&tokens[0], &catalog, 2_001).unwrap_err(),
            BattleError::AlreadyActive
        );
    }

    #[test]
    fn start_with_empty_catalog_fails_cleanly() {
        let (mut room, tokens) = room_with_players(1);
        let empty = Catalog::with_problems(vec![]);
        assert_eq!(
            room.start_game(&tokens[0], &empty, 2_000).unwrap_err(),
            BattleError::StartFailed
        );
        assert_eq!(room.state, RoomState::Results);
        assert!(room.round.is_none());
    }

    #[test]
    fn round_deadline_follows_config() {
        let (mut room, tokens) = room_with_players(1);
        room.config = Some(GameConfig {
            round_time_seconds: 30,
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 10_000).unwrap();
        let round = room.round.as_ref().unwrap();
        assert_eq!(round.index, 1);
        assert_eq!(round.started_at, 10_000);
        assert_eq!(round.ends_at, 40_000);
    }

    #[test]
    fn correct_answer_awards_placement_points() {
        let (mut room, tokens) = room_with_players(2);
        room.config = Some(GameConfig {
            placement_points: vec![5, 3],
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        // both catalog problems accept "1", so the draw doesn't matter
        let outcome = room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        match outcome {
            AnswerOutcome::Correct { placement, awarded, score, finished_round, .. } => {
                assert_eq!(placement, 1);
                assert_eq!(awarded, 5);
                assert_eq!(score, 5);
                assert!(!finished_round);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(room.invariant_holds());
    }

    #[test]
    fn duplicate_correct_answer_is_idempotent() {
        let (mut room, tokens) = room_with_players(2);
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        let score_before = room.players[0].score;
        let outcome = room.record_answer(&tokens[0], &answers_one(), 2_001).unwrap();
        assert_eq!(outcome, AnswerOutcome::AlreadySolved);
        assert_eq!(room.players[0].score, score_before);
        assert_eq!(room.round.as_ref().unwrap().correct.len(), 1);
    }

    #[test]
    fn wrong_answer_applies_penalty_and_can_go_negative() {
        let (mut room, tokens) = room_with_players(1);
        room.config = Some(GameConfig {
            penalty: 2,
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        // only t1 rejects; force it by fixing the round's problem
        let strict = test_catalog().get("t1").unwrap().clone();
        room.round.as_mut().unwrap().problem = strict;
        let outcome = room.record_answer(&tokens[0], &answers_wrong(), 2_000).unwrap();
        match outcome {
            AnswerOutcome::Incorrect { penalty, score, .. } => {
                assert_eq!(penalty, 2);
                assert_eq!(score, -2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(room.round.as_ref().unwrap().correct.is_empty());
        assert_eq!(room.round.as_ref().unwrap().attempts.len(), 1);
    }

    #[test]
    fn filling_the_last_slot_finishes_the_round() {
        let (mut room, tokens) = room_with_players(3);
        room.config = Some(GameConfig {
            rounds: 2,
            placement_points: vec![5, 3],
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        let outcome = room.record_answer(&tokens[1], &answers_one(), 2_100).unwrap();
        match outcome {
            AnswerOutcome::Correct { placement, awarded, finished_round, .. } => {
                assert_eq!(placement, 2);
                assert_eq!(awarded, 3);
                assert!(finished_round);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let round = room.round.as_ref().unwrap();
        assert_eq!(round.status, RoundStatus::Finished);
        assert_eq!(round.finish_reason, Some(FinishReason::MaxCorrect));
        assert_eq!(round.next_start_at, Some(2_100 + NEXT_ROUND_DELAY_MS));
        assert_eq!(room.history.len(), 1);
        assert_eq!(room.history[0].winners.len(), 2);
        // third correct answer now hits the closed round
        assert_eq!(
            room.record_answer(&tokens[2], &answers_one(), 2_200).unwrap_err(),
            BattleError::NotActive
        );
    }

    #[test]
    fn late_correct_answer_gets_round_resolved_without_penalty() {
        let (mut room, tokens) = room_with_players(2);
        room.config = Some(GameConfig {
            placement_points: vec![5],
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        // simulate the race: slots already full but the round not yet marked
        // finished when the second submission is arbitrated
        room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        if let Some(round) = room.round.as_mut() {
            round.status = RoundStatus::Active;
        }
        let score_before = room.players[1].score;
        assert_eq!(
            room.record_answer(&tokens[1], &answers_one(), 2_050).unwrap_err(),
            BattleError::RoundResolved
        );
        assert_eq!(room.players[1].score, score_before);
    }

    #[test]
    fn last_round_finish_moves_room_to_results() {
        let (mut room, tokens) = room_with_players(1);
        room.config = Some(GameConfig {
            rounds: 1,
            placement_points: vec![10],
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        let outcome = room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        match outcome {
            AnswerOutcome::Correct { awarded, finished_round, .. } => {
                assert_eq!(awarded, 10);
                assert!(finished_round);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(room.state, RoomState::Results);
        assert_eq!(room.round.as_ref().unwrap().next_start_at, None);
        assert_eq!(room.players[0].score, 10);
    }

    #[test]
    fn timed_finish_with_no_submissions_records_empty_winners() {
        let (mut room, tokens) = room_with_players(1);
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        assert!(room.finish_round(FinishReason::Time, 61_000));
        // second finish is the idempotent guard against duplicate timers
        assert!(!room.finish_round(FinishReason::Time, 61_001));
        assert_eq!(room.history.len(), 1);
        assert!(room.history[0].winners.is_empty());
        assert_eq!(room.history[0].reason, FinishReason::Time);
    }

    #[test]
    fn problem_pool_resets_after_exhaustion() {
        let (mut room, tokens) = room_with_players(1);
        room.config = Some(GameConfig {
            rounds: 5,
            ..GameConfig::default()
        });
        let catalog = test_catalog();
        room.start_game(&tokens[0], &catalog, 1_000).unwrap();
        room.finish_round(FinishReason::Time, 2_000);
        assert!(room.begin_round(&catalog, 3_000));
        room.finish_round(FinishReason::Time, 4_000);
        // both problems used; the third round must clear the set and redraw
        assert!(room.begin_round(&catalog, 5_000));
        assert_eq!(room.used_problem_ids.len(), 1);
    }

    #[test]
    fn restart_resets_scores_and_history() {
        let (mut room, tokens) = room_with_players(1);
        room.config = Some(GameConfig {
            rounds: 1,
            placement_points: vec![10],
            ..GameConfig::default()
        });
        room.start_game(&tokens[0], &test_catalog(), 1_000).unwrap();
        room.record_answer(&tokens[0], &answers_one(), 2_000).unwrap();
        assert_eq!(room.state, RoomState::Results);
        room.start_game(&tokens[0], &test_catalog(), 9_000).unwrap();
        assert_eq!(room.state, RoomState::Active);
        assert_eq!(room.players[0].score, 0);
        assert!(room.history.is_empty());
        assert_eq!(room.round.as_ref().unwrap().index, 1);
    }
}
