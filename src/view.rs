//! Per-viewer, read-only projection of a room. This is the JSON shape the
//! shipped front-end consumes, so field names are part of the wire contract.

use serde::Serialize;

use crate::config::GameConfig;
use crate::problems::ProblemInput;
use crate::room::{Attempt, CorrectEntry, FinishReason, Room, RoomState, RoundStatus, RoundSummary};

/// How many completed-round summaries a view carries.
const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub score: i64,
    pub is_host: bool,
    pub joined_at: u64,
}

/// The problem as clients see it: statement and inputs, never the check
/// predicate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemView {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub statement: String,
    pub inputs: Vec<ProblemInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub index: u32,
    pub status: RoundStatus,
    pub started_at: u64,
    pub ends_at: u64,
    pub remaining_seconds: u64,
    pub problem: ProblemView,
    pub correct: Vec<CorrectEntry>,
    /// The viewer's own submissions only.
    pub attempts: Vec<Attempt>,
    pub finish_reason: Option<FinishReason>,
    pub next_start_at: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsView {
    pub rounds_planned: u32,
    pub rounds_played: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub id: String,
    pub name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub id: String,
    pub state: RoomState,
    pub created_at: u64,
    pub updated_at: u64,
    pub config: Option<GameConfig>,
    pub default_config: GameConfig,
    pub players: Vec<PlayerView>,
    pub me: Option<PlayerView>,
    pub host_id: Option<String>,
    pub round: Option<RoundView>,
    pub history: Vec<RoundSummary>,
    pub totals: TotalsView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultEntry>>,
    pub settings_locked: bool,
}

/// Builds the view for one (possibly anonymous) viewer. Pure: the caller is
/// responsible for the `lastSeenAt`/`updatedAt` bookkeeping.
pub fn build_view(room: &Room, viewer_token: Option<&str>, now: u64) -> GameView {
    let mut players: Vec<PlayerView> = room
        .players
        .iter()
        .map(|player| PlayerView {
            id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
            is_host: room.host_token.as_deref() == Some(player.token.as_str()),
            joined_at: player.joined_at,
        })
        .collect();
    players.sort_by(|a, b| b.score.cmp(&a.score).then(a.joined_at.cmp(&b.joined_at)));

    let me = viewer_token
        .and_then(|token| room.player(token))
        .map(|player| PlayerView {
            id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
            is_host: room.host_token.as_deref() == Some(player.token.as_str()),
            joined_at: player.joined_at,
        });

    let host_id = room
        .host_token
        .as_deref()
        .and_then(|token| room.player(token))
        .map(|player| player.id.clone());

    let round = room.round.as_ref().map(|round| {
        let remaining_seconds = if round.status == RoundStatus::Active {
            round.ends_at.saturating_sub(now).div_ceil(1000)
        } else {
            0
        };
        let attempts = match viewer_token {
            Some(token) => round
                .attempts
                .iter()
                .filter(|attempt| attempt.token == token)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        RoundView {
            index: round.index,
            status: round.status,
            started_at: round.started_at,
            ends_at: round.ends_at,
            remaining_seconds,
            problem: ProblemView {
                id: round.problem.id.to_string(),
                title: round.problem.title.to_string(),
                difficulty: round.problem.difficulty.to_string(),
                statement: round.problem.statement.to_string(),
                inputs: round.problem.inputs.clone(),
            },
            correct: round.correct.clone(),
            attempts,
            finish_reason: round.finish_reason,
            next_start_at: round.next_start_at,
        }
    });

    let history: Vec<RoundSummary> = room
        .history
        .iter()
        .rev()
        .take(HISTORY_WINDOW)
        .rev()
        .cloned()
        .collect();

    let results = if room.state == RoomState::Results {
        Some(
            players
                .iter()
                .map(|player| ResultEntry {
                    id: player.id.clone(),
                    name: player.name.clone(),
                    score: player.score,
                })
                .collect(),
        )
    } else {
        None
    };

    GameView {
        id: room.id.clone(),
        state: room.state,
        created_at: room.created_at,
        updated_at: room.updated_at,
        config: room.config.clone(),
        default_config: GameConfig::default(),
        players,
        me,
        host_id,
        round,
        history,
        totals: TotalsView {
            rounds_planned: room.effective_config().rounds,
            rounds_played: room.history.len() as u32,
        },
        results,
        settings_locked: room.state == RoomState::Active,
    }
}
