//! Game configuration: bounds, defaults, and the permissive parser applied
//! to host-supplied payloads. Out-of-range or junk fields are clamped or
//! defaulted; only a payload that is not an object at all is rejected.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::error::BattleError;

pub const MIN_ROUNDS: i64 = 1;
pub const MAX_ROUNDS: i64 = 20;
pub const MIN_ROUND_TIME_SECS: i64 = 10;
pub const MAX_ROUND_TIME_SECS: i64 = 600;
pub const MIN_PENALTY: i64 = 0;
pub const MAX_PENALTY: i64 = 50;
pub const MAX_PLACEMENT_POINT: i64 = 100;
pub const MAX_PLACEMENT_SLOTS: usize = 8;

/// Settings for one game, normalized. Replaced wholesale on every config
/// request; never partially merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub rounds: u32,
    pub round_time_seconds: u64,
    pub placement_points: Vec<u32>,
    pub penalty: i64,
}

impl Default for GameConfig {
    fn default() -> GameConfig {
        GameConfig {
            rounds: 5,
            round_time_seconds: 60,
            placement_points: vec![5, 3, 1],
            penalty: 1,
        }
    }
}

impl GameConfig {
    /// Parses a raw JSON config. Fields are clamped/defaulted independently;
    /// `Err(InvalidConfig)` only when the payload is not an object.
    pub fn from_value(raw: &Value) -> Result<GameConfig, BattleError> {
        let obj = raw.as_object().ok_or(BattleError::InvalidConfig)?;
        let defaults = GameConfig::default();

        let rounds = clamp_int(obj.get("rounds"), MIN_ROUNDS, MAX_ROUNDS, defaults.rounds as i64);
        let round_time_seconds = clamp_int(
            obj.get("roundTimeSeconds"),
            MIN_ROUND_TIME_SECS,
            MAX_ROUND_TIME_SECS,
            defaults.round_time_seconds as i64,
        );
        let penalty = clamp_int(obj.get("penalty"), MIN_PENALTY, MAX_PENALTY, defaults.penalty);
        let mut placement_points = parse_placement_points(obj.get("placementPoints"));
        if placement_points.is_empty() {
            placement_points = defaults.placement_points;
        }

        Ok(GameConfig {
            rounds: rounds as u32,
            round_time_seconds: round_time_seconds as u64,
            placement_points,
            penalty,
        })
    }
}

/// Reads a numeric value out of a JSON field, accepting numbers and numeric
/// strings the way the form layer submits them.
fn number_of(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|n| n.is_finite()),
        Some(Value::String(s)) => crate::problems::utils::parse_num(s),
        _ => None,
    }
}

fn clamp_int(value: Option<&Value>, min: i64, max: i64, default: i64) -> i64 {
    match number_of(value) {
        Some(n) => (n.round() as i64).clamp(min, max),
        None => default,
    }
}

/// Placement points come in either as a JSON array or as a delimiter
/// separated string ("5, 3, 1"). Non-positive and non-numeric entries are
/// dropped, values rounded and clamped to 100, and the list truncated to the
/// slot maximum. An empty result is the caller's cue to fall back.
fn parse_placement_points(value: Option<&Value>) -> Vec<u32> {
    let raw: Vec<f64> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| number_of(Some(item)))
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c == '、' || c.is_whitespace())
            .filter_map(crate::problems::utils::parse_num)
            .collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .filter(|n| *n > 0.0)
        .map(|n| (n.round() as i64).clamp(1, MAX_PLACEMENT_POINT) as u32)
        .take(MAX_PLACEMENT_SLOTS)
        .collect()
}
