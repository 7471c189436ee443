use std::error::Error;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Everything that can go wrong inside the battle engine or at its HTTP
/// boundary. Each variant maps to exactly one HTTP status via [`BattleError::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BattleError {
    InvalidInput(String),
    InvalidRoomId,
    InvalidConfig,
    Unauthorized,
    Forbidden,
    RoomNotFound,
    PlayerNotFound,
    ProblemNotFound,
    NoJoinableRoom,
    RoomFull,
    NoPlayers,
    AlreadyActive,
    SettingsLocked,
    NotActive,
    RoundResolved,
    StartFailed,
    Internal(String),
}

impl fmt::Display for BattleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            BattleError::InvalidInput(message) => {
                write!(f, "{}", message)},
            BattleError::InvalidRoomId => {
                write!(f, "Room id must be 4-12 characters of A-Z, 0-9, or '-'.")},
            BattleError::InvalidConfig => {
                write!(f, "Config payload must be an object.")},
            BattleError::Unauthorized => {
                write!(f, "Unknown or expired player token.")},
            BattleError::Forbidden => {
                write!(f, "Only the host can perform this action.")},
            BattleError::RoomNotFound => {
                write!(f, "Room not found.")},
            BattleError::PlayerNotFound => {
                write!(f, "Player not found in this room.")},
            BattleError::ProblemNotFound => {
                write!(f, "Problem not found.")},
            BattleError::NoJoinableRoom => {
                write!(f, "No joinable room is available right now.")},
            BattleError::RoomFull => {
                write!(f, "This room is full.")},
            BattleError::NoPlayers => {
                write!(f, "Cannot start a game with no players.")},
            BattleError::AlreadyActive => {
                write!(f, "The game is already in progress.")},
            BattleError::SettingsLocked => {
                write!(f, "Settings cannot be changed while the game is active.")},
            BattleError::NotActive => {
                write!(f, "There is no active round to answer.")},
            BattleError::RoundResolved => {
                write!(f, "All award slots for this round are already taken.")},
            BattleError::StartFailed => {
                write!(f, "Failed to start the first round.")},
            BattleError::Internal(message) => {
                write!(f, "Internal error: {}", message)},
        }
    }
}

impl Error for BattleError {}

impl BattleError {
    /// HTTP status code for this error, per the boundary contract.
    pub fn status(&self) -> u16 {
        match self {
            BattleError::InvalidInput(_)
            | BattleError::InvalidRoomId
            | BattleError::InvalidConfig => 400,
            BattleError::Unauthorized => 401,
            BattleError::Forbidden => 403,
            BattleError::RoomNotFound
            | BattleError::PlayerNotFound
            | BattleError::ProblemNotFound
            | BattleError::NoJoinableRoom => 404,
            BattleError::RoomFull
            | BattleError::NoPlayers
            | BattleError::AlreadyActive
            | BattleError::SettingsLocked
            | BattleError::NotActive
            | BattleError::RoundResolved
            | BattleError::StartFailed => 409,
            BattleError::Internal(_) => 500,
        }
    }
}
