//! Multiplayer math battle engine: rooms of players race through timed
//! rounds of math puzzles, with rank scoring for the fastest correct
//! answers and an HTTP/JSON boundary for browser clients.
//! ## Example usage
//! ```
//! use mathbattle::room::Room;
//! use mathbattle::problems::Catalog;
//!
//! let catalog = Catalog::standard();
//! let mut room = Room::new("LOBBY1".to_string(), 1_000);
//!
//! let host = room.add_player("Aki", 1_000).unwrap();
//! room.add_player("Mio", 2_000).unwrap();
//! assert_eq!(room.players.len(), 2);
//! assert_eq!(room.host_token.as_deref(), Some(host.token.as_str()));
//!
//! room.start_game(&host.token, &catalog, 3_000).unwrap();
//! let round = room.round.as_ref().unwrap();
//! assert_eq!(round.index, 1);
//! assert_eq!(round.ends_at, 3_000 + 60 * 1000);
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod problems;
pub mod registry;
pub mod room;
pub mod validation;
pub mod view;


pub use config::GameConfig;
pub use error::BattleError;
pub use problems::{Catalog, CheckResult, Problem};
pub use registry::RoomRegistry;
pub use room::{Room, RoomState};
pub use view::{build_view, GameView};
