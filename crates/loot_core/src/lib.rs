//! # Loot Core
//!
//! Domain logic for tracking loot distribution in fixed-roster raids:
//!
//! * **Player registry** ([`registry`]) - the canonical roster
//! * **Loot history** ([`history`]) - append-only record of past awards
//! * **Priority scoring** ([`scoring`]) - attendance, history and role turned
//!   into a ranked list
//! * **Raid session** ([`session`]) - the `Idle`/`Active` state machine that
//!   governs a raid in progress
//! * **Durable store** ([`storage`]) - load/save surface used at startup and
//!   when a raid ends
//!
//! Nothing here is concurrent or networked; the server crate wraps these
//! types in a single-writer coordinator and fans changes out to observers.

pub mod attendance;
pub mod error;
pub mod history;
pub mod items;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod types;

pub use attendance::{AttendanceSource, AttendanceTable};
pub use error::{LootError, LootResult, NotFoundError, StorageError, StorageResult, ValidationError};
pub use history::{HistoryQuery, ItemQuery, ItemSummary, LootHistory, LootStats};
pub use registry::PlayerRegistry;
pub use scoring::{compute_scores, PriorityEntry, PriorityFilters, ScoringConfig};
pub use session::{AssignLoot, AssignOutcome, CompletedRaid, RaidSession, SessionQuery, SessionSnapshot, StartRaid};
pub use storage::{JsonLootStore, LootStore, MemoryLootStore};
pub use types::*;
