//! Raid session state machine.
//!
//! A session is either `Idle` or `Active`. Every transition validates its
//! input completely before touching state, so a rejected command leaves the
//! session exactly as it was.
//!
//! ```text
//! Idle --start--> Active --set_boss / assign_loot--> Active --end--> Idle
//! ```

use crate::error::{LootError, LootResult, ValidationError};
use crate::items;
use crate::registry::{normalize_name, PlayerRegistry};
use crate::types::{ItemSlot, LootRecord, RaidSize, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Command: open a new raid session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRaid {
    pub boss: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub raid_size: Option<RaidSize>,
}

/// Command: record an item award in the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignLoot {
    pub item: String,
    pub player: String,
    /// Defaults to the session's current boss
    #[serde(default)]
    pub boss: Option<String>,
    /// Overrides the slot inferred from the item name
    #[serde(default)]
    pub slot: Option<ItemSlot>,
    /// Submission time; together with player and item this identifies a
    /// submission, so retries carrying the same value are not double counted
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// State of a raid in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRaid {
    pub boss: String,
    pub started_at: Timestamp,
    pub raid_size: RaidSize,
    /// Canonical registry names, in the order given at start
    pub participants: Vec<String>,
    pub loot: Vec<LootRecord>,
}

impl ActiveRaid {
    fn participant(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name);
        self.participants
            .iter()
            .find(|p| normalize_name(p) == key)
            .map(String::as_str)
    }
}

/// A finished raid, ready to be folded into history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedRaid {
    pub boss: String,
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub raid_size: RaidSize,
    pub participants: Vec<String>,
    pub loot: Vec<LootRecord>,
}

/// Filter over archived raids. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub raid_size: Option<RaidSize>,
    /// Case-insensitive substring of the boss name
    #[serde(default)]
    pub boss: Option<String>,
    /// Earliest start time, inclusive
    #[serde(default)]
    pub since: Option<Timestamp>,
    /// Latest start time, inclusive
    #[serde(default)]
    pub until: Option<Timestamp>,
}

impl SessionQuery {
    pub fn matches(&self, raid: &CompletedRaid) -> bool {
        if self.raid_size.is_some_and(|size| size != raid.raid_size) {
            return false;
        }
        if let Some(boss) = &self.boss {
            if !raid.boss.to_lowercase().contains(&boss.trim().to_lowercase()) {
                return false;
            }
        }
        self.since.is_none_or(|since| raid.started_at >= since)
            && self.until.is_none_or(|until| raid.started_at <= until)
    }
}

/// Read-only view of a session, as sent to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub current_boss: Option<String>,
    pub start_time: Option<Timestamp>,
    pub raid_size: Option<RaidSize>,
    pub participants: Vec<String>,
    pub loot_assignments: Vec<LootRecord>,
}

/// Result of a successful [`RaidSession::assign_loot`].
#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    Assigned(LootRecord),
    /// Same player, item and timestamp as an existing record; nothing appended
    Duplicate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RaidSession {
    #[default]
    Idle,
    Active(ActiveRaid),
}

impl RaidSession {
    pub fn is_active(&self) -> bool {
        matches!(self, RaidSession::Active(_))
    }

    /// Loot assigned during the current session; empty when idle.
    pub fn in_session_loot(&self) -> &[LootRecord] {
        match self {
            RaidSession::Idle => &[],
            RaidSession::Active(raid) => &raid.loot,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match self {
            RaidSession::Idle => SessionSnapshot::default(),
            RaidSession::Active(raid) => SessionSnapshot {
                active: true,
                current_boss: Some(raid.boss.clone()),
                start_time: Some(raid.started_at),
                raid_size: Some(raid.raid_size),
                participants: raid.participants.clone(),
                loot_assignments: raid.loot.clone(),
            },
        }
    }

    /// `Idle -> Active`.
    ///
    /// # Errors
    ///
    /// * `RaidAlreadyActive` if a raid is in progress
    /// * `EmptyBossName` / `NoParticipants` for missing input
    /// * `UnknownPlayer` if a participant is not in the registry
    /// * `DuplicateParticipant` if a name appears twice
    pub fn start(&mut self, command: StartRaid, registry: &PlayerRegistry, now: Timestamp) -> LootResult<()> {
        if self.is_active() {
            return Err(ValidationError::RaidAlreadyActive.into());
        }

        let boss = command.boss.trim();
        if boss.is_empty() {
            return Err(ValidationError::EmptyBossName.into());
        }
        if command.participants.is_empty() {
            return Err(ValidationError::NoParticipants.into());
        }

        let mut seen = HashSet::new();
        let mut participants = Vec::with_capacity(command.participants.len());
        for name in &command.participants {
            let player = registry.resolve(name)?;
            if !seen.insert(normalize_name(&player.name)) {
                return Err(ValidationError::DuplicateParticipant(player.name.clone()).into());
            }
            participants.push(player.name.clone());
        }

        info!("⚔️ Raid started on {} with {} participants", boss, participants.len());
        *self = RaidSession::Active(ActiveRaid {
            boss: boss.to_string(),
            started_at: now,
            raid_size: command.raid_size.unwrap_or_default(),
            participants,
            loot: Vec::new(),
        });
        Ok(())
    }

    /// `Active -> Active`, changing only the current boss.
    pub fn set_boss(&mut self, boss: &str) -> LootResult<()> {
        let RaidSession::Active(raid) = self else {
            return Err(ValidationError::NoActiveRaid.into());
        };
        let boss = boss.trim();
        if boss.is_empty() {
            return Err(ValidationError::EmptyBossName.into());
        }

        debug!("Current boss {} -> {}", raid.boss, boss);
        raid.boss = boss.to_string();
        Ok(())
    }

    /// `Active -> Active`, appending one award.
    ///
    /// A submission matching an existing record on (player, item,
    /// timestamp) is accepted without appending anything.
    pub fn assign_loot(&mut self, command: AssignLoot, now: Timestamp) -> LootResult<AssignOutcome> {
        let RaidSession::Active(raid) = self else {
            return Err(ValidationError::NoActiveRaid.into());
        };

        let item = command.item.trim();
        if item.is_empty() {
            return Err(ValidationError::EmptyItemName.into());
        }
        if command.player.trim().is_empty() {
            return Err(ValidationError::EmptyPlayerName.into());
        }
        let player = raid
            .participant(&command.player)
            .ok_or_else(|| LootError::from(ValidationError::NotAParticipant(command.player.trim().to_string())))?
            .to_string();

        let timestamp = command.timestamp.unwrap_or(now);
        if raid.loot.iter().any(|r| r.is_same_award(&player, item, timestamp)) {
            debug!("Ignoring duplicate award of {} to {} at {}", item, player, timestamp);
            return Ok(AssignOutcome::Duplicate);
        }

        let boss = command
            .boss
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&raid.boss)
            .to_string();
        let info = items::classify(item, command.slot);

        let record = LootRecord {
            player,
            item: item.to_string(),
            item_type: info.item_type,
            item_slot: info.slot,
            raid_size: raid.raid_size,
            boss,
            timestamp,
        };
        info!("🎁 {} assigned to {} ({})", record.item, record.player, record.boss);
        raid.loot.push(record.clone());
        Ok(AssignOutcome::Assigned(record))
    }

    /// The raid as it would be archived if it ended at `now`, without
    /// ending it. `None` when idle.
    pub fn completed(&self, now: Timestamp) -> Option<CompletedRaid> {
        match self {
            RaidSession::Idle => None,
            RaidSession::Active(raid) => Some(CompletedRaid {
                boss: raid.boss.clone(),
                started_at: raid.started_at,
                ended_at: now,
                raid_size: raid.raid_size,
                participants: raid.participants.clone(),
                loot: raid.loot.clone(),
            }),
        }
    }

    /// `Active -> Idle`. Ending an idle session is a no-op returning `None`.
    pub fn end(&mut self, now: Timestamp) -> Option<CompletedRaid> {
        let completed = self.completed(now)?;
        *self = RaidSession::Idle;
        info!("🏁 Raid on {} ended with {} awards", completed.boss, completed.loot.len());
        Some(completed)
    }
}
