//! Priority scoring engine.
//!
//! Turns the roster, the loot awarded so far and each player's attendance
//! into a ranked list of who should receive the next drop. The engine is a
//! pure function: it never mutates its inputs and returns the same ordering
//! for the same inputs, so it is safe to re-run after every assignment.
//!
//! For a player `P` with attendance `a`:
//!
//! ```text
//! base  = a * attendance_weight - history_penalty(P)
//! score = base - role_penalty(P.role) * |base|
//! ```
//!
//! `history_penalty` sums, over each past award that matches the active
//! filters, `item_penalty * slot_weight / max(1, a)`. Awards outside the
//! filtered category contribute nothing, so a player geared in one category
//! stays neutral for the others.

use crate::attendance::AttendanceSource;
use crate::registry::{normalize_name, PlayerRegistry};
use crate::types::{ItemType, LootRecord, Player, PrimaryStat, Role, TokenType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tunable weights for the score formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score gained per raid attended
    pub attendance_weight: f64,
    /// Penalty per past award, before slot weighting and attendance scaling
    pub item_penalty: f64,
    /// Fraction of a token award's penalty applied to an unfiltered ranking
    pub token_penalty_reduction: f64,
    /// Fraction of `base` removed for tanks
    pub tank_penalty: f64,
    /// Fraction of `base` removed for healers
    pub healer_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            attendance_weight: 0.55,
            item_penalty: 55.0,
            token_penalty_reduction: 0.75,
            tank_penalty: 0.075,
            healer_penalty: 0.05,
        }
    }
}

impl ScoringConfig {
    pub fn role_penalty(&self, role: Role) -> f64 {
        match role {
            Role::Tank => self.tank_penalty,
            Role::Healer => self.healer_penalty,
            Role::Dps => 0.0,
        }
    }
}

/// Optional narrowing of a ranking.
///
/// A supplied filter removes players that do not carry the matching
/// attribute and restricts the history penalty to matching awards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFilters {
    #[serde(default)]
    pub token_type: Option<TokenType>,
    #[serde(default)]
    pub stat: Option<PrimaryStat>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl PriorityFilters {
    /// Builds filters from free-form strings. Values that do not name a
    /// known token type, stat or role are ignored rather than rejected.
    pub fn parse(token_type: Option<&str>, stat: Option<&str>, role: Option<&str>) -> Self {
        Self {
            token_type: token_type.and_then(|s| s.parse().ok()),
            stat: stat.and_then(|s| s.parse().ok()),
            role: role.and_then(|s| s.parse().ok()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_type.is_none() && self.stat.is_none() && self.role.is_none()
    }

    /// Whether the player belongs in a ranking narrowed by these filters.
    pub fn admits(&self, player: &Player) -> bool {
        if self.token_type.is_some() && player.token_type != self.token_type {
            return false;
        }
        if self.stat.is_some() && player.primary_stat != self.stat {
            return false;
        }
        if self.role.is_some_and(|role| role != player.role) {
            return false;
        }
        true
    }

    /// Multiplier applied to an award's penalty; zero means the award is
    /// outside the ranked category.
    fn record_weight(&self, record: &LootRecord, config: &ScoringConfig) -> f64 {
        match (self.token_type, self.stat) {
            (None, None) => match record.item_type {
                ItemType::Token => config.token_penalty_reduction,
                ItemType::Gear => 1.0,
            },
            (token_filter, stat_filter) => {
                let token_match = token_filter.is_some_and(|t| record.token_type() == Some(t));
                let gear_match = stat_filter.is_some() && record.item_type == ItemType::Gear;
                if token_match || gear_match {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// One row of a ranking, with the factors that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub player: String,
    pub class: String,
    pub spec: String,
    pub role: Role,
    pub token_type: Option<TokenType>,
    pub primary_stat: Option<PrimaryStat>,
    pub score: f64,
    pub attendance: u32,
    /// Past awards that counted toward the penalty under the active filters
    pub award_count: usize,
    /// All past awards, regardless of filters
    pub total_awards: usize,
    pub history_penalty: f64,
    /// Amount subtracted for the player's role
    pub role_penalty: f64,
}

fn rank(a: &PriorityEntry, b: &PriorityEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.award_count.cmp(&b.award_count))
        .then_with(|| a.player.cmp(&b.player))
}

/// Ranks every admitted player, best candidate first.
///
/// # Arguments
///
/// * `registry` - The roster to rank
/// * `records` - Past awards; may span durable history and the live session
/// * `attendance` - Attendance count per player
/// * `filters` - Optional narrowing by token type, stat or role
/// * `config` - Score weights
///
/// # Returns
///
/// Entries sorted by descending score, then fewer matching awards, then
/// player name. An empty registry yields an empty list.
pub fn compute_scores<'a>(
    registry: &PlayerRegistry,
    records: impl IntoIterator<Item = &'a LootRecord>,
    attendance: &dyn AttendanceSource,
    filters: &PriorityFilters,
    config: &ScoringConfig,
) -> Vec<PriorityEntry> {
    let mut by_player: HashMap<String, Vec<&LootRecord>> = HashMap::new();
    for record in records {
        by_player
            .entry(normalize_name(&record.player))
            .or_default()
            .push(record);
    }

    let mut entries: Vec<PriorityEntry> = registry
        .iter()
        .filter(|player| filters.admits(player))
        .map(|player| {
            let awards = by_player
                .get(&normalize_name(&player.name))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            score_player(player, awards, attendance, filters, config)
        })
        .collect();

    entries.sort_by(rank);
    entries
}

fn score_player(
    player: &Player,
    awards: &[&LootRecord],
    attendance: &dyn AttendanceSource,
    filters: &PriorityFilters,
    config: &ScoringConfig,
) -> PriorityEntry {
    let attended = attendance.attendance_count_for(&player.name);
    let per_raid = f64::from(attended.max(1));

    let mut history_penalty = 0.0;
    let mut award_count = 0;
    for record in awards {
        let weight = filters.record_weight(record, config);
        if weight > 0.0 {
            award_count += 1;
            history_penalty += config.item_penalty * record.item_slot.weight() * weight / per_raid;
        }
    }

    let base = f64::from(attended) * config.attendance_weight - history_penalty;
    // Scaled by |base| so the adjustment never raises a negative score.
    let role_penalty = config.role_penalty(player.role) * base.abs();

    PriorityEntry {
        player: player.name.clone(),
        class: player.class.clone(),
        spec: player.spec.clone(),
        role: player.role,
        token_type: player.token_type,
        primary_stat: player.primary_stat,
        score: base - role_penalty,
        attendance: attended,
        award_count,
        total_awards: awards.len(),
        history_penalty,
        role_penalty,
    }
}
