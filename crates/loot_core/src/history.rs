//! Append-only loot history and the queries run against it.

use crate::registry::normalize_name;
use crate::types::{ItemSlot, ItemType, LootRecord, RaidSize, TokenType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Filter for [`LootHistory::query`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Case-insensitive substring of the player name
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub raid_size: Option<RaidSize>,
}

impl HistoryQuery {
    fn matches(&self, record: &LootRecord) -> bool {
        if let Some(player) = &self.player {
            let needle = normalize_name(player);
            if !record.player.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if self.item_type.is_some_and(|t| t != record.item_type) {
            return false;
        }
        if self.raid_size.is_some_and(|s| s != record.raid_size) {
            return false;
        }
        true
    }
}

/// Filter for [`LootHistory::items`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    #[serde(default)]
    pub slot: Option<ItemSlot>,
    /// `Some(true)` keeps only tokens, `Some(false)` only gear
    #[serde(default)]
    pub token: Option<bool>,
}

/// One distinct item seen in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub name: String,
    pub item_type: ItemType,
    pub slot: ItemSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

/// Aggregate counts over the whole history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LootStats {
    pub total_items: usize,
    pub token_distribution: BTreeMap<TokenType, usize>,
    pub slot_distribution: BTreeMap<ItemSlot, usize>,
}

/// Every item ever awarded. Records are never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LootHistory {
    records: Vec<LootRecord>,
}

impl LootHistory {
    pub fn new(records: Vec<LootRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[LootRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn append(&mut self, records: impl IntoIterator<Item = LootRecord>) {
        self.records.extend(records);
    }

    pub fn query(&self, query: &HistoryQuery) -> Vec<&LootRecord> {
        self.records.iter().filter(|r| query.matches(r)).collect()
    }

    /// Distinct items awarded so far, in first-award order.
    ///
    /// Names are compared case-insensitively; the first spelling seen wins.
    pub fn items(&self, query: &ItemQuery) -> Vec<ItemSummary> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.item.trim().to_lowercase()))
            .filter(|r| query.token.is_none_or(|token| (r.item_type == ItemType::Token) == token))
            .filter(|r| query.slot.is_none_or(|slot| slot == r.item_slot))
            .map(|r| ItemSummary {
                name: r.item.clone(),
                item_type: r.item_type,
                slot: r.item_slot,
                token_type: r.token_type(),
            })
            .collect()
    }

    pub fn stats(&self) -> LootStats {
        let mut stats = LootStats {
            total_items: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            if let Some(token) = record.token_type() {
                *stats.token_distribution.entry(token).or_default() += 1;
            }
            if record.item_slot != ItemSlot::Unknown {
                *stats.slot_distribution.entry(record.item_slot).or_default() += 1;
            }
        }
        stats
    }
}
