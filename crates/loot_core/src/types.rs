//! Core data types shared by the registry, history, scoring and session code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A string did not name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognised {kind}: {value}")]
pub struct UnrecognisedValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnrecognisedValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Group-function classification used for priority adjustment.
///
/// Serialised as `Tank`, `Healer` or `DPS`; read back through [`FromStr`], so
/// every roster spelling it accepts also loads from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Tank,
    Healer,
    Dps,
}

impl TryFrom<String> for Role {
    type Error = UnrecognisedValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl FromStr for Role {
    type Err = UnrecognisedValue;

    /// Accepts the plain role names plus the "melee dps" / "ranged dps"
    /// spellings found in imported rosters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "tank" | "main tank" | "offtank" | "off tank" => Ok(Role::Tank),
            "healer" | "heal" | "heals" => Ok(Role::Healer),
            "dps" | "damage" | "melee dps" | "ranged dps" | "melee" | "ranged" => Ok(Role::Dps),
            _ => Err(UnrecognisedValue::new("role", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Tank => "Tank",
            Role::Healer => "Healer",
            Role::Dps => "DPS",
        };
        f.write_str(name)
    }
}

/// Raid token category exchanged for class-specific tier gear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(alias = "vanquisher")]
    Vanquisher,
    #[serde(alias = "conqueror")]
    Conqueror,
    #[serde(alias = "protector")]
    Protector,
}

impl FromStr for TokenType {
    type Err = UnrecognisedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vanquisher" => Ok(TokenType::Vanquisher),
            "conqueror" => Ok(TokenType::Conqueror),
            "protector" => Ok(TokenType::Protector),
            _ => Err(UnrecognisedValue::new("token type", s)),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::Vanquisher => "Vanquisher",
            TokenType::Conqueror => "Conqueror",
            TokenType::Protector => "Protector",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimaryStat {
    #[serde(alias = "strength")]
    Strength,
    #[serde(alias = "agility")]
    Agility,
    #[serde(alias = "intellect")]
    Intellect,
}

impl FromStr for PrimaryStat {
    type Err = UnrecognisedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strength" | "str" => Ok(PrimaryStat::Strength),
            "agility" | "agi" => Ok(PrimaryStat::Agility),
            "intellect" | "int" => Ok(PrimaryStat::Intellect),
            _ => Err(UnrecognisedValue::new("stat", s)),
        }
    }
}

impl fmt::Display for PrimaryStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimaryStat::Strength => "Strength",
            PrimaryStat::Agility => "Agility",
            PrimaryStat::Intellect => "Intellect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Token,
    Gear,
}

impl FromStr for ItemType {
    type Err = UnrecognisedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" => Ok(ItemType::Token),
            "gear" | "item" => Ok(ItemType::Gear),
            _ => Err(UnrecognisedValue::new("item type", s)),
        }
    }
}

/// Equipment slot an item (or the piece a token converts into) occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemSlot {
    Head,
    Neck,
    Shoulder,
    Back,
    Chest,
    Wrist,
    Hands,
    Waist,
    Legs,
    Feet,
    Finger,
    Trinket,
    Weapon,
    #[serde(rename = "off-hand")]
    OffHand,
    Ranged,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ItemSlot {
    /// Relative value of the slot when weighting past awards.
    pub fn weight(self) -> f64 {
        match self {
            ItemSlot::Head
            | ItemSlot::Chest
            | ItemSlot::Legs
            | ItemSlot::Weapon
            | ItemSlot::Trinket => 1.5,
            ItemSlot::Shoulder | ItemSlot::Hands => 1.3,
            ItemSlot::Waist | ItemSlot::Feet | ItemSlot::Back | ItemSlot::OffHand => 1.2,
            ItemSlot::Wrist => 1.1,
            ItemSlot::Neck | ItemSlot::Finger | ItemSlot::Ranged | ItemSlot::Unknown => 1.0,
        }
    }
}

impl FromStr for ItemSlot {
    type Err = UnrecognisedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slot = match s.trim().to_lowercase().as_str() {
            "head" => ItemSlot::Head,
            "neck" => ItemSlot::Neck,
            "shoulder" | "shoulders" => ItemSlot::Shoulder,
            "back" => ItemSlot::Back,
            "chest" => ItemSlot::Chest,
            "wrist" => ItemSlot::Wrist,
            "hands" => ItemSlot::Hands,
            "waist" => ItemSlot::Waist,
            "legs" => ItemSlot::Legs,
            "feet" => ItemSlot::Feet,
            "finger" => ItemSlot::Finger,
            "trinket" => ItemSlot::Trinket,
            "weapon" => ItemSlot::Weapon,
            "off-hand" | "offhand" => ItemSlot::OffHand,
            "ranged" => ItemSlot::Ranged,
            "unknown" => ItemSlot::Unknown,
            _ => return Err(UnrecognisedValue::new("item slot", s)),
        };
        Ok(slot)
    }
}

/// Raid group size a record was awarded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum RaidSize {
    Ten,
    #[default]
    TwentyFive,
}

impl TryFrom<u8> for RaidSize {
    type Error = UnrecognisedValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(RaidSize::Ten),
            25 => Ok(RaidSize::TwentyFive),
            other => Err(UnrecognisedValue::new("raid size", &other.to_string())),
        }
    }
}

impl From<RaidSize> for u8 {
    fn from(size: RaidSize) -> Self {
        match size {
            RaidSize::Ten => 10,
            RaidSize::TwentyFive => 25,
        }
    }
}

/// A canonical roster entry. The name is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub spec: String,
    pub role: Role,
    #[serde(default)]
    pub primary_stat: Option<PrimaryStat>,
    #[serde(default, alias = "token")]
    pub token_type: Option<TokenType>,
}

impl Player {
    pub fn new(name: impl Into<String>, class: impl Into<String>, spec: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            spec: spec.into(),
            role,
            primary_stat: None,
            token_type: None,
        }
    }

    pub fn with_primary_stat(mut self, stat: PrimaryStat) -> Self {
        self.primary_stat = Some(stat);
        self
    }
}

/// A single item award. Records are only ever appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootRecord {
    pub player: String,
    pub item: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub item_slot: ItemSlot,
    #[serde(default)]
    pub raid_size: RaidSize,
    pub boss: String,
    pub timestamp: Timestamp,
}

impl LootRecord {
    /// Token category of the item, when it is a recognised token.
    pub fn token_type(&self) -> Option<TokenType> {
        match self.item_type {
            ItemType::Token => crate::items::token_info(&self.item).map(|(token, _)| token),
            ItemType::Gear => None,
        }
    }

    /// Composite key used to suppress duplicate submissions.
    pub fn is_same_award(&self, player: &str, item: &str, timestamp: Timestamp) -> bool {
        self.timestamp == timestamp
            && self.player.eq_ignore_ascii_case(player)
            && self.item.eq_ignore_ascii_case(item)
    }
}
