//! Player registry: the canonical roster, keyed by player name.
//!
//! The registry is loaded once at startup (or on import) and is read-only
//! afterwards. Lookups are case-insensitive; the stored [`Player`] keeps the
//! original spelling of the name.

use crate::error::NotFoundError;
use crate::types::{Player, PrimaryStat, TokenType};
use std::collections::BTreeMap;
use tracing::warn;

/// Normalises a player name into its registry key.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Primary stat for a class/spec pair, when the class is known.
pub fn primary_stat_for(class: &str, spec: &str) -> Option<PrimaryStat> {
    let spec = spec.trim().to_lowercase();
    let stat = match class.trim().to_lowercase().as_str() {
        "death knight" | "deathknight" | "dk" | "warrior" => PrimaryStat::Strength,
        "hunter" | "rogue" => PrimaryStat::Agility,
        "mage" | "priest" | "warlock" => PrimaryStat::Intellect,
        "paladin" => match spec.as_str() {
            "holy" => PrimaryStat::Intellect,
            _ => PrimaryStat::Strength,
        },
        "druid" => match spec.as_str() {
            "feral" | "guardian" => PrimaryStat::Agility,
            _ => PrimaryStat::Intellect,
        },
        "shaman" => match spec.as_str() {
            "enhancement" => PrimaryStat::Agility,
            _ => PrimaryStat::Intellect,
        },
        _ => return None,
    };
    Some(stat)
}

/// Tier token a class turns in.
pub fn token_type_for(class: &str) -> Option<TokenType> {
    match class.trim().to_lowercase().as_str() {
        "death knight" | "deathknight" | "dk" | "druid" | "mage" | "rogue" => Some(TokenType::Vanquisher),
        "paladin" | "priest" | "warlock" => Some(TokenType::Conqueror),
        "hunter" | "shaman" | "warrior" => Some(TokenType::Protector),
        _ => None,
    }
}

/// Read-mostly roster of known players.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<String, Player>,
}

impl PlayerRegistry {
    /// Builds a registry, filling in missing stat and token data from the
    /// player's class. A later entry with the same name replaces an earlier one.
    pub fn new(players: impl IntoIterator<Item = Player>) -> Self {
        let mut map = BTreeMap::new();
        for mut player in players {
            if player.primary_stat.is_none() {
                player.primary_stat = primary_stat_for(&player.class, &player.spec);
            }
            if player.token_type.is_none() {
                player.token_type = token_type_for(&player.class);
            }

            let key = normalize_name(&player.name);
            if key.is_empty() {
                warn!("Skipping roster entry with an empty name");
                continue;
            }
            if let Some(previous) = map.insert(key, player) {
                warn!("Duplicate roster entry for {}, keeping the later one", previous.name);
            }
        }
        Self { players: map }
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.get(&normalize_name(name))
    }

    /// Looks a player up, failing with [`NotFoundError::UnknownPlayer`].
    pub fn resolve(&self, name: &str) -> Result<&Player, NotFoundError> {
        self.get(name)
            .ok_or_else(|| NotFoundError::UnknownPlayer(name.trim().to_string()))
    }

    /// Players in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PlayerRegistry::new(vec![Player::new("Alice", "Warrior", "Protection", Role::Tank)]);
        assert_eq!(registry.get("alice").map(|p| p.class.as_str()), Some("Warrior"));
        assert_eq!(registry.resolve(" ALICE ").unwrap().name, "Alice");
        assert_eq!(
            registry.resolve("Mallory"),
            Err(NotFoundError::UnknownPlayer("Mallory".to_string()))
        );
    }

    #[test]
    fn test_missing_attributes_are_derived() {
        let registry = PlayerRegistry::new(vec![
            Player::new("Bob", "Druid", "Feral", Role::Dps),
            Player::new("Cleo", "Paladin", "Holy", Role::Healer),
            Player::new("Dax", "Tinker", "", Role::Dps),
        ]);

        let bob = registry.get("bob").unwrap();
        assert_eq!(bob.primary_stat, Some(PrimaryStat::Agility));
        assert_eq!(bob.token_type, Some(TokenType::Vanquisher));

        let cleo = registry.get("cleo").unwrap();
        assert_eq!(cleo.primary_stat, Some(PrimaryStat::Intellect));
        assert_eq!(cleo.token_type, Some(TokenType::Conqueror));

        let dax = registry.get("dax").unwrap();
        assert_eq!(dax.primary_stat, None);
        assert_eq!(dax.token_type, None);
    }

    #[test]
    fn test_explicit_attributes_are_kept() {
        let player = Player::new("Eve", "Shaman", "Restoration", Role::Healer)
            .with_primary_stat(PrimaryStat::Agility);
        let registry = PlayerRegistry::new(vec![player]);
        assert_eq!(registry.get("eve").unwrap().primary_stat, Some(PrimaryStat::Agility));
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let registry = PlayerRegistry::new(vec![
            Player::new("Alice", "Warrior", "Protection", Role::Tank),
            Player::new("alice", "Mage", "Fire", Role::Dps),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Alice").unwrap().class, "Mage");
    }
}
