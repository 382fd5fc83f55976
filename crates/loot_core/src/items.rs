//! Item catalogue: recognises raid tokens by name and infers gear slots.

use crate::types::{ItemSlot, ItemType, TokenType};
use serde::{Deserialize, Serialize};

/// Suffix some exported loot tables append to every item name.
const EXPORT_SUFFIX: &str = " - item - cataclysm classic";

/// Classification of an awarded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub item_type: ItemType,
    pub token_type: Option<TokenType>,
    pub slot: ItemSlot,
}

fn clean_name(item_name: &str) -> String {
    let lower = item_name.trim().to_lowercase();
    match lower.strip_suffix(EXPORT_SUFFIX) {
        Some(stripped) => stripped.trim().to_string(),
        None => lower,
    }
}

/// Returns the token category and slot for a tier token name such as
/// "Crown of the Corrupted Protector".
pub fn token_info(item_name: &str) -> Option<(TokenType, ItemSlot)> {
    let name = clean_name(item_name);
    let (piece, token) = name.split_once(" of the corrupted ")?;

    let slot = match piece {
        "crown" => ItemSlot::Head,
        "shoulders" => ItemSlot::Shoulder,
        "chest" => ItemSlot::Chest,
        "gauntlets" => ItemSlot::Hands,
        "leggings" => ItemSlot::Legs,
        _ => return None,
    };

    let token = token.parse::<TokenType>().ok()?;
    Some((token, slot))
}

/// Best-effort slot guess from keywords in a gear item name.
pub fn infer_slot(item_name: &str) -> ItemSlot {
    const KEYWORDS: &[(&[&str], ItemSlot)] = &[
        (&["helm", "hood", "crown", "circlet", "cowl", "headguard", "faceguard"], ItemSlot::Head),
        (&["necklace", "amulet", "choker", "pendant", "links"], ItemSlot::Neck),
        (&["shoulder", "spaulder", "pauldron", "mantle", "shoulderguard"], ItemSlot::Shoulder),
        (&["cloak", "cape", "drape", "shroud"], ItemSlot::Back),
        (&["chest", "robe", "breastplate", "tunic", "vest", "hauberk", "raiment"], ItemSlot::Chest),
        (&["bracer", "wristguard", "wristwrap", "cuffs", "bindings"], ItemSlot::Wrist),
        (&["glove", "gauntlet", "handguard", "grips", "handwraps", "fists"], ItemSlot::Hands),
        (&["belt", "girdle", "cord", "waistguard", "sash", "clasp"], ItemSlot::Waist),
        (&["leggings", "legguard", "legplates", "pants", "kilt", "breeches", "trousers"], ItemSlot::Legs),
        (&["boots", "treads", "sabatons", "greaves", "stompers", "footguards", "slippers"], ItemSlot::Feet),
        (&["ring", "band", "loop", "signet", "seal"], ItemSlot::Finger),
        (&["trinket", "eye of", "heart of", "vial", "insignia", "idol", "bone-link", "fetish"], ItemSlot::Trinket),
        (&["shield", "barrier", "bulwark", "tome", "orb", "lantern"], ItemSlot::OffHand),
        (&["bow", "gun", "rifle", "crossbow", "wand", "thrown", "blowgun"], ItemSlot::Ranged),
        (
            &["sword", "axe", "mace", "dagger", "staff", "polearm", "blade", "hammer", "spear", "claw", "kris", "scepter", "gavel"],
            ItemSlot::Weapon,
        ),
    ];

    let name = clean_name(item_name);
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| name.contains(w)))
        .map(|(_, slot)| *slot)
        .unwrap_or(ItemSlot::Unknown)
}

/// Classifies an item. An explicit slot always wins over inference.
pub fn classify(item_name: &str, explicit_slot: Option<ItemSlot>) -> ItemInfo {
    if let Some((token, slot)) = token_info(item_name) {
        return ItemInfo {
            item_type: ItemType::Token,
            token_type: Some(token),
            slot: explicit_slot.unwrap_or(slot),
        };
    }

    ItemInfo {
        item_type: ItemType::Gear,
        token_type: None,
        slot: explicit_slot.unwrap_or_else(|| infer_slot(item_name)),
    }
}
