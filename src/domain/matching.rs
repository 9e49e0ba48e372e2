use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const UUID_TEXT_LEN: usize = 36;

/// Conversation identity for a pair of items.
///
/// The two ids are stored in ascending order, so the pair resolves to the
/// same value no matter which side opened the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn for_items(a: Uuid, b: Uuid) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}-{}", low.hyphenated(), high.hyphenated()))
    }

    /// Parses `<uuid>-<uuid>` in either order. Returns `None` for anything
    /// else, including a pair made of the same item twice.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() != UUID_TEXT_LEN * 2 + 1 || !value.is_ascii() {
            return None;
        }
        let (first, rest) = value.split_at(UUID_TEXT_LEN);
        let second = rest.strip_prefix('-')?;
        let a = Uuid::parse_str(first).ok()?;
        let b = Uuid::parse_str(second).ok()?;
        if a == b {
            return None;
        }
        Some(Self::for_items(a, b))
    }

    pub fn items(&self) -> (Uuid, Uuid) {
        let (low, rest) = self.0.split_at(UUID_TEXT_LEN);
        // Constructed only from two valid ids.
        let low = Uuid::parse_str(low).unwrap_or_default();
        let high = Uuid::parse_str(&rest[1..]).unwrap_or_default();
        (low, high)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ranked candidate for a target item. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub item_id: Uuid,
    pub score: u8,
    pub reason: String,
    pub match_id: MatchId,
}
