use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 40;

/// A lost or found report. The variant lives in `report`, which serializes
/// as an explicit `type` discriminant next to the matching date field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub report: ItemReport,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub is_resolved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.report.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemReport {
    Lost {
        #[serde(with = "time::serde::rfc3339")]
        date_lost: OffsetDateTime,
    },
    Found {
        #[serde(with = "time::serde::rfc3339")]
        date_found: OffsetDateTime,
    },
}

impl ItemReport {
    pub fn new(kind: ItemKind, occurred_at: OffsetDateTime) -> Self {
        match kind {
            ItemKind::Lost => Self::Lost {
                date_lost: occurred_at,
            },
            ItemKind::Found => Self::Found {
                date_found: occurred_at,
            },
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Lost { .. } => ItemKind::Lost,
            Self::Found { .. } => ItemKind::Found,
        }
    }

    pub fn occurred_at(&self) -> OffsetDateTime {
        match self {
            Self::Lost { date_lost } => *date_lost,
            Self::Found { date_found } => *date_found,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "lost" => Some(Self::Lost),
            "found" => Some(Self::Found),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Found => "found",
        }
    }

    /// The pool a target of this kind is matched against.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Lost => Self::Found,
            Self::Found => Self::Lost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Electronics,
    Bags,
    Clothing,
    #[serde(rename = "Personal Effects")]
    PersonalEffects,
    Documents,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Electronics,
        Category::Bags,
        Category::Clothing,
        Category::PersonalEffects,
        Category::Documents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electronics => "Electronics",
            Self::Bags => "Bags",
            Self::Clothing => "Clothing",
            Self::PersonalEffects => "Personal Effects",
            Self::Documents => "Documents",
        }
    }

    /// Accepts the display name in any letter case.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(value))
    }
}

/// Lower-cased title words merged with client supplied tags.
pub fn derive_tags(title: &str, extra: &[String]) -> Vec<String> {
    let words = title.split_whitespace().map(str::to_string);
    let tags: BTreeSet<String> = words
        .chain(extra.iter().cloned())
        .map(|tag| {
            tag.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|tag| !tag.is_empty() && tag.chars().count() <= MAX_TAG_LEN)
        .collect();
    tags.into_iter().take(MAX_TAGS).collect()
}
