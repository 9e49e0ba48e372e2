use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub campus_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Counterpart shown in a conversation summary.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: Option<String>,
}

/// Returns true when `email` belongs to the institutional `domain`
/// (e.g. `student@university.edu` for `university.edu`).
pub fn is_campus_email(email: &str, domain: &str) -> bool {
    let email = email.trim().to_ascii_lowercase();
    let domain = domain.trim().trim_start_matches('@').to_ascii_lowercase();
    match email.rsplit_once('@') {
        Some((local, host)) => !local.is_empty() && !domain.is_empty() && host == domain,
        None => false,
    }
}
