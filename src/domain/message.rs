use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::matching::MatchId;
use crate::domain::user::PublicUser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub match_id: MatchId,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub text: String,
    pub is_read: bool,
    pub is_contact_shared: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if self.from_user_id == user_id {
            self.to_user_id
        } else {
            self.from_user_id
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub match_id: MatchId,
    pub other_user: PublicUser,
    pub last_message: Message,
    pub unread_count: i64,
}
