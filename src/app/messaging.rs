use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use sqlx::postgres::PgRow;
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::matching::MatchId;
use crate::domain::message::{ConversationSummary, Message};
use crate::domain::user::PublicUser;
use crate::infra::db::{self, Db, FOREIGN_KEY_VIOLATION};

const MESSAGE_COLUMNS: &str =
    "id, match_id, from_user_id, to_user_id, body, is_read, is_contact_shared, created_at";

#[derive(Debug, Error)]
pub enum SendError {
    #[error("communication blocked")]
    Blocked,
    #[error("recipient not found")]
    RecipientNotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct OutgoingMessage {
    pub match_id: MatchId,
    pub to_user_id: Uuid,
    pub text: String,
    pub is_contact_shared: bool,
}

#[derive(Clone)]
pub struct MessagingService {
    db: Db,
}

impl MessagingService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Persists the message unless a block exists between the two users in
    /// either direction. Check and insert are a single statement.
    pub async fn send(&self, from_user_id: Uuid, message: OutgoingMessage) -> Result<Message, SendError> {
        let (item_low, item_high) = message.match_id.items();
        let sql = format!(
            "INSERT INTO messages (match_id, item_low, item_high, from_user_id, to_user_id, \
                                   body, is_contact_shared) \
             SELECT $1, $2, $3, $4, $5, $6, $7 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM blocks \
                 WHERE (blocker_id = $4 AND blocked_id = $5) \
                    OR (blocker_id = $5 AND blocked_id = $4) \
             ) \
             RETURNING {}",
            MESSAGE_COLUMNS
        );
        let inserted = sqlx::query(&sql)
            .bind(message.match_id.as_str())
            .bind(item_low)
            .bind(item_high)
            .bind(from_user_id)
            .bind(message.to_user_id)
            .bind(message.text.trim())
            .bind(message.is_contact_shared)
            .fetch_optional(self.db.pool())
            .await;

        let row = match inserted {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::info!(
                    from_user_id = %from_user_id,
                    to_user_id = %message.to_user_id,
                    "message rejected by block"
                );
                return Err(SendError::Blocked);
            }
            Err(err) if db::error_code(&err).as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                return Err(SendError::RecipientNotFound);
            }
            Err(err) => return Err(SendError::Storage(err.into())),
        };

        Ok(message_from_row(&row)?)
    }

    /// Messages of the thread visible to `user_id`, oldest first. The fetched
    /// messages addressed to `user_id` are marked read afterwards; the returned
    /// rows still carry their previous read flag.
    pub async fn thread(&self, match_id: &MatchId, user_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages \
             WHERE match_id = $1 AND (from_user_id = $2 OR to_user_id = $2) \
             ORDER BY created_at ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(match_id.as_str())
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let unread = unread_ids(user_id, &messages);
        if !unread.is_empty() {
            let marked = self.mark_delivered(user_id, &unread).await?;
            tracing::debug!(match_id = %match_id, marked, "thread marked read");
        }

        Ok(messages)
    }

    /// Marks exactly the given messages read for their recipient. A message
    /// that arrived after the caller's read is never in `ids`, so it stays
    /// unread.
    pub async fn mark_delivered(&self, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = true \
             WHERE to_user_id = $1 AND is_read = false AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Only the recipient can mark a message read. Returns false when the
    /// message does not exist or is addressed to someone else.
    pub async fn mark_read(&self, message_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = true WHERE id = $1 AND to_user_id = $2",
        )
        .bind(message_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn conversations(&self, user_id: Uuid) -> anyhow::Result<Vec<ConversationSummary>> {
        let sql = format!(
            "SELECT {} FROM messages \
             WHERE from_user_id = $1 OR to_user_id = $1 \
             ORDER BY created_at DESC, id DESC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let threads = group_threads(user_id, messages);
        let counterpart_ids: Vec<Uuid> = threads
            .iter()
            .map(|thread| thread.last_message.counterpart_of(user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let names = self.display_names(&counterpart_ids).await?;

        Ok(threads
            .into_iter()
            .map(|thread| {
                let other_id = thread.last_message.counterpart_of(user_id);
                ConversationSummary {
                    match_id: thread.last_message.match_id.clone(),
                    other_user: PublicUser {
                        id: other_id,
                        name: names.get(&other_id).cloned(),
                    },
                    last_message: thread.last_message,
                    unread_count: thread.unread_count,
                }
            })
            .collect())
    }

    async fn display_names(&self, user_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query("SELECT id, name FROM users WHERE id = ANY($1)")
            .bind(user_ids)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("name")))
            .collect())
    }
}

#[derive(Debug)]
pub struct ThreadDigest {
    pub last_message: Message,
    pub unread_count: i64,
}

/// Groups messages (newest first) by thread. The first message seen for a
/// match id is its latest, so the output keeps recency order.
pub fn group_threads(user_id: Uuid, newest_first: Vec<Message>) -> Vec<ThreadDigest> {
    let mut positions: HashMap<MatchId, usize> = HashMap::new();
    let mut threads: Vec<ThreadDigest> = Vec::new();

    for message in newest_first {
        if !message.involves(user_id) {
            continue;
        }
        let unread = i64::from(message.to_user_id == user_id && !message.is_read);
        match positions.get(&message.match_id) {
            Some(&index) => threads[index].unread_count += unread,
            None => {
                positions.insert(message.match_id.clone(), threads.len());
                threads.push(ThreadDigest {
                    last_message: message,
                    unread_count: unread,
                });
            }
        }
    }

    threads
}

fn message_from_row(row: &PgRow) -> anyhow::Result<Message> {
    let match_id: String = row.get("match_id");
    let match_id =
        MatchId::parse(&match_id).ok_or_else(|| anyhow!("stored match id is invalid: {}", match_id))?;

    Ok(Message {
        id: row.get("id"),
        match_id,
        from_user_id: row.get("from_user_id"),
        to_user_id: row.get("to_user_id"),
        text: row.get("body"),
        is_read: row.get("is_read"),
        is_contact_shared: row.get("is_contact_shared"),
        created_at: row.get("created_at"),
    })
}

/// Ids of the fetched messages still waiting on this recipient.
fn unread_ids(user_id: Uuid, messages: &[Message]) -> Vec<Uuid> {
    messages
        .iter()
        .filter(|m| m.to_user_id == user_id && !m.is_read)
        .map(|m| m.id)
        .collect()
}
