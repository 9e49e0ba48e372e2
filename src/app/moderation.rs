use anyhow::anyhow;
use sqlx::postgres::PgRow;
use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::moderation::{ReportStatus, UserReport};
use crate::infra::db::{self, Db, FOREIGN_KEY_VIOLATION};

const REPORT_COLUMNS: &str = "id, reporter_id, reported_user_id, reason, message_id, status, \
                              resolved_by, resolved_at, created_at";

const REPORT_MESSAGE_FK: &str = "user_reports_message_id_fkey";

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("user not found")]
    UserNotFound,
    #[error("message not found")]
    MessageNotFound,
    #[error("report already resolved")]
    AlreadyResolved,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ModerationError {
    fn from(err: sqlx::Error) -> Self {
        if db::error_code(&err).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return match db::violated_constraint(&err).as_deref() {
                Some(REPORT_MESSAGE_FK) => ModerationError::MessageNotFound,
                _ => ModerationError::UserNotFound,
            };
        }
        ModerationError::Storage(err.into())
    }
}

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Records `blocker_id -> blocked_id`. Returns false when the row already
    /// existed. Blocks are permanent.
    pub async fn block(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool, ModerationError> {
        let inserted = sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id) VALUES ($1, $2) \
             ON CONFLICT (blocker_id, blocked_id) DO NOTHING \
             RETURNING id",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_optional(self.db.pool())
        .await?;

        if inserted.is_some() {
            tracing::info!(blocker_id = %blocker_id, blocked_id = %blocked_id, "user blocked");
        }
        Ok(inserted.is_some())
    }

    pub async fn report_user(
        &self,
        reporter_id: Uuid,
        reported_user_id: Uuid,
        reason: &str,
        message_id: Option<Uuid>,
    ) -> Result<UserReport, ModerationError> {
        let sql = format!(
            "INSERT INTO user_reports (reporter_id, reported_user_id, reason, message_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            REPORT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(reporter_id)
            .bind(reported_user_id)
            .bind(reason.trim())
            .bind(message_id)
            .fetch_one(self.db.pool())
            .await?;

        let report = report_from_row(&row)?;
        tracing::info!(
            report_id = %report.id,
            reporter_id = %reporter_id,
            reported_user_id = %reported_user_id,
            "user reported"
        );
        Ok(report)
    }

    pub async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> anyhow::Result<Vec<UserReport>> {
        let (cursor_at, cursor_id) = cursor.unzip();
        let sql = format!(
            "SELECT {} FROM user_reports \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::timestamptz IS NULL OR created_at < $2 OR (created_at = $2 AND id < $3)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4",
            REPORT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.as_db()))
            .bind(cursor_at)
            .bind(cursor_id)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(report_from_row).collect()
    }

    /// Moves a pending report to resolved. `Ok(None)` when the report does not
    /// exist.
    pub async fn resolve_report(
        &self,
        report_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Option<UserReport>, ModerationError> {
        let sql = format!(
            "UPDATE user_reports \
             SET status = 'resolved', resolved_by = $2, resolved_at = now() \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {}",
            REPORT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(report_id)
            .bind(admin_id)
            .fetch_optional(self.db.pool())
            .await?;

        if let Some(row) = row {
            let report = report_from_row(&row)?;
            tracing::info!(report_id = %report_id, admin_id = %admin_id, "report resolved");
            return Ok(Some(report));
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_reports WHERE id = $1)")
                .bind(report_id)
                .fetch_one(self.db.pool())
                .await?;
        if exists {
            Err(ModerationError::AlreadyResolved)
        } else {
            Ok(None)
        }
    }
}

fn report_from_row(row: &PgRow) -> anyhow::Result<UserReport> {
    let status: String = row.get("status");
    let status =
        ReportStatus::from_db(&status).ok_or_else(|| anyhow!("unknown report status: {}", status))?;

    Ok(UserReport {
        id: row.get("id"),
        reporter_id: row.get("reporter_id"),
        reported_user_id: row.get("reported_user_id"),
        reason: row.get("reason"),
        message_id: row.get("message_id"),
        status,
        resolved_by: row.get("resolved_by"),
        resolved_at: row.get("resolved_at"),
        created_at: row.get("created_at"),
    })
}
