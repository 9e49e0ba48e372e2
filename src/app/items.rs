use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::item::{derive_tags, Category, Item, ItemKind, ItemReport};
use crate::infra::db::Db;

const ITEM_COLUMNS: &str = "id, user_id, kind, occurred_at, title, description, category, \
                            location, image_url, tags, is_resolved, created_at";

pub struct NewItem {
    pub report: ItemReport,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Default)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub location: Option<String>,
    pub occurred_at: Option<OffsetDateTime>,
    /// `Some(None)` clears the stored image.
    pub image_url: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_resolved: Option<bool>,
}

#[derive(Clone)]
pub struct ItemService {
    db: Db,
}

impl ItemService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: Uuid, item: NewItem) -> Result<Item> {
        let tags = derive_tags(&item.title, &item.tags);
        let sql = format!(
            "INSERT INTO items (user_id, kind, occurred_at, title, description, category, \
                                location, image_url, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(item.report.kind().as_db())
            .bind(item.report.occurred_at())
            .bind(item.title.trim())
            .bind(item.description.trim())
            .bind(item.category.as_str())
            .bind(item.location.trim())
            .bind(item.image_url)
            .bind(tags)
            .fetch_one(self.db.pool())
            .await?;

        item_from_row(&row)
    }

    pub async fn get(&self, item_id: Uuid) -> Result<Option<Item>> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    pub async fn list(
        &self,
        kind: ItemKind,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Item>> {
        let rows = match cursor {
            Some((created_at, item_id)) => {
                let sql = format!(
                    "SELECT {} FROM items \
                     WHERE kind = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                    ITEM_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(kind.as_db())
                    .bind(created_at)
                    .bind(item_id)
                    .bind(limit)
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM items \
                     WHERE kind = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                    ITEM_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(kind.as_db())
                    .bind(limit)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        rows.iter().map(item_from_row).collect()
    }

    /// Every unresolved item of the opposite kind in the target's category,
    /// newest first. The pool is not truncated.
    pub async fn match_candidates(&self, target: &Item) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM items \
             WHERE kind = $1 \
               AND category = $2 \
               AND is_resolved = false \
               AND id <> $3 \
             ORDER BY created_at DESC, id DESC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(target.kind().counterpart().as_db())
            .bind(target.category.as_str())
            .bind(target.id)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(item_from_row).collect()
    }

    pub async fn update(&self, item_id: Uuid, changes: ItemChanges) -> Result<Option<Item>> {
        let mut tx = self.db.pool().begin().await?;

        let sql = format!("SELECT {} FROM items WHERE id = $1 FOR UPDATE", ITEM_COLUMNS);
        let current = match sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
        {
            Some(row) => item_from_row(&row)?,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let title = changes.title.unwrap_or(current.title);
        let tags = derive_tags(&title, &changes.tags.unwrap_or(current.tags));
        let description = changes.description.unwrap_or(current.description);
        let category = changes.category.unwrap_or(current.category);
        let location = changes.location.unwrap_or(current.location);
        let image_url = changes.image_url.unwrap_or(current.image_url);
        let occurred_at = changes
            .occurred_at
            .unwrap_or_else(|| current.report.occurred_at());
        let is_resolved = changes.is_resolved.unwrap_or(current.is_resolved);

        let sql = format!(
            "UPDATE items \
             SET title = $2, description = $3, category = $4, location = $5, \
                 occurred_at = $6, image_url = $7, tags = $8, is_resolved = $9 \
             WHERE id = $1 \
             RETURNING {}",
            ITEM_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(item_id)
            .bind(title.trim())
            .bind(description.trim())
            .bind(category.as_str())
            .bind(location.trim())
            .bind(occurred_at)
            .bind(image_url)
            .bind(tags)
            .bind(is_resolved)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        item_from_row(&row).map(Some)
    }

    pub async fn delete(&self, item_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn item_from_row(row: &PgRow) -> Result<Item> {
    let kind: String = row.get("kind");
    let kind = ItemKind::from_db(&kind).ok_or_else(|| anyhow!("unknown item kind: {}", kind))?;
    let category: String = row.get("category");
    let category =
        Category::parse(&category).ok_or_else(|| anyhow!("unknown category: {}", category))?;

    Ok(Item {
        id: row.get("id"),
        user_id: row.get("user_id"),
        report: ItemReport::new(kind, row.get("occurred_at")),
        title: row.get("title"),
        description: row.get("description"),
        category,
        location: row.get("location"),
        image_url: row.get("image_url"),
        tags: row.get("tags"),
        is_resolved: row.get("is_resolved"),
        created_at: row.get("created_at"),
    })
}
