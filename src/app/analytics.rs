use anyhow::{anyhow, Result};
use sqlx::Row;

use crate::domain::analytics::{Analytics, CategoryCount, LocationCount};
use crate::domain::item::{Category, ItemKind};
use crate::infra::db::Db;

const TOP_LOCATIONS: i64 = 10;

#[derive(Clone)]
pub struct AnalyticsService {
    db: Db,
}

impl AnalyticsService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Dashboard figures, all computed from stored rows.
    pub async fn snapshot(&self) -> Result<Analytics> {
        let pool = self.db.pool();

        let totals = sqlx::query(
            "SELECT \
                 COUNT(*) FILTER (WHERE kind = 'lost') AS lost_count, \
                 COUNT(*) FILTER (WHERE kind = 'found') AS found_count, \
                 COUNT(*) FILTER (WHERE kind = 'lost' AND is_resolved) AS resolved_lost, \
                 COUNT(*) FILTER (WHERE kind = 'found' AND is_resolved) AS resolved_found, \
                 COUNT(*) FILTER (WHERE created_at >= now() - interval '30 days') AS recent, \
                 COUNT(*) FILTER (WHERE created_at < now() - interval '30 days' \
                                    AND created_at >= now() - interval '60 days') AS previous \
             FROM items",
        )
        .fetch_one(pool)
        .await?;

        let lost_count: i64 = totals.get("lost_count");
        let found_count: i64 = totals.get("found_count");
        let resolved_lost: i64 = totals.get("resolved_lost");
        let resolved_found: i64 = totals.get("resolved_found");
        let recent: i64 = totals.get("recent");
        let previous: i64 = totals.get("previous");

        let active_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        let message_volume: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(pool)
            .await?;
        let pending_reports: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_reports WHERE status = 'pending'")
                .fetch_one(pool)
                .await?;
        let items_matched: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items i \
             WHERE EXISTS ( \
                 SELECT 1 FROM messages m WHERE m.item_low = i.id OR m.item_high = i.id \
             )",
        )
        .fetch_one(pool)
        .await?;

        let category_rows = sqlx::query(
            "SELECT category, kind, COUNT(*) AS total FROM items GROUP BY category, kind",
        )
        .fetch_all(pool)
        .await?;
        let mut category_counts = Vec::with_capacity(category_rows.len());
        for row in &category_rows {
            let category: String = row.get("category");
            let kind: String = row.get("kind");
            category_counts.push((
                Category::parse(&category).ok_or_else(|| anyhow!("unknown category: {}", category))?,
                ItemKind::from_db(&kind).ok_or_else(|| anyhow!("unknown item kind: {}", kind))?,
                row.get::<i64, _>("total"),
            ));
        }

        let location_rows = sqlx::query(
            "SELECT MIN(trim(location)) AS name, COUNT(*) AS total FROM items \
             GROUP BY lower(trim(location)) \
             ORDER BY total DESC, name ASC \
             LIMIT $1",
        )
        .bind(TOP_LOCATIONS)
        .fetch_all(pool)
        .await?;
        let by_location = location_rows
            .iter()
            .map(|row| LocationCount {
                name: row.get("name"),
                value: row.get("total"),
            })
            .collect();

        let items_reported = lost_count + found_count;
        let items_recovered = resolved_lost + resolved_found;

        Ok(Analytics {
            items_reported,
            lost_count,
            found_count,
            items_recovered,
            resolved_lost,
            resolved_found,
            recovery_rate: recovery_rate(items_recovered, items_reported),
            items_matched,
            active_users,
            message_volume,
            pending_reports,
            growth: growth_percent(recent, previous),
            by_category: by_category(&category_counts),
            by_location,
        })
    }
}

/// Every category appears, zero-filled, in declaration order.
pub fn by_category(counts: &[(Category, ItemKind, i64)]) -> Vec<CategoryCount> {
    Category::ALL
        .iter()
        .map(|category| {
            let count_of = |kind: ItemKind| {
                counts
                    .iter()
                    .filter(|(c, k, _)| c == category && *k == kind)
                    .map(|(_, _, total)| total)
                    .sum::<i64>()
            };
            let lost = count_of(ItemKind::Lost);
            let found = count_of(ItemKind::Found);
            CategoryCount {
                name: *category,
                lost,
                found,
                value: lost + found,
            }
        })
        .collect()
}

pub fn recovery_rate(recovered: i64, reported: i64) -> Option<f64> {
    if reported <= 0 {
        return None;
    }
    Some(round_one_decimal(recovered as f64 * 100.0 / reported as f64))
}

pub fn growth_percent(recent: i64, previous: i64) -> Option<f64> {
    if previous <= 0 {
        return None;
    }
    Some(round_one_decimal(
        (recent - previous) as f64 * 100.0 / previous as f64,
    ))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
