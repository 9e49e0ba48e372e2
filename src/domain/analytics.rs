use serde::Serialize;

use crate::domain::item::Category;

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub items_reported: i64,
    pub lost_count: i64,
    pub found_count: i64,
    pub items_recovered: i64,
    pub resolved_lost: i64,
    pub resolved_found: i64,
    /// Percentage of reported items marked resolved; `None` before any report.
    pub recovery_rate: Option<f64>,
    /// Items referenced by at least one conversation.
    pub items_matched: i64,
    pub active_users: i64,
    pub message_volume: i64,
    pub pending_reports: i64,
    /// Change in items reported over the last 30 days versus the 30 days
    /// before, in percent; `None` when the earlier window is empty.
    pub growth: Option<f64>,
    pub by_category: Vec<CategoryCount>,
    pub by_location: Vec<LocationCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: Category,
    pub lost: i64,
    pub found: i64,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub name: String,
    pub value: i64,
}
