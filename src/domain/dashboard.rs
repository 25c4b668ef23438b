// Dashboard domain model
use super::aggregate::{AggregateRow, Granularity, Summary, Tally};
use super::board::BoardId;
use super::record::NormalizedRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DimensionInfo {
    pub field: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardInfo {
    pub id: String,
    pub title: String,
    pub boards: Vec<BoardId>,
    pub dimensions: Vec<DimensionInfo>,
}

/// Everything a renderer needs for one dashboard view
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub granularity: Granularity,
    pub dimension: Option<String>,
    pub available_years: Vec<i32>,
    pub dimensions: Vec<DimensionInfo>,
    pub summary: Summary,
    pub rows: Vec<AggregateRow>,
    pub undated: Tally,
    pub records: Vec<NormalizedRecord>,
    /// Set when the data comes from an expired cache entry after a failed refresh
    pub stale: bool,
    pub generated_at: DateTime<Utc>,
}
