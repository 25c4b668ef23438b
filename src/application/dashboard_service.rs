// Dashboard service - Use case for building dashboard reports
use crate::application::aggregator::{aggregate, available_years, summarize, DimensionKey, GroupingSpec};
use crate::application::board_repository::{BoardQuery, BoardRepository};
use crate::application::cache::TtlCache;
use crate::application::errors::{DashboardError, FetchError};
use crate::application::normalizer::Normalizer;
use crate::application::record_filter::RecordFilter;
use crate::domain::aggregate::Granularity;
use crate::domain::board::{BoardId, BoardItem};
use crate::domain::dashboard::{DashboardInfo, DashboardReport, DimensionInfo};
use crate::domain::record::NormalizedRecord;
use crate::infrastructure::config::{DashboardsConfig, PipelineConfig};
use chrono::{Datelike, Local, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Selections coming from the dashboard's controls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub year: Option<i32>,
    pub dimension: Option<String>,
    pub granularity: Option<Granularity>,
}

type ItemCache = TtlCache<BoardQuery, Arc<Vec<BoardItem>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Load {
    /// Fresh cache entries are reused
    Cached,
    /// Always go to the repository; the cache is only a fallback
    Refetch,
}

#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn BoardRepository>,
    cache: Arc<ItemCache>,
    dashboards: Arc<DashboardsConfig>,
    page_limit: u32,
}

impl DashboardService {
    pub fn new(
        repository: Arc<dyn BoardRepository>,
        dashboards: DashboardsConfig,
        page_limit: u32,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            cache: Arc::new(TtlCache::new(cache_ttl)),
            dashboards: Arc::new(dashboards),
            page_limit,
        }
    }

    pub fn list_dashboards(&self) -> Vec<DashboardInfo> {
        self.dashboards
            .dashboards
            .iter()
            .map(|d| DashboardInfo {
                id: d.id.clone(),
                title: d.title.clone(),
                boards: d.board_ids.iter().copied().map(BoardId).collect(),
                dimensions: dimension_infos(d),
            })
            .collect()
    }

    pub async fn report(&self, id: &str, query: &ReportQuery) -> Result<DashboardReport, DashboardError> {
        self.report_as_of(id, query, Local::now().date_naive()).await
    }

    /// Refetches every board of the dashboard, ignoring fresh cache entries.
    /// Boards that fail keep their previous entry and are served as stale.
    pub async fn refresh(&self, id: &str, query: &ReportQuery) -> Result<DashboardReport, DashboardError> {
        tracing::info!(dashboard = %id, "Refreshing dashboard");
        self.build_report(id, query, Local::now().date_naive(), Load::Refetch).await
    }

    pub async fn report_as_of(
        &self,
        id: &str,
        query: &ReportQuery,
        as_of: NaiveDate,
    ) -> Result<DashboardReport, DashboardError> {
        self.build_report(id, query, as_of, Load::Cached).await
    }

    async fn build_report(
        &self,
        id: &str,
        query: &ReportQuery,
        as_of: NaiveDate,
        load: Load,
    ) -> Result<DashboardReport, DashboardError> {
        let pipeline = self.pipeline(id)?;
        let spec = grouping_spec(pipeline, query)?;

        let (items, stale) = self.load_items(pipeline, load).await?;

        let records = Normalizer::new(&pipeline.fields, &pipeline.derived).normalize(&items);
        let records = RecordFilter::for_pipeline(pipeline).apply(records);

        let table = aggregate(&records, &spec, query.year);
        let summary = summarize(&records, &spec, query.year.unwrap_or(as_of.year()), as_of);
        let years = available_years(&records, &pipeline.date_field);
        let table_records = data_table(records, &pipeline.date_field, query.year);

        tracing::debug!(
            dashboard = %id,
            rows = table.rows.len(),
            records = table.record_count(),
            total = table.grand_total(),
            stale,
            "Built dashboard report"
        );

        Ok(DashboardReport {
            id: pipeline.id.clone(),
            title: pipeline.title.clone(),
            year: query.year,
            granularity: spec.granularity,
            dimension: spec.dimension.map(|d| d.field),
            available_years: years,
            dimensions: dimension_infos(pipeline),
            summary,
            rows: table.rows,
            undated: table.undated,
            records: table_records,
            stale,
            generated_at: Utc::now(),
        })
    }

    fn pipeline(&self, id: &str) -> Result<&PipelineConfig, DashboardError> {
        self.dashboards
            .dashboards
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| DashboardError::UnknownDashboard(id.to_string()))
    }

    /// Items of every board of the pipeline. Boards are fetched one after another.
    /// The flag is set when any board was served from an expired entry.
    async fn load_items(&self, pipeline: &PipelineConfig, load: Load) -> Result<(Vec<BoardItem>, bool), FetchError> {
        let mut items = Vec::new();
        let mut stale = false;

        for board_id in &pipeline.board_ids {
            let key = BoardQuery::new(BoardId(*board_id), self.page_limit);

            if load == Load::Cached {
                if let Some(cached) = self.cache.get(&key) {
                    tracing::debug!(board_id = %key.board_id, "Cache hit");
                    items.extend(cached.iter().cloned());
                    continue;
                }
            }

            match self.repository.fetch_items(&key).await {
                Ok(fetched) => {
                    let fetched = Arc::new(fetched);
                    items.extend(fetched.iter().cloned());
                    self.cache.insert(key, fetched);
                }
                Err(e) => match self.cache.get_stale(&key) {
                    Some(previous) => {
                        tracing::warn!(board_id = %key.board_id, error = %e, "Fetch failed, serving stale data");
                        stale = true;
                        items.extend(previous.iter().cloned());
                    }
                    None => {
                        tracing::error!(board_id = %key.board_id, error = %e, "Fetch failed");
                        return Err(e);
                    }
                },
            }
        }

        Ok((items, stale))
    }
}

fn dimension_infos(pipeline: &PipelineConfig) -> Vec<DimensionInfo> {
    pipeline
        .dimensions
        .iter()
        .map(|d| DimensionInfo {
            field: d.field.clone(),
            label: d.label.clone(),
        })
        .collect()
}

fn grouping_spec(pipeline: &PipelineConfig, query: &ReportQuery) -> Result<GroupingSpec, DashboardError> {
    let dimension = match query.dimension.as_deref().filter(|d| !d.is_empty()) {
        None => None,
        Some(key) => {
            let dim = pipeline.dimension(key).ok_or_else(|| DashboardError::UnknownDimension {
                dashboard: pipeline.id.clone(),
                dimension: key.to_string(),
            })?;
            Some(DimensionKey {
                field: dim.field.clone(),
                empty_label: dim.empty_label.clone(),
            })
        }
    };

    Ok(GroupingSpec {
        metric: pipeline.metric.clone(),
        date_field: pipeline.date_field.clone(),
        granularity: query.granularity.unwrap_or(pipeline.granularity),
        dimension,
    })
}

/// Rows for the data table: the selected year only, by date with undated rows last
fn data_table(records: Vec<NormalizedRecord>, date_field: &str, year: Option<i32>) -> Vec<NormalizedRecord> {
    let mut rows: Vec<NormalizedRecord> = records
        .into_iter()
        .filter(|r| year.is_none_or(|y| r.year(date_field) == Some(y)))
        .collect();
    rows.sort_by_key(|r| (r.date(date_field).is_none(), r.date(date_field)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::ColumnValue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryRepository {
        boards: Mutex<HashMap<BoardId, Result<Vec<BoardItem>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl InMemoryRepository {
        fn set(&self, board: u64, result: Result<Vec<BoardItem>, FetchError>) {
            self.boards.lock().unwrap().insert(BoardId(board), result);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BoardRepository for InMemoryRepository {
        async fn fetch_items(&self, query: &BoardQuery) -> Result<Vec<BoardItem>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.boards
                .lock()
                .unwrap()
                .get(&query.board_id)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::BoardNotFound {
                        board_id: query.board_id,
                        message: "unknown".into(),
                    })
                })
        }
    }

    const DASHBOARDS: &str = r#"
        [[dashboards]]
        id = "ads"
        title = "Google Ads Attribution"
        board_ids = [10]
        metric = "spend"
        date_field = "attribution_date"

        [[dashboards.fields]]
        name = "attribution_date"
        columns = ["Attribution Date"]
        kind = "date"

        [[dashboards.fields]]
        name = "spend"
        columns = ["Google Adspend"]
        kind = "number"
        default = "zero"

        [[dashboards.dimensions]]
        field = "item"
        label = "Campaign"

        [[dashboards]]
        id = "sales"
        title = "Sales"
        board_ids = [20, 21]
        metric = "total_value"
        date_field = "close_date"
        non_negative_any_of = ["contract_amount", "numbers3"]

        [[dashboards.fields]]
        name = "close_date"
        columns = ["date_mktq7npm"]
        kind = "date"

        [[dashboards.fields]]
        name = "lead_status"
        columns = ["color_mknxd1j2"]
        kind = "text"
        default = "zero"

        [[dashboards.fields]]
        name = "contract_amount"
        columns = ["contract_amt"]
        kind = "number"

        [[dashboards.fields]]
        name = "numbers3"
        columns = ["numbers3"]
        kind = "number"

        [[dashboards.fields]]
        name = "salesman"
        columns = ["person"]
        kind = "text"
        default = "zero"

        [[dashboards.derived]]
        name = "total_value"
        first_nonzero_of = ["contract_amount", "numbers3"]

        [[dashboards.filters]]
        field = "lead_status"
        equals = "Closed"

        [[dashboards.dimensions]]
        field = "salesman"
        label = "Salesman"
    "#;

    fn col(id: &str, title: &str, text: &str) -> ColumnValue {
        ColumnValue::new(id, title, Some(text.to_string()))
    }

    fn ad(id: &str, date: &str, spend: &str) -> BoardItem {
        BoardItem::new(
            id,
            format!("Campaign {}", id),
            vec![
                col("d", "Attribution Date", date),
                col("n", "Google Adspend", spend),
            ],
        )
    }

    fn deal(id: &str, date: &str, status: &str, contract: &str, numbers3: &str, person: &str) -> BoardItem {
        BoardItem::new(
            id,
            format!("Deal {}", id),
            vec![
                col("date_mktq7npm", "Close Date", date),
                col("color_mknxd1j2", "Lead Status", status),
                col("contract_amt", "Contract Amount", contract),
                col("numbers3", "Numbers3", numbers3),
                col("person", "Assigned", person),
            ],
        )
    }

    fn service(repo: Arc<InMemoryRepository>, ttl: Duration) -> DashboardService {
        let dashboards: DashboardsConfig = toml::from_str(DASHBOARDS).unwrap();
        dashboards.validate().unwrap();
        DashboardService::new(repo, dashboards, 500, ttl)
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
    }

    #[tokio::test]
    async fn test_ads_report_groups_by_month() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(
            10,
            Ok(vec![
                ad("1", "2024-01-02", "100"),
                ad("2", "2024-01-09", "200"),
                ad("3", "2024-01-20", "300"),
                ad("4", "2024-02-01", "50"),
                ad("5", "", "N/A"),
            ]),
        );
        let service = service(repo, Duration::from_secs(300));

        let report = service
            .report_as_of("ads", &ReportQuery::default(), as_of())
            .await
            .unwrap();

        let rows: Vec<(String, f64, usize)> = report
            .rows
            .iter()
            .map(|r| (r.bucket.key(), r.total, r.count))
            .collect();
        assert_eq!(
            rows,
            vec![("2024-01".to_string(), 600.0, 3), ("2024-02".to_string(), 50.0, 1)]
        );
        assert_eq!(report.undated.count, 1);
        assert_eq!(report.available_years, vec![2024]);
        assert_eq!(report.summary.total, 650.0);
        assert_eq!(report.summary.mtd, 50.0);
        assert_eq!(report.records.len(), 5);
        assert!(report.records[4].get("attribution_date").is_null());
        assert!(!report.stale);
    }

    #[tokio::test]
    async fn test_sales_report_filters_closed_and_combines_boards() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(
            20,
            Ok(vec![
                deal("1", "2024-01-10", "Closed", "$1,000", "", "Anthony Alba"),
                deal("2", "2024-01-11", "Open", "$5,000", "", "Anthony Alba"),
                deal("3", "2024-02-01", "Closed", "$0", "250", ""),
            ]),
        );
        repo.set(21, Ok(vec![deal("4", "2023-07-01", "Closed", "", "400", "Jennifer Evans")]));
        let service = service(repo.clone(), Duration::from_secs(300));

        let query = ReportQuery {
            year: Some(2024),
            dimension: Some("Salesman".into()),
            granularity: None,
        };
        let report = service.report_as_of("sales", &query, as_of()).await.unwrap();

        assert_eq!(repo.calls(), 2);
        assert_eq!(report.dimension.as_deref(), Some("salesman"));
        // Twelve months for each of the three known salesmen values
        assert_eq!(report.rows.len(), 36);

        let cell = |month: u32, who: &str| {
            report
                .rows
                .iter()
                .find(|r| r.bucket.month() == Some(month) && r.dimension.as_deref() == Some(who))
                .map(|r| r.total)
                .unwrap()
        };
        assert_eq!(cell(1, "Anthony Alba"), 1000.0);
        assert_eq!(cell(2, "Unassigned"), 250.0);
        assert_eq!(cell(7, "Jennifer Evans"), 0.0);

        assert_eq!(report.summary.year, 2024);
        assert_eq!(report.summary.ytd, 1250.0);
        assert_eq!(report.summary.count, 2);
        assert_eq!(report.available_years, vec![2023, 2024]);
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_cached_items_are_reused_until_refresh() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(10, Ok(vec![ad("1", "2024-01-02", "100")]));
        let service = service(repo.clone(), Duration::from_secs(300));
        let query = ReportQuery::default();

        service.report_as_of("ads", &query, as_of()).await.unwrap();
        service.report_as_of("ads", &query, as_of()).await.unwrap();
        assert_eq!(repo.calls(), 1);

        repo.set(10, Ok(vec![ad("1", "2024-01-02", "100"), ad("2", "2024-01-03", "5")]));
        let report = service.refresh("ads", &query).await.unwrap();
        assert_eq!(repo.calls(), 2);
        assert_eq!(report.summary.count, 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_data() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(10, Ok(vec![ad("1", "2024-01-02", "100")]));
        let service = service(repo.clone(), Duration::ZERO);
        let query = ReportQuery::default();

        let fresh = service.report_as_of("ads", &query, as_of()).await.unwrap();
        assert!(!fresh.stale);

        repo.set(
            10,
            Err(FetchError::TransientNetwork {
                attempts: 4,
                message: "timeout".into(),
            }),
        );
        let stale = service.report_as_of("ads", &query, as_of()).await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.rows, fresh.rows);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_items() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(10, Ok(vec![ad("1", "2024-01-02", "100")]));
        let service = service(repo.clone(), Duration::from_secs(300));
        let query = ReportQuery::default();

        let fresh = service.report_as_of("ads", &query, as_of()).await.unwrap();

        repo.set(
            10,
            Err(FetchError::TransientNetwork {
                attempts: 4,
                message: "timeout".into(),
            }),
        );
        let refreshed = service.refresh("ads", &query).await.unwrap();
        assert!(refreshed.stale);
        assert_eq!(refreshed.rows, fresh.rows);
        assert_eq!(repo.calls(), 2);

        // The entry is still fresh, so later reads keep working without a fetch
        let later = service.report_as_of("ads", &query, as_of()).await.unwrap();
        assert!(!later.stale);
        assert_eq!(later.rows, fresh.rows);
        assert_eq!(repo.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_without_cache_is_surfaced() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(10, Err(FetchError::Auth("bad token".into())));
        let service = service(repo, Duration::from_secs(300));

        let err = service
            .report_as_of("ads", &ReportQuery::default(), as_of())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Fetch(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn test_unknown_dashboard_and_dimension() {
        let repo = Arc::new(InMemoryRepository::default());
        let service = service(repo.clone(), Duration::from_secs(300));

        let err = service.report("marketing", &ReportQuery::default()).await.unwrap_err();
        assert!(matches!(err, DashboardError::UnknownDashboard(_)));

        let query = ReportQuery {
            dimension: Some("region".into()),
            ..ReportQuery::default()
        };
        let err = service.report("ads", &query).await.unwrap_err();
        assert!(matches!(err, DashboardError::UnknownDimension { .. }));
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_board_gives_empty_report() {
        let repo = Arc::new(InMemoryRepository::default());
        repo.set(10, Ok(vec![]));
        let service = service(repo, Duration::from_secs(300));

        let query = ReportQuery {
            year: Some(2024),
            ..ReportQuery::default()
        };
        let report = service.report_as_of("ads", &query, as_of()).await.unwrap();
        assert!(report.rows.is_empty());
        assert!(report.available_years.is_empty());
        assert_eq!(report.summary.total, 0.0);
        assert_eq!(report.summary.average, 0.0);
    }

    #[test]
    fn test_list_dashboards() {
        let service = service(Arc::new(InMemoryRepository::default()), Duration::from_secs(1));
        let list = service.list_dashboards();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].boards, vec![BoardId(20), BoardId(21)]);
        assert_eq!(list[1].dimensions[0].label, "Salesman");
    }
}
