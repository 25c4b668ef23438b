// Aggregator - groups normalized records into time buckets and dimension cells
use crate::domain::aggregate::{AggregateRow, AggregateTable, Granularity, Summary, Tally, TimeBucket};
use crate::domain::record::NormalizedRecord;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct DimensionKey {
    pub field: String,
    pub empty_label: String,
}

#[derive(Debug, Clone)]
pub struct GroupingSpec {
    pub metric: String,
    pub date_field: String,
    pub granularity: Granularity,
    pub dimension: Option<DimensionKey>,
}

impl GroupingSpec {
    fn dimension_of(&self, record: &NormalizedRecord) -> Option<String> {
        let dim = self.dimension.as_ref()?;
        let value = record.get(&dim.field).display();
        let value = value.trim();
        if value.is_empty() {
            Some(dim.empty_label.clone())
        } else {
            Some(value.to_string())
        }
    }
}

type CellKey = (TimeBucket, Option<String>);

/// Groups records by (bucket, dimension) in one pass, then derives delta and YTD.
///
/// Records sharing a bucket and dimension value are merged into one row. Undated
/// records are tallied separately when no year is selected; with a year filter
/// only records dated in that year are considered, and every bucket of the year
/// is emitted for every known dimension value, zero-filled.
pub fn aggregate(records: &[NormalizedRecord], spec: &GroupingSpec, year: Option<i32>) -> AggregateTable {
    if records.is_empty() {
        return AggregateTable::default();
    }

    let mut cells: BTreeMap<CellKey, Tally> = BTreeMap::new();
    let mut undated = Tally::default();
    let mut known_dimensions: BTreeSet<Option<String>> = BTreeSet::new();

    for record in records {
        let dimension = spec.dimension_of(record);
        known_dimensions.insert(dimension.clone());
        let value = record.number(&spec.metric);

        let Some(date) = record.date(&spec.date_field) else {
            if year.is_none() {
                undated.add(value);
            }
            continue;
        };

        if year.is_some_and(|y| date.year() != y) {
            continue;
        }

        let bucket = TimeBucket::for_date(date, spec.granularity);
        cells.entry((bucket, dimension)).or_default().add(value);
    }

    if let Some(year) = year {
        for bucket in TimeBucket::all_in_year(year, spec.granularity) {
            for dimension in &known_dimensions {
                cells.entry((bucket, dimension.clone())).or_default();
            }
        }
    }

    AggregateTable {
        rows: derive_rows(cells),
        undated,
    }
}

fn derive_rows(cells: BTreeMap<CellKey, Tally>) -> Vec<AggregateRow> {
    struct Running {
        previous: Option<f64>,
        year: i32,
        ytd: f64,
    }

    let mut running: HashMap<Option<String>, Running> = HashMap::new();
    let mut rows = Vec::with_capacity(cells.len());

    // BTreeMap order is bucket ascending, then dimension ascending
    for ((bucket, dimension), tally) in cells {
        let state = running.entry(dimension.clone()).or_insert(Running {
            previous: None,
            year: bucket.year(),
            ytd: 0.0,
        });

        if state.year != bucket.year() {
            state.year = bucket.year();
            state.ytd = 0.0;
        }
        state.ytd += tally.total;
        let delta = state.previous.map(|p| tally.total - p);
        state.previous = Some(tally.total);

        rows.push(AggregateRow {
            bucket,
            dimension,
            total: tally.total,
            count: tally.count,
            average: tally.average(),
            delta,
            ytd: state.ytd,
        });
    }

    rows
}

/// Headline figures for `year`. MTD covers `as_of`'s month; for the current year
/// both YTD and MTD stop at `as_of`.
pub fn summarize(records: &[NormalizedRecord], spec: &GroupingSpec, year: i32, as_of: NaiveDate) -> Summary {
    let is_current_year = year == as_of.year();
    let mut all = Tally::default();
    let mut ytd = 0.0;
    let mut mtd = 0.0;

    for record in records {
        let Some(date) = record.date(&spec.date_field) else {
            continue;
        };
        if date.year() != year {
            continue;
        }

        let value = record.number(&spec.metric);
        all.add(value);

        let to_date = !is_current_year || date <= as_of;
        if to_date {
            ytd += value;
            if date.month() == as_of.month() {
                mtd += value;
            }
        }
    }

    Summary {
        year,
        total: all.total,
        ytd,
        mtd,
        count: all.count,
        average: all.average(),
    }
}

/// Distinct years among dated records, ascending
pub fn available_years(records: &[NormalizedRecord], date_field: &str) -> Vec<i32> {
    let years: BTreeSet<i32> = records.iter().filter_map(|r| r.year(date_field)).collect();
    years.into_iter().collect()
}
