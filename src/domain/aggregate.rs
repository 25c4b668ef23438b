// Aggregate domain models - the view-model handed to chart and table renderers
use chrono::{Datelike, Month, NaiveDate};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeBucket {
    Month { year: i32, month: u32 },
    Year(i32),
}

impl TimeBucket {
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Month => TimeBucket::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Year => TimeBucket::Year(date.year()),
        }
    }

    /// Every bucket of `year` at the given granularity, ascending
    pub fn all_in_year(year: i32, granularity: Granularity) -> Vec<Self> {
        match granularity {
            Granularity::Month => (1..=12).map(|month| TimeBucket::Month { year, month }).collect(),
            Granularity::Year => vec![TimeBucket::Year(year)],
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            TimeBucket::Month { year, .. } => *year,
            TimeBucket::Year(year) => *year,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            TimeBucket::Month { month, .. } => Some(*month),
            TimeBucket::Year(_) => None,
        }
    }

    /// Stable sort key, e.g. "2024-01" or "2024"
    pub fn key(&self) -> String {
        match self {
            TimeBucket::Month { year, month } => format!("{:04}-{:02}", year, month),
            TimeBucket::Year(year) => format!("{:04}", year),
        }
    }

    /// Axis label, e.g. "January 2024"
    pub fn label(&self) -> String {
        match self {
            TimeBucket::Month { year, month } => {
                let name = u8::try_from(*month)
                    .ok()
                    .and_then(|m| Month::try_from(m).ok())
                    .map(|m| m.name())
                    .unwrap_or("Unknown");
                format!("{} {}", name, year)
            }
            TimeBucket::Year(year) => year.to_string(),
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for TimeBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TimeBucket", 4)?;
        state.serialize_field("bucket", &self.key())?;
        state.serialize_field("label", &self.label())?;
        state.serialize_field("year", &self.year())?;
        state.serialize_field("month", &self.month())?;
        state.end()
    }
}

/// Running count and sum of a metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Tally {
    pub count: usize,
    pub total: f64,
}

impl Tally {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(flatten)]
    pub bucket: TimeBucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub total: f64,
    pub count: usize,
    pub average: f64,
    /// Change against the previous bucket of the same dimension
    pub delta: Option<f64>,
    /// Cumulative total within the bucket's year, up to and including the bucket
    pub ytd: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregateTable {
    pub rows: Vec<AggregateRow>,
    /// Records with no usable date; they belong to no time bucket
    pub undated: Tally,
}

impl AggregateTable {
    pub fn grand_total(&self) -> f64 {
        self.rows.iter().map(|r| r.total).sum::<f64>() + self.undated.total
    }

    pub fn record_count(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum::<usize>() + self.undated.count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub year: i32,
    pub total: f64,
    pub ytd: f64,
    pub mtd: f64,
    pub count: usize,
    pub average: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_labels() {
        let bucket = TimeBucket::Month { year: 2024, month: 1 };
        assert_eq!(bucket.key(), "2024-01");
        assert_eq!(bucket.label(), "January 2024");
        assert_eq!(TimeBucket::Year(2023).label(), "2023");
    }

    #[test]
    fn test_bucket_ordering_is_chronological() {
        let mut buckets = vec![
            TimeBucket::Month { year: 2024, month: 2 },
            TimeBucket::Month { year: 2023, month: 12 },
            TimeBucket::Month { year: 2024, month: 1 },
        ];
        buckets.sort();
        let keys: Vec<String> = buckets.iter().map(TimeBucket::key).collect();
        assert_eq!(keys, vec!["2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_row_serializes_bucket_inline() {
        let row = AggregateRow {
            bucket: TimeBucket::Month { year: 2024, month: 3 },
            dimension: Some("Anthony Alba".into()),
            total: 10.0,
            count: 1,
            average: 10.0,
            delta: None,
            ytd: 10.0,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["bucket"], "2024-03");
        assert_eq!(json["label"], "March 2024");
        assert_eq!(json["month"], 3);
        assert_eq!(json["dimension"], "Anthony Alba");
    }

    #[test]
    fn test_tally_average_of_empty_is_zero() {
        assert_eq!(Tally::default().average(), 0.0);
    }
}
