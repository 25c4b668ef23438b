// Record filters applied between normalization and aggregation
use crate::domain::record::{FieldValue, NormalizedRecord};
use crate::infrastructure::config::{FilterSpec, PipelineConfig};

pub struct RecordFilter<'a> {
    equals: &'a [FilterSpec],
    non_negative_any_of: &'a [String],
}

impl<'a> RecordFilter<'a> {
    pub fn for_pipeline(pipeline: &'a PipelineConfig) -> Self {
        Self {
            equals: &pipeline.filters,
            non_negative_any_of: &pipeline.non_negative_any_of,
        }
    }

    pub fn accepts(&self, record: &NormalizedRecord) -> bool {
        let equals_ok = self
            .equals
            .iter()
            .all(|f| record.get(&f.field).display().trim() == f.equals);

        equals_ok && self.sign_ok(record)
    }

    /// At least one listed field is non-negative, or all of them are null
    fn sign_ok(&self, record: &NormalizedRecord) -> bool {
        if self.non_negative_any_of.is_empty() {
            return true;
        }
        let values: Vec<&FieldValue> = self.non_negative_any_of.iter().map(|f| record.get(f)).collect();
        values.iter().all(|v| v.is_null()) || values.iter().any(|v| v.as_number().is_some_and(|n| n >= 0.0))
    }

    pub fn apply(&self, records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
        let before = records.len();
        let kept: Vec<NormalizedRecord> = records.into_iter().filter(|r| self.accepts(r)).collect();
        tracing::debug!("Record filter kept {} of {} records", kept.len(), before);
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_pipeline() -> PipelineConfig {
        toml::from_str(
            r#"
            id = "sales"
            title = "Sales"
            board_ids = [1]
            metric = "total_value"
            date_field = "close_date"
            non_negative_any_of = ["contract_amount", "numbers3"]

            [[filters]]
            field = "lead_status"
            equals = "Closed"
            "#,
        )
        .unwrap()
    }

    fn deal(status: &str, contract: FieldValue, numbers3: FieldValue) -> NormalizedRecord {
        NormalizedRecord::new()
            .with("lead_status", FieldValue::Text(status.into()))
            .with("contract_amount", contract)
            .with("numbers3", numbers3)
    }

    #[test]
    fn test_only_closed_deals_with_a_non_negative_amount_pass() {
        let pipeline = sales_pipeline();
        let filter = RecordFilter::for_pipeline(&pipeline);
        let n = FieldValue::Number;

        assert!(filter.accepts(&deal("Closed", n(100.0), FieldValue::Null)));
        assert!(!filter.accepts(&deal("Open", n(100.0), FieldValue::Null)));
        assert!(filter.accepts(&deal("Closed", FieldValue::Null, FieldValue::Null)));
        // One non-negative amount is enough, even when the other is negative
        assert!(filter.accepts(&deal("Closed", n(-5.0), n(10.0))));
        assert!(!filter.accepts(&deal("Closed", n(-5.0), FieldValue::Null)));
        assert!(!filter.accepts(&deal("Closed", n(-5.0), n(-1.0))));
    }

    #[test]
    fn test_apply_keeps_order() {
        let pipeline = sales_pipeline();
        let filter = RecordFilter::for_pipeline(&pipeline);

        let kept = filter.apply(vec![
            deal("Closed", FieldValue::Number(1.0), FieldValue::Null),
            deal("Open", FieldValue::Number(2.0), FieldValue::Null),
            deal("Closed", FieldValue::Number(3.0), FieldValue::Null),
        ]);
        let amounts: Vec<f64> = kept.iter().map(|r| r.number("contract_amount")).collect();
        assert_eq!(amounts, vec![1.0, 3.0]);
    }
}
