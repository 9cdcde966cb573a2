//! Data model returned by the data service

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Who a payment was refunded to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundType {
    #[serde(rename = "REFUSJON_TIL_ARBEIDSGIVER")]
    ToEmployer,
    #[serde(rename = "REFUSJON_TIL_PERSON")]
    ToPerson,
}

impl std::fmt::Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundType::ToEmployer => write!(f, "to_employer"),
            RefundType::ToPerson => write!(f, "to_person"),
        }
    }
}

/// One resolved payment period for a subject identifier.
///
/// Only `identifier`, `period_start`, `period_end` and `grade` are written to
/// result files. The remaining fields are deserialized so the model matches
/// what the service returns, but they are never persisted.
///
/// # Examples
///
/// ```rust
/// use sluice_common::types::ResultRecord;
///
/// let record: ResultRecord = serde_json::from_str(
///     r#"{"fødselsnummer":"123","fom":"2024-01-01","tom":null,"grad":100.0}"#,
/// ).unwrap();
/// assert_eq!(record.identifier, "123");
/// assert!(record.period_end.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Subject identifier the record was resolved for
    #[serde(rename = "fødselsnummer")]
    pub identifier: String,

    #[serde(rename = "fom")]
    pub period_start: Option<NaiveDate>,

    #[serde(rename = "tom")]
    pub period_end: Option<NaiveDate>,

    #[serde(rename = "grad")]
    pub grade: f64,

    #[serde(rename = "gjenståendeSykedager", default)]
    pub remaining_days: Option<i32>,

    #[serde(rename = "utbetaltTidspunkt", default)]
    pub paid_at: Option<NaiveDateTime>,

    #[serde(rename = "refusjonstype", default)]
    pub refund_type: Option<RefundType>,
}

impl ResultRecord {
    /// Record with only the persisted columns set
    pub fn new(
        identifier: impl Into<String>,
        period_start: Option<NaiveDate>,
        period_end: Option<NaiveDate>,
        grade: f64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            period_start,
            period_end,
            grade,
            remaining_days: None,
            paid_at: None,
            refund_type: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "fødselsnummer": "12345678901",
            "fom": "2024-01-01",
            "tom": "2024-01-31",
            "grad": 69.5,
            "gjenståendeSykedager": 120,
            "utbetaltTidspunkt": "2024-02-01T10:15:30",
            "refusjonstype": "REFUSJON_TIL_ARBEIDSGIVER"
        }"#;

        let record: ResultRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.identifier, "12345678901");
        assert_eq!(record.period_start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(record.period_end, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(record.grade, 69.5);
        assert_eq!(record.remaining_days, Some(120));
        assert!(record.paid_at.is_some());
        assert_eq!(record.refund_type, Some(RefundType::ToEmployer));
    }

    #[test]
    fn test_deserialize_minimal_record_ignores_unknown_fields() {
        let json = r#"{"fødselsnummer":"1","grad":69,"extra":"ignored"}"#;

        let record: ResultRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, ResultRecord::new("1", None, None, 69.0));
    }

    #[test]
    fn test_refund_to_person() {
        let refund: RefundType = serde_json::from_str(r#""REFUSJON_TIL_PERSON""#).unwrap();
        assert_eq!(refund, RefundType::ToPerson);
        assert!(serde_json::from_str::<RefundType>(r#""UNKNOWN""#).is_err());
    }
}
