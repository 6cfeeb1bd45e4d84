use crate::readiness::Readiness;
use crate::types::{DocsStatus, SlaColor};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFields {
    pub days_in_stage: i64,
    pub sla_color: SlaColor,
    pub readiness_percent: u8,
    pub docs_status: DocsStatus,
}

/// Whole days since `changed_at`, floored and never negative. An unknown
/// change time counts as "just now".
pub fn days_in_stage(changed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    changed_at
        .map(|ts| (now - ts).num_days().max(0))
        .unwrap_or(0)
}

pub fn derive(
    changed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    readiness: &Readiness,
) -> DerivedFields {
    let days = days_in_stage(changed_at, now);
    DerivedFields {
        days_in_stage: days,
        sla_color: SlaColor::from_days(days),
        readiness_percent: readiness.percent,
        docs_status: readiness.docs_status,
    }
}
