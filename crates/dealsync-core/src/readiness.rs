use crate::config::GateRules;
use crate::deal::DealRecord;
use crate::types::{DealField, DocsStatus, Stage};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readiness {
    pub stage: Stage,
    /// 0–100, rounded.
    pub percent: u8,
    pub docs_status: DocsStatus,
    pub satisfied: Vec<DealField>,
    pub missing: Vec<DealField>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Which of `stage`'s required fields the record carries.
pub fn evaluate(stage: Stage, record: &DealRecord, rules: &GateRules) -> Readiness {
    let (satisfied, missing): (Vec<DealField>, Vec<DealField>) = rules
        .required_for(stage)
        .iter()
        .copied()
        .partition(|f| record.has(*f));

    let required = satisfied.len() + missing.len();
    let percent = if required == 0 {
        100
    } else {
        ((satisfied.len() as f64 * 100.0) / required as f64).round() as u8
    };

    Readiness {
        stage,
        percent,
        docs_status: docs_status(record),
        satisfied,
        missing,
    }
}

/// Coarse completeness over the document link fields.
pub fn docs_status(record: &DealRecord) -> DocsStatus {
    let links = DealField::links();
    let present = links.iter().filter(|f| record.has(**f)).count();
    DocsStatus::classify(present, links.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_record(links: &[DealField]) -> DealRecord {
        links.iter().fold(DealRecord::new(1, "t"), |r, f| {
            r.with_field(*f, format!("https://docs.example.com/{f}"))
        })
    }

    #[test]
    fn ungated_stage_is_fully_ready() {
        let r = evaluate(Stage::FuturePipeline, &DealRecord::new(1, "t"), &GateRules::default());
        assert_eq!(r.percent, 100);
        assert!(r.is_ready());
    }

    #[test]
    fn percent_counts_required_fields_only() {
        let record = DealRecord::new(1, "t")
            .with_field(DealField::Brief, "https://b")
            .with_field(DealField::Scope, "https://s")
            .with_field(DealField::Owner, "7")
            .with_field(DealField::Deadline, "2026-12-01");
        let r = evaluate(Stage::Estimation, &record, &GateRules::default());
        assert_eq!(r.percent, 75);
        assert_eq!(r.missing, vec![DealField::Budget]);
        assert!(!r.is_ready());
    }

    #[test]
    fn percent_rounds() {
        let mut rules = GateRules::default();
        rules.required.insert(
            Stage::Presented,
            vec![DealField::Brief, DealField::Scope, DealField::Owner],
        );
        let record = DealRecord::new(1, "t").with_field(DealField::Brief, "https://b");
        assert_eq!(evaluate(Stage::Presented, &record, &rules).percent, 33);
        let record = record.with_field(DealField::Scope, "https://s");
        assert_eq!(evaluate(Stage::Presented, &record, &rules).percent, 67);
    }

    #[test]
    fn docs_status_over_link_fields() {
        assert_eq!(docs_status(&link_record(&[])), DocsStatus::NoLinks);
        assert_eq!(
            docs_status(&link_record(&[DealField::Brief, DealField::EstimateLink])),
            DocsStatus::Partial
        );
        assert_eq!(docs_status(&link_record(DealField::links())), DocsStatus::Complete);
    }

    #[test]
    fn non_link_fields_do_not_affect_docs_status() {
        let record = DealRecord::new(1, "t")
            .with_field(DealField::Owner, "7")
            .with_field(DealField::Budget, "1000");
        assert_eq!(docs_status(&record), DocsStatus::NoLinks);
    }
}
