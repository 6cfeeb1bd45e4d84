use crate::config::GateRules;
use crate::deal::DealRecord;
use crate::types::{DealField, Stage};
use serde::Serialize;

// ---------------------------------------------------------------------------
// GateDecision
// ---------------------------------------------------------------------------

/// Result of checking a proposed stage against its readiness gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub proposed: Stage,
    /// Always `proposed` or a stage before it.
    pub accepted: Stage,
    pub missing: Vec<DealField>,
    pub reason: Option<String>,
}

impl GateDecision {
    pub fn is_blocked(&self) -> bool {
        self.reason.is_some()
    }

    pub fn rolled_back(&self) -> bool {
        self.accepted != self.proposed
    }

    /// "Pass" or "Blocked", as shown on the board.
    pub fn status_label(&self) -> &'static str {
        if self.is_blocked() {
            "Blocked"
        } else {
            "Pass"
        }
    }

    pub fn notes(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }

    /// True when the board's stored stage or notes disagree with this
    /// decision. Unchanged records produce no write.
    pub fn needs_write(&self, persisted_stage: Option<Stage>, persisted_notes: &str) -> bool {
        persisted_stage != Some(self.accepted) || persisted_notes.trim() != self.notes()
    }
}

// ---------------------------------------------------------------------------
// enforce
// ---------------------------------------------------------------------------

fn missing_for(stage: Stage, record: &DealRecord, rules: &GateRules) -> Vec<DealField> {
    rules
        .required_for(stage)
        .iter()
        .copied()
        .filter(|f| !record.has(*f))
        .collect()
}

/// Accept `proposed` if its gate is satisfied, otherwise roll back to the
/// nearest earlier stage whose own gate is satisfied.
///
/// The walk visits `Stage::all()` before `proposed` in reverse and ends at
/// `Stage::FuturePipeline`, which is accepted unconditionally. Pure and
/// idempotent: the same record and rules always give the same decision.
pub fn enforce(proposed: Stage, record: &DealRecord, rules: &GateRules) -> GateDecision {
    let missing = missing_for(proposed, record, rules);
    if missing.is_empty() {
        return GateDecision {
            proposed,
            accepted: proposed,
            missing,
            reason: None,
        };
    }

    let reason = rules.render_reason(proposed, &missing);
    let accepted = if rules.hard_rollback {
        proposed
            .earlier()
            .find(|stage| {
                *stage == Stage::FuturePipeline || missing_for(*stage, record, rules).is_empty()
            })
            .unwrap_or(proposed)
    } else {
        proposed
    };

    tracing::debug!(
        deal_id = record.id,
        proposed = %proposed,
        accepted = %accepted,
        reason = %reason,
        "gate blocked"
    );

    GateDecision {
        proposed,
        accepted,
        missing,
        reason: Some(reason),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rules() -> GateRules {
        let mut required = BTreeMap::new();
        required.insert(Stage::Estimation, vec![DealField::Brief, DealField::Scope]);
        required.insert(Stage::Validation, vec![DealField::EstimateLink]);
        GateRules {
            required,
            ..GateRules::default()
        }
    }

    fn record() -> DealRecord {
        DealRecord::new(1, "Acme")
    }

    #[test]
    fn pass_and_rollback() {
        let full = record()
            .with_field(DealField::Brief, "https://b")
            .with_field(DealField::Scope, "https://s");
        let d = enforce(Stage::Estimation, &full, &rules());
        assert_eq!(d.accepted, Stage::Estimation);
        assert!(d.reason.is_none());
        assert_eq!(d.status_label(), "Pass");

        let partial = record().with_field(DealField::Brief, "https://b");
        let d = enforce(Stage::Estimation, &partial, &rules());
        assert_eq!(d.accepted, Stage::ScopeDefinition);
        assert_eq!(
            d.reason.as_deref(),
            Some("Blocked move to Estimation: missing scope")
        );
        assert_eq!(d.status_label(), "Blocked");
    }

    #[test]
    fn rollback_skips_stages_that_also_fail() {
        // Validation fails and so does Estimation, so the walk lands on
        // Scope Definition (ungated here).
        let d = enforce(Stage::Validation, &record(), &rules());
        assert_eq!(d.accepted, Stage::ScopeDefinition);
        assert_eq!(d.missing, vec![DealField::EstimateLink]);
        assert!(d.reason.unwrap().contains("missing estimate_link"));
    }

    #[test]
    fn rollback_lands_on_estimation_when_its_gate_holds() {
        let r = record()
            .with_field(DealField::Brief, "https://b")
            .with_field(DealField::Scope, "https://s");
        let d = enforce(Stage::Validation, &r, &rules());
        assert_eq!(d.accepted, Stage::Estimation);
    }

    #[test]
    fn estimation_missing_owner_and_budget() {
        let r = record()
            .with_field(DealField::Brief, "https://b")
            .with_field(DealField::Scope, "https://s");
        let d = enforce(Stage::Estimation, &r, &GateRules::default());
        assert_eq!(d.accepted, Stage::ScopeDefinition);
        assert_eq!(d.missing, vec![DealField::Owner, DealField::Budget]);
        let reason = d.reason.unwrap();
        assert!(reason.contains("owner"));
        assert!(reason.contains("budget"));
    }

    #[test]
    fn validation_with_estimate_link_is_accepted() {
        let r = record().with_field(DealField::EstimateLink, "https://sheets/estimate");
        let d = enforce(Stage::Validation, &r, &GateRules::default());
        assert_eq!(d.accepted, Stage::Validation);
        assert!(d.reason.is_none());
        assert!(!d.rolled_back());
    }

    #[test]
    fn floor_is_reached_when_nothing_holds() {
        let d = enforce(Stage::Potential, &record(), &GateRules::default());
        assert_eq!(d.accepted, Stage::FuturePipeline);
    }

    #[test]
    fn floor_accepted_even_if_misconfigured() {
        let mut rules = rules();
        rules
            .required
            .insert(Stage::FuturePipeline, vec![DealField::Owner]);
        rules
            .required
            .insert(Stage::ScopeDefinition, vec![DealField::Brief]);
        let d = enforce(Stage::Estimation, &record(), &rules);
        assert_eq!(d.accepted, Stage::FuturePipeline);
        let d = enforce(Stage::FuturePipeline, &record(), &rules);
        assert_eq!(d.accepted, Stage::FuturePipeline);
        assert!(d.is_blocked());
    }

    #[test]
    fn accepted_never_ahead_of_proposed() {
        let samples = [
            record(),
            record().with_field(DealField::Brief, "https://b"),
            record()
                .with_field(DealField::EstimateLink, "https://e")
                .with_field(DealField::PresentationLink, "https://p"),
        ];
        for r in &samples {
            for stage in Stage::all() {
                let d = enforce(*stage, r, &GateRules::default());
                assert!(d.accepted <= *stage, "{stage} -> {}", d.accepted);
                if d.accepted < *stage {
                    assert!(d.reason.is_some());
                }
            }
        }
    }

    #[test]
    fn enforcement_is_idempotent() {
        let r = record().with_field(DealField::Brief, "https://b");
        let first = enforce(Stage::Presented, &r, &GateRules::default());
        let second = enforce(Stage::Presented, &r, &GateRules::default());
        assert_eq!(first, second);
    }

    #[test]
    fn soft_gate_keeps_stage() {
        let mut rules = rules();
        rules.hard_rollback = false;
        let d = enforce(Stage::Estimation, &record(), &rules);
        assert_eq!(d.accepted, Stage::Estimation);
        assert!(d.is_blocked());
    }

    #[test]
    fn regression_when_field_cleared() {
        let mut r = record().with_field(DealField::EstimateLink, "https://e");
        assert_eq!(
            enforce(Stage::Validation, &r, &rules()).accepted,
            Stage::Validation
        );
        r.set_field(DealField::EstimateLink, "");
        assert!(enforce(Stage::Validation, &r, &rules()).accepted < Stage::Validation);
    }

    #[test]
    fn needs_write_only_on_change() {
        let r = record().with_field(DealField::Brief, "https://b");
        let d = enforce(Stage::Estimation, &r, &rules());
        let notes = d.notes().to_string();
        assert!(!d.needs_write(Some(Stage::ScopeDefinition), &notes));
        assert!(d.needs_write(Some(Stage::Estimation), &notes));
        assert!(d.needs_write(Some(Stage::ScopeDefinition), ""));
        assert!(d.needs_write(None, &notes));

        let pass = enforce(Stage::FuturePipeline, &r, &rules());
        assert!(!pass.needs_write(Some(Stage::FuturePipeline), ""));
    }
}
