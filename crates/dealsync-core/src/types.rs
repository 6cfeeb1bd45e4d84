use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Board stages in pipeline order. Declaration order is the rollback order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    #[serde(rename = "Future pipeline")]
    FuturePipeline,
    #[serde(rename = "Scope Definition")]
    ScopeDefinition,
    #[serde(rename = "Estimation")]
    Estimation,
    #[serde(rename = "Validation")]
    Validation,
    #[serde(rename = "Presented")]
    Presented,
    #[serde(rename = "Potential 80%+")]
    Potential,
    #[serde(rename = "Won")]
    Won,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::FuturePipeline,
            Stage::ScopeDefinition,
            Stage::Estimation,
            Stage::Validation,
            Stage::Presented,
            Stage::Potential,
            Stage::Won,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stages strictly before `self`, nearest first.
    pub fn earlier(self) -> impl Iterator<Item = Stage> {
        Stage::all()[..self.index()].iter().rev().copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FuturePipeline => "Future pipeline",
            Stage::ScopeDefinition => "Scope Definition",
            Stage::Estimation => "Estimation",
            Stage::Validation => "Validation",
            Stage::Presented => "Presented",
            Stage::Potential => "Potential 80%+",
            Stage::Won => "Won",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Stage::all()
            .iter()
            .copied()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| crate::error::SyncError::InvalidStage(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DealField
// ---------------------------------------------------------------------------

/// Deal fields that readiness gates can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealField {
    Brief,
    Scope,
    Owner,
    Deadline,
    Budget,
    EstimateLink,
    PresentationLink,
}

impl DealField {
    pub fn all() -> &'static [DealField] {
        &[
            DealField::Brief,
            DealField::Scope,
            DealField::Owner,
            DealField::Deadline,
            DealField::Budget,
            DealField::EstimateLink,
            DealField::PresentationLink,
        ]
    }

    /// The document-bearing fields that make up the docs status.
    pub fn links() -> &'static [DealField] {
        &[
            DealField::Brief,
            DealField::Scope,
            DealField::EstimateLink,
            DealField::PresentationLink,
        ]
    }

    pub fn is_link(self) -> bool {
        Self::links().contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealField::Brief => "brief",
            DealField::Scope => "scope",
            DealField::Owner => "owner",
            DealField::Deadline => "deadline",
            DealField::Budget => "budget",
            DealField::EstimateLink => "estimate_link",
            DealField::PresentationLink => "presentation_link",
        }
    }
}

impl fmt::Display for DealField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DealField {
    type Err = crate::error::SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "brief" => Ok(DealField::Brief),
            "scope" => Ok(DealField::Scope),
            "owner" => Ok(DealField::Owner),
            "deadline" => Ok(DealField::Deadline),
            "budget" => Ok(DealField::Budget),
            "estimate_link" | "estimate-link" | "estimate" => Ok(DealField::EstimateLink),
            "presentation_link" | "presentation-link" | "presentation" => {
                Ok(DealField::PresentationLink)
            }
            _ => Err(crate::error::SyncError::InvalidField(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SlaColor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaColor {
    Green,
    Yellow,
    Red,
}

impl SlaColor {
    pub fn from_days(days_in_stage: i64) -> Self {
        match days_in_stage {
            d if d <= 3 => SlaColor::Green,
            d if d <= 7 => SlaColor::Yellow,
            _ => SlaColor::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlaColor::Green => "Green",
            SlaColor::Yellow => "Yellow",
            SlaColor::Red => "Red",
        }
    }
}

impl fmt::Display for SlaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocsStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocsStatus {
    #[serde(rename = "No links")]
    NoLinks,
    Partial,
    Complete,
}

impl DocsStatus {
    pub fn classify(present: usize, total: usize) -> Self {
        if present == 0 {
            DocsStatus::NoLinks
        } else if present >= total {
            DocsStatus::Complete
        } else {
            DocsStatus::Partial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocsStatus::NoLinks => "No links",
            DocsStatus::Partial => "Partial",
            DocsStatus::Complete => "Complete",
        }
    }
}

impl fmt::Display for DocsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a sync run did with one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Blocked,
    Skipped,
    Errored,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Blocked => "blocked",
            Outcome::Skipped => "skipped",
            Outcome::Errored => "errored",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RunMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    DryRun,
    Apply,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => f.write_str("dry-run"),
            RunMode::Apply => f.write_str("apply"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_ordering() {
        assert!(Stage::FuturePipeline < Stage::ScopeDefinition);
        assert!(Stage::Estimation < Stage::Validation);
        assert!(Stage::Won > Stage::Potential);
    }

    #[test]
    fn earlier_walks_backward() {
        let earlier: Vec<Stage> = Stage::Validation.earlier().collect();
        assert_eq!(
            earlier,
            vec![
                Stage::Estimation,
                Stage::ScopeDefinition,
                Stage::FuturePipeline
            ]
        );
        assert_eq!(Stage::FuturePipeline.earlier().count(), 0);
    }

    #[test]
    fn stage_from_str_is_case_insensitive() {
        assert_eq!(Stage::from_str("scope definition").unwrap(), Stage::ScopeDefinition);
        assert_eq!(Stage::from_str("Potential 80%+").unwrap(), Stage::Potential);
        assert!(Stage::from_str("Lost").is_err());
    }

    #[test]
    fn stage_serializes_as_board_label() {
        let json = serde_json::to_string(&Stage::Potential).unwrap();
        assert_eq!(json, "\"Potential 80%+\"");
        let parsed: Stage = serde_yaml::from_str("Future pipeline").unwrap();
        assert_eq!(parsed, Stage::FuturePipeline);
    }

    #[test]
    fn deal_field_aliases() {
        assert_eq!(DealField::from_str("estimate").unwrap(), DealField::EstimateLink);
        assert_eq!(
            DealField::from_str("presentation-link").unwrap(),
            DealField::PresentationLink
        );
        assert!(DealField::from_str("phone").is_err());
    }

    #[test]
    fn link_fields() {
        assert!(DealField::Brief.is_link());
        assert!(DealField::EstimateLink.is_link());
        assert!(!DealField::Owner.is_link());
        assert!(!DealField::Budget.is_link());
    }

    #[test]
    fn sla_color_boundaries() {
        assert_eq!(SlaColor::from_days(0), SlaColor::Green);
        assert_eq!(SlaColor::from_days(3), SlaColor::Green);
        assert_eq!(SlaColor::from_days(4), SlaColor::Yellow);
        assert_eq!(SlaColor::from_days(7), SlaColor::Yellow);
        assert_eq!(SlaColor::from_days(8), SlaColor::Red);
    }

    #[test]
    fn docs_status_classes() {
        assert_eq!(DocsStatus::classify(0, 4), DocsStatus::NoLinks);
        assert_eq!(DocsStatus::classify(2, 4), DocsStatus::Partial);
        assert_eq!(DocsStatus::classify(4, 4), DocsStatus::Complete);
        assert_eq!(DocsStatus::NoLinks.to_string(), "No links");
    }
}
