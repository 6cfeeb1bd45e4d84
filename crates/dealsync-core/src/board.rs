//! The board side of a sync: property values, the persisted snapshot, the
//! per-record property plan and the writer seam that separates dry runs from
//! applied runs.

use crate::config::BoardConfig;
use crate::error::Result;
use crate::types::{RunMode, Stage};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Property keys
// ---------------------------------------------------------------------------

/// Logical property keys. `BoardConfig::properties` maps each to the board's
/// own property name.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const CRM_DEAL_ID: &str = "crm_deal_id";
    pub const STAGE: &str = "stage";
    pub const PIPELINE: &str = "pipeline";
    pub const COMPANY: &str = "company";
    pub const CONTACT: &str = "contact";
    pub const OWNER: &str = "owner";
    pub const DEAL_VALUE: &str = "deal_value";
    pub const CURRENCY: &str = "currency";
    pub const EXPECTED_CLOSE_DATE: &str = "expected_close_date";
    pub const PIPEDRIVE_URL: &str = "pipedrive_url";
    pub const DAYS_IN_STAGE: &str = "days_in_stage";
    pub const SLA_COLOR: &str = "sla_color";
    pub const READINESS_PERCENT: &str = "readiness_percent";
    pub const GATE_STATUS: &str = "gate_status";
    pub const SYNC_NOTES: &str = "sync_notes";
    pub const DOCS_STATUS: &str = "docs_status";
    pub const BRIEF_LINK: &str = "brief_link";
    pub const SCOPE_LINK: &str = "scope_link";
    pub const ESTIMATE_LINK: &str = "estimate_link";
    pub const PRESENTATION_LINK: &str = "presentation_link";
    pub const LAST_SYNC_AT: &str = "last_sync_at";
    pub const CONFIDENCE: &str = "confidence";

    /// Keys the sync computes itself. Passthrough keys come from config.
    pub const ALL: &[&str] = &[
        TITLE,
        CRM_DEAL_ID,
        STAGE,
        PIPELINE,
        COMPANY,
        CONTACT,
        OWNER,
        DEAL_VALUE,
        CURRENCY,
        EXPECTED_CLOSE_DATE,
        PIPEDRIVE_URL,
        DAYS_IN_STAGE,
        SLA_COLOR,
        READINESS_PERCENT,
        GATE_STATUS,
        SYNC_NOTES,
        DOCS_STATUS,
        BRIEF_LINK,
        SCOPE_LINK,
        ESTIMATE_LINK,
        PRESENTATION_LINK,
        LAST_SYNC_AT,
    ];
}

// ---------------------------------------------------------------------------
// PropertyKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    RichText,
    Number,
    Select,
    Status,
    MultiSelect,
    Url,
    Date,
    Checkbox,
    Other(String),
}

impl PropertyKind {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyKind::Title => "title",
            PropertyKind::RichText => "rich_text",
            PropertyKind::Number => "number",
            PropertyKind::Select => "select",
            PropertyKind::Status => "status",
            PropertyKind::MultiSelect => "multi_select",
            PropertyKind::Url => "url",
            PropertyKind::Date => "date",
            PropertyKind::Checkbox => "checkbox",
            PropertyKind::Other(s) => s,
        }
    }

    /// Kind used when the sync creates a board for the computed keys.
    /// Passthrough keys default to rich text.
    pub fn for_key(key: &str) -> PropertyKind {
        match key {
            keys::TITLE => PropertyKind::Title,
            keys::CRM_DEAL_ID | keys::DEAL_VALUE | keys::DAYS_IN_STAGE | keys::READINESS_PERCENT => {
                PropertyKind::Number
            }
            keys::STAGE
            | keys::CURRENCY
            | keys::SLA_COLOR
            | keys::GATE_STATUS
            | keys::DOCS_STATUS
            | keys::CONFIDENCE => PropertyKind::Select,
            keys::EXPECTED_CLOSE_DATE | keys::LAST_SYNC_AT => PropertyKind::Date,
            keys::PIPEDRIVE_URL
            | keys::BRIEF_LINK
            | keys::SCOPE_LINK
            | keys::ESTIMATE_LINK
            | keys::PRESENTATION_LINK => PropertyKind::Url,
            _ => PropertyKind::RichText,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "title" => PropertyKind::Title,
            "rich_text" => PropertyKind::RichText,
            "number" => PropertyKind::Number,
            "select" => PropertyKind::Select,
            "status" => PropertyKind::Status,
            "multi_select" => PropertyKind::MultiSelect,
            "url" => PropertyKind::Url,
            "date" => PropertyKind::Date,
            "checkbox" => PropertyKind::Checkbox,
            other => PropertyKind::Other(other.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// BoardValue
// ---------------------------------------------------------------------------

/// Text properties keep at most this many characters.
pub const MAX_TEXT_LEN: usize = 2000;

/// A property value, independent of how the board encodes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoardValue {
    Empty,
    Text(String),
    Number(f64),
    /// ISO date or RFC 3339 timestamp.
    Date(String),
}

impl BoardValue {
    /// Trimmed text; blank text is `Empty`.
    pub fn text(value: impl AsRef<str>) -> Self {
        let value = value.as_ref().trim();
        if value.is_empty() {
            BoardValue::Empty
        } else {
            BoardValue::Text(value.to_string())
        }
    }

    pub fn number(value: Option<f64>) -> Self {
        value.map(BoardValue::Number).unwrap_or(BoardValue::Empty)
    }

    pub fn date(value: Option<impl Into<String>>) -> Self {
        value
            .map(|v| BoardValue::Date(v.into()))
            .unwrap_or(BoardValue::Empty)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BoardValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BoardValue::Text(s) | BoardValue::Date(s) => Some(s),
            _ => None,
        }
    }

    /// This value as a property of `kind` reads it back after a write:
    /// numbers and dates in text columns become text, long text is cut,
    /// select names lose their commas.
    pub fn stored_as(&self, kind: &PropertyKind) -> BoardValue {
        if self.is_empty() {
            return BoardValue::Empty;
        }
        let text = self.to_string();
        match kind {
            PropertyKind::Title | PropertyKind::RichText => {
                BoardValue::text(text.chars().take(MAX_TEXT_LEN).collect::<String>())
            }
            PropertyKind::Url => BoardValue::text(text),
            PropertyKind::Number => match self {
                BoardValue::Number(n) => BoardValue::Number(*n),
                BoardValue::Text(s) => BoardValue::number(s.trim().parse().ok()),
                _ => BoardValue::Empty,
            },
            PropertyKind::Select | PropertyKind::Status => BoardValue::text(text.replace(',', " ")),
            PropertyKind::MultiSelect => BoardValue::text(
                text.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            PropertyKind::Date => BoardValue::Date(text),
            PropertyKind::Checkbox => BoardValue::Text((text == "true").to_string()),
            PropertyKind::Other(_) => self.clone(),
        }
    }

    /// Equality as the board sees it. Dates compare on their leading
    /// `YYYY-MM-DD` when either side is a bare date.
    pub fn same_as(&self, other: &BoardValue) -> bool {
        match (self, other) {
            (BoardValue::Date(a), BoardValue::Date(b)) => {
                if a.len() == 10 || b.len() == 10 {
                    a.get(..10) == b.get(..10)
                } else {
                    a == b
                }
            }
            (BoardValue::Number(a), BoardValue::Number(b)) => (a - b).abs() < 1e-9,
            _ => self == other,
        }
    }
}

impl fmt::Display for BoardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardValue::Empty => Ok(()),
            BoardValue::Text(s) | BoardValue::Date(s) => f.write_str(s),
            BoardValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            BoardValue::Number(n) => write!(f, "{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BoardSchema / BoardEntry / BoardSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct BoardSchema {
    pub properties: BTreeMap<String, PropertyKind>,
}

impl BoardSchema {
    pub fn kind_of(&self, name: &str) -> Option<&PropertyKind> {
        self.properties.get(name)
    }
}

/// One page already on the board, keyed by its CRM deal id.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub page_id: String,
    pub deal_id: i64,
    /// Board property name → stored value.
    pub values: BTreeMap<String, BoardValue>,
}

impl BoardEntry {
    pub fn value(&self, property: &str) -> &BoardValue {
        self.values.get(property).unwrap_or(&BoardValue::Empty)
    }

    pub fn stage(&self, cfg: &BoardConfig) -> Option<Stage> {
        let name = cfg.property_name(keys::STAGE)?;
        self.value(name).as_text()?.parse().ok()
    }

    pub fn notes(&self, cfg: &BoardConfig) -> String {
        cfg.property_name(keys::SYNC_NOTES)
            .and_then(|name| self.value(name).as_text())
            .unwrap_or("")
            .to_string()
    }
}

/// Everything read from the board before a run starts.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub schema: BoardSchema,
    pub entries: HashMap<i64, BoardEntry>,
    /// Every page on the board, including ones without a deal id.
    pub page_ids: Vec<String>,
}

impl BoardSnapshot {
    pub fn entry(&self, deal_id: i64) -> Option<&BoardEntry> {
        self.entries.get(&deal_id)
    }
}

// ---------------------------------------------------------------------------
// PropertyPlan
// ---------------------------------------------------------------------------

/// What a single record's write would change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPlan {
    /// Board property name → value to write.
    pub changes: BTreeMap<String, BoardValue>,
    /// Protected properties whose computed value differs from the board.
    pub protected: Vec<String>,
    /// Configured property names the board schema does not have.
    pub unknown: Vec<String>,
}

impl PropertyPlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Diff computed values (logical key → value) against the stored entry.
///
/// Each value is first normalised to its column kind, so the comparison sees
/// what the board would hold after the write. Unmapped keys are ignored;
/// mapped names missing from the schema are reported as unknown. Protected
/// properties are never written. The last sync timestamp is only included
/// alongside another change.
///
/// Stage and sync notes are ordinary properties here, so a record whose
/// accepted stage and gate reason match the board produces no stage write
/// (the rule `GateDecision::needs_write` states on its own).
pub fn plan_properties(
    values: &BTreeMap<String, BoardValue>,
    existing: Option<&BoardEntry>,
    cfg: &BoardConfig,
    schema: &BoardSchema,
) -> PropertyPlan {
    let mut plan = PropertyPlan::default();
    let mut last_sync = None;

    for (key, value) in values {
        let Some(name) = cfg.property_name(key) else {
            continue;
        };
        let Some(kind) = schema.kind_of(name) else {
            plan.unknown.push(name.to_string());
            continue;
        };
        let value = value.stored_as(kind);
        let stored = existing
            .map(|e| e.value(name))
            .unwrap_or(&BoardValue::Empty);
        if cfg.is_protected(name) {
            if !value.same_as(stored) {
                plan.protected.push(name.to_string());
            }
            continue;
        }
        if key == keys::LAST_SYNC_AT {
            last_sync = Some((name.to_string(), value));
            continue;
        }
        if !value.same_as(stored) {
            plan.changes.insert(name.to_string(), value);
        }
    }

    if !plan.changes.is_empty() {
        if let Some((name, value)) = last_sync {
            plan.changes.insert(name, value);
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// BoardWriter
// ---------------------------------------------------------------------------

/// The only path by which a run touches the board. Dry runs swap in
/// [`DryRunWriter`]; nothing else about the run changes.
pub trait BoardWriter {
    fn mode(&self) -> RunMode;
    fn create(&mut self, properties: &BTreeMap<String, BoardValue>) -> Result<()>;
    fn update(&mut self, page_id: &str, properties: &BTreeMap<String, BoardValue>) -> Result<()>;
    fn archive(&mut self, page_id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct DryRunWriter;

impl BoardWriter for DryRunWriter {
    fn mode(&self) -> RunMode {
        RunMode::DryRun
    }

    fn create(&mut self, properties: &BTreeMap<String, BoardValue>) -> Result<()> {
        tracing::debug!(properties = properties.len(), "dry-run: would create page");
        Ok(())
    }

    fn update(&mut self, page_id: &str, properties: &BTreeMap<String, BoardValue>) -> Result<()> {
        tracing::debug!(
            page_id,
            changed = ?properties.keys().collect::<Vec<_>>(),
            "dry-run: would update page"
        );
        Ok(())
    }

    fn archive(&mut self, page_id: &str) -> Result<()> {
        tracing::debug!(page_id, "dry-run: would archive page");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
