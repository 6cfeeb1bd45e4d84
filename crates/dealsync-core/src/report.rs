use crate::error::Result;
use crate::types::{Outcome, RunMode, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Blocked records listed in full; the count is never capped.
pub const MAX_BLOCKED_EXAMPLES: usize = 30;

// ---------------------------------------------------------------------------
// Report entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionsPlanned {
    pub creates: usize,
    pub updates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    /// Raw id text when the deal id itself could not be read.
    pub deal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedProperty {
    pub deal_id: i64,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedExample {
    pub deal_id: i64,
    pub title: String,
    pub proposed: Stage,
    pub accepted: Stage,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

/// Summary of one run. Every processed record lands in exactly one of
/// created, updated, blocked, skipped or errored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: RunMode,
    pub timestamp_utc: DateTime<Utc>,
    pub pipeline_filter: Vec<String>,
    pub deals_status: String,
    pub total_deals_seen: usize,
    pub actions_planned: ActionsPlanned,
    pub created: usize,
    pub updated: usize,
    pub blocked: usize,
    pub skipped: usize,
    pub errored: usize,
    pub archived: usize,
    pub errors: Vec<RecordError>,
    pub skipped_properties: Vec<SkippedProperty>,
    pub unknown_properties: BTreeSet<String>,
    pub blocked_examples: Vec<BlockedExample>,
}

impl SyncReport {
    pub fn new(mode: RunMode, timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            mode,
            timestamp_utc,
            pipeline_filter: Vec::new(),
            deals_status: String::new(),
            total_deals_seen: 0,
            actions_planned: ActionsPlanned::default(),
            created: 0,
            updated: 0,
            blocked: 0,
            skipped: 0,
            errored: 0,
            archived: 0,
            errors: Vec::new(),
            skipped_properties: Vec::new(),
            unknown_properties: BTreeSet::new(),
            blocked_examples: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Blocked => self.blocked += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Errored => self.errored += 1,
        }
    }

    pub fn record_error(&mut self, error: RecordError) {
        self.record(Outcome::Errored);
        self.errors.push(error);
    }

    pub fn record_blocked(&mut self, example: BlockedExample) {
        self.record(Outcome::Blocked);
        if self.blocked_examples.len() < MAX_BLOCKED_EXAMPLES {
            self.blocked_examples.push(example);
        }
    }

    pub fn record_skipped_property(&mut self, deal_id: i64, property: impl Into<String>) {
        self.skipped_properties.push(SkippedProperty {
            deal_id,
            property: property.into(),
        });
    }

    pub fn record_unknown_property(&mut self, property: impl Into<String>) {
        self.unknown_properties.insert(property.into());
    }

    /// Records that reached an outcome.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.blocked + self.skipped + self.errored
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} deals, {} created, {} updated, {} blocked, {} skipped, {} errored",
            self.mode,
            self.total_deals_seen,
            self.created,
            self.updated,
            self.blocked,
            self.skipped,
            self.errored
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
