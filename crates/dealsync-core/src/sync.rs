//! One reconciliation pass from CRM deals to board pages.
//!
//! For every deal: map the CRM stage, enforce the readiness gate, derive the
//! board-only fields, diff against the stored page and hand the changes to a
//! [`BoardWriter`]. Dry runs and applied runs share this path; only the
//! writer differs.

use crate::board::{
    keys, plan_properties, BoardEntry, BoardSnapshot, BoardValue, BoardWriter, PropertyPlan,
};
use crate::config::Config;
use crate::deal::{self, DealContext, DealRecord};
use crate::derived::{self, DerivedFields};
use crate::error::Result;
use crate::gate::{self, GateDecision};
use crate::links;
use crate::readiness::{self, Readiness};
use crate::report::{ActionsPlanned, BlockedExample, RecordError, SyncReport};
use crate::stage_map::map_stage;
use crate::types::{DealField, Outcome};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

// ---------------------------------------------------------------------------
// DealSource
// ---------------------------------------------------------------------------

/// Where deals come from. Implemented by the Pipedrive client and by test
/// fakes.
pub trait DealSource {
    fn context(&self) -> Result<DealContext>;
    fn deals(&self, status: &str) -> Result<Vec<Value>>;
    fn notes(&self, deal_id: i64, limit: u32) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// SyncOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub deals_status: String,
    /// Case-insensitive pipeline names. Empty means every pipeline.
    pub pipelines: Vec<String>,
    /// 0 means no limit.
    pub max_deals: usize,
    pub scan_notes: bool,
    pub notes_limit: u32,
    pub clear_before_sync: bool,
    /// Deal URL prefix; the deal id is appended.
    pub deal_url_base: Option<String>,
}

impl SyncOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            deals_status: cfg.pipedrive.deals_status.clone(),
            pipelines: cfg.pipedrive.pipelines.clone(),
            max_deals: cfg.pipedrive.max_deals,
            scan_notes: cfg.pipedrive.scan_notes,
            notes_limit: cfg.pipedrive.notes_limit,
            clear_before_sync: false,
            deal_url_base: None,
        }
    }

    fn deal_url(&self, deal_id: i64) -> Option<String> {
        self.deal_url_base
            .as_ref()
            .map(|base| format!("{base}{deal_id}"))
    }
}

// ---------------------------------------------------------------------------
// Per-record evaluation
// ---------------------------------------------------------------------------

/// Everything computed for one deal before anything is written.
#[derive(Debug, Clone)]
pub struct RecordPlan {
    pub record: DealRecord,
    pub decision: GateDecision,
    pub readiness: Readiness,
    pub derived: DerivedFields,
    pub properties: PropertyPlan,
}

/// Logical key → value for every property the sync maintains.
pub fn board_values(
    record: &DealRecord,
    decision: &GateDecision,
    derived: &DerivedFields,
    deal_url: Option<String>,
    now: DateTime<Utc>,
) -> BTreeMap<String, BoardValue> {
    let link = |field: DealField| BoardValue::text(record.field(field).unwrap_or(""));
    let mut values = BTreeMap::new();
    let mut put = |key: &str, value: BoardValue| {
        values.insert(key.to_string(), value);
    };

    put(keys::TITLE, BoardValue::text(&record.title));
    put(keys::CRM_DEAL_ID, BoardValue::Number(record.id as f64));
    put(keys::STAGE, BoardValue::text(decision.accepted.as_str()));
    put(keys::PIPELINE, BoardValue::text(&record.pipeline));
    put(keys::COMPANY, BoardValue::text(&record.company));
    put(keys::CONTACT, BoardValue::text(&record.contact));
    put(keys::OWNER, BoardValue::text(&record.owner_name));
    put(keys::DEAL_VALUE, BoardValue::number(record.value));
    put(keys::CURRENCY, BoardValue::text(&record.currency));
    put(
        keys::EXPECTED_CLOSE_DATE,
        BoardValue::date(record.expected_close.map(|d| d.format("%Y-%m-%d").to_string())),
    );
    put(keys::PIPEDRIVE_URL, BoardValue::text(deal_url.unwrap_or_default()));
    put(keys::DAYS_IN_STAGE, BoardValue::Number(derived.days_in_stage as f64));
    put(keys::SLA_COLOR, BoardValue::text(derived.sla_color.as_str()));
    put(
        keys::READINESS_PERCENT,
        BoardValue::Number(f64::from(derived.readiness_percent)),
    );
    put(keys::GATE_STATUS, BoardValue::text(decision.status_label()));
    put(keys::SYNC_NOTES, BoardValue::text(decision.notes()));
    put(keys::DOCS_STATUS, BoardValue::text(derived.docs_status.as_str()));
    put(keys::BRIEF_LINK, link(DealField::Brief));
    put(keys::SCOPE_LINK, link(DealField::Scope));
    put(keys::ESTIMATE_LINK, link(DealField::EstimateLink));
    put(keys::PRESENTATION_LINK, link(DealField::PresentationLink));
    put(
        keys::LAST_SYNC_AT,
        BoardValue::Date(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    // Only values the CRM actually carries; an absent passthrough field
    // says nothing about the stored one.
    for (key, value) in &record.passthrough {
        put(key.as_str(), BoardValue::text(value));
    }
    values
}

/// Evaluate one raw deal against the board without writing anything.
#[allow(clippy::too_many_arguments)]
pub fn plan_record(
    raw: &Value,
    ctx: &DealContext,
    cfg: &Config,
    opts: &SyncOptions,
    source: &dyn DealSource,
    existing: Option<&BoardEntry>,
    snapshot: &BoardSnapshot,
    now: DateTime<Utc>,
) -> Result<RecordPlan> {
    let mut record = DealRecord::from_pipedrive(raw, ctx, cfg)?;

    if opts.scan_notes && DealField::links().iter().any(|f| !record.has(*f)) {
        match source.notes(record.id, opts.notes_limit) {
            Ok(notes) => {
                record.fill_missing_links(links::links_from_notes(&notes, &cfg.pipedrive.doc_hints))
            }
            Err(e) => tracing::warn!(deal_id = record.id, error = %e, "could not read deal notes"),
        }
    }

    let proposed = map_stage(&record.external_stage, &cfg.stages);
    let decision = gate::enforce(proposed, &record, &cfg.gates);
    let readiness = readiness::evaluate(proposed, &record, &cfg.gates);
    let derived = derived::derive(record.stage_changed_at, now, &readiness);

    let values = board_values(&record, &decision, &derived, opts.deal_url(record.id), now);
    let properties = plan_properties(&values, existing, &cfg.board, &snapshot.schema);

    tracing::debug!(
        deal_id = record.id,
        accepted = %decision.accepted,
        changed = properties.changes.len(),
        "planned record"
    );

    Ok(RecordPlan {
        record,
        decision,
        readiness,
        derived,
        properties,
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn select_deals(deals: Vec<Value>, ctx: &DealContext, opts: &SyncOptions) -> Vec<Value> {
    let mut deals = deal::dedupe_by_id(deals);
    if !opts.pipelines.is_empty() {
        deals.retain(|raw| {
            deal::pipeline_name(raw, ctx).is_some_and(|name| {
                opts.pipelines
                    .iter()
                    .any(|wanted| wanted.trim().eq_ignore_ascii_case(name.trim()))
            })
        });
    }
    if opts.max_deals > 0 {
        deals.truncate(opts.max_deals);
    }
    deals
}

fn plan_actions(deals: &[Value], snapshot: &BoardSnapshot, cleared: bool) -> ActionsPlanned {
    let mut planned = ActionsPlanned::default();
    for raw in deals {
        match deal::deal_id(raw) {
            Some(id) if !cleared && snapshot.entry(id).is_some() => planned.updates += 1,
            _ => planned.creates += 1,
        }
    }
    planned
}

fn raw_id_text(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Reconcile every selected deal against `snapshot` through `writer`.
///
/// Fetch failures before processing abort the run. Failures for a single
/// deal are recorded as errored and the run continues.
pub fn run(
    cfg: &Config,
    opts: &SyncOptions,
    source: &dyn DealSource,
    snapshot: &BoardSnapshot,
    writer: &mut dyn BoardWriter,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    let ctx = source.context()?;
    let fetched = source.deals(&opts.deals_status)?;
    let fetched_count = fetched.len();
    let deals = select_deals(fetched, &ctx, opts);

    let mut report = SyncReport::new(writer.mode(), now);
    report.pipeline_filter = opts.pipelines.clone();
    report.deals_status = opts.deals_status.clone();
    report.total_deals_seen = deals.len();
    report.actions_planned = plan_actions(&deals, snapshot, opts.clear_before_sync);

    tracing::info!(
        mode = %report.mode,
        fetched = fetched_count,
        selected = deals.len(),
        creates = report.actions_planned.creates,
        updates = report.actions_planned.updates,
        "starting sync"
    );

    let mut archived: HashSet<&str> = HashSet::new();
    if opts.clear_before_sync {
        for page_id in &snapshot.page_ids {
            match writer.archive(page_id) {
                Ok(()) => {
                    report.archived += 1;
                    archived.insert(page_id.as_str());
                }
                Err(e) => {
                    tracing::warn!(page_id = %page_id, error = %e, "archive failed");
                    report.errors.push(RecordError {
                        deal_id: "?".to_string(),
                        page_id: Some(page_id.clone()),
                        stage: None,
                        error: format!("archive failed: {e}"),
                    });
                }
            }
        }
    }

    for raw in &deals {
        let existing = deal::deal_id(raw)
            .and_then(|id| snapshot.entry(id))
            .filter(|entry| !archived.contains(entry.page_id.as_str()));

        let plan = match plan_record(raw, &ctx, cfg, opts, source, existing, snapshot, now) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(deal_id = %raw_id_text(raw), error = %e, "deal skipped: transform failed");
                report.record_error(RecordError {
                    deal_id: raw_id_text(raw),
                    page_id: existing.map(|e| e.page_id.clone()),
                    stage: None,
                    error: e.to_string(),
                });
                continue;
            }
        };

        for name in &plan.properties.unknown {
            report.record_unknown_property(name.clone());
        }
        for name in &plan.properties.protected {
            report.record_skipped_property(plan.record.id, name.clone());
        }

        let written = if plan.properties.is_noop() {
            Ok(Outcome::Skipped)
        } else {
            match existing {
                None => writer
                    .create(&plan.properties.changes)
                    .map(|()| Outcome::Created),
                Some(entry) => writer
                    .update(&entry.page_id, &plan.properties.changes)
                    .map(|()| Outcome::Updated),
            }
        };

        match written {
            Err(e) => {
                tracing::warn!(deal_id = plan.record.id, error = %e, "board write failed");
                report.record_error(RecordError {
                    deal_id: plan.record.id.to_string(),
                    page_id: existing.map(|e| e.page_id.clone()),
                    stage: Some(plan.decision.accepted),
                    error: e.to_string(),
                });
            }
            Ok(_) if plan.decision.is_blocked() => {
                report.record_blocked(BlockedExample {
                    deal_id: plan.record.id,
                    title: plan.record.title.clone(),
                    proposed: plan.decision.proposed,
                    accepted: plan.decision.accepted,
                    reason: plan.decision.notes().to_string(),
                });
            }
            Ok(outcome) => report.record(outcome),
        }
    }

    tracing::info!("{}", report.summary_line());
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
