use crate::config::{Config, FieldSource};
use crate::error::{Result, SyncError};
use crate::types::DealField;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// DealContext
// ---------------------------------------------------------------------------

/// Lookup tables fetched once per run and shared by every deal.
#[derive(Debug, Clone, Default)]
pub struct DealContext {
    pub stage_names: HashMap<i64, String>,
    pub pipeline_names: HashMap<i64, String>,
    /// Custom field display name → deal object key.
    pub field_keys: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// DealRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DealRecord {
    pub id: i64,
    pub title: String,
    pub external_stage: String,
    pub pipeline: String,
    /// Gate-relevant values. Absent and empty values are never stored.
    pub fields: BTreeMap<DealField, String>,
    pub stage_changed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub company: String,
    pub contact: String,
    pub owner_name: String,
    pub value: Option<f64>,
    pub currency: String,
    pub expected_close: Option<NaiveDate>,
    pub passthrough: BTreeMap<String, String>,
}

impl DealRecord {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, field: DealField) -> Option<&str> {
        self.fields.get(&field).map(|s| s.as_str())
    }

    pub fn has(&self, field: DealField) -> bool {
        self.field(field).is_some_and(|v| !v.trim().is_empty())
    }

    /// Store `value`, or clear the field when it is blank.
    pub fn set_field(&mut self, field: DealField, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value.trim().to_string());
        }
    }

    pub fn with_field(mut self, field: DealField, value: impl Into<String>) -> Self {
        self.set_field(field, value);
        self
    }

    /// Fill link fields that are still empty. Existing values win.
    pub fn fill_missing_links(&mut self, links: BTreeMap<DealField, String>) {
        for (field, url) in links {
            if field.is_link() && !self.has(field) {
                self.set_field(field, url);
            }
        }
    }

    /// Build a record from a raw Pipedrive deal object.
    pub fn from_pipedrive(raw: &Value, ctx: &DealContext, cfg: &Config) -> Result<Self> {
        let id = deal_id(raw).ok_or_else(|| SyncError::MalformedDeal {
            deal_id: raw.get("id").map(|v| v.to_string()).unwrap_or_else(|| "?".to_string()),
            reason: "missing or non-numeric id".to_string(),
        })?;
        let malformed = |reason: String| SyncError::MalformedDeal {
            deal_id: id.to_string(),
            reason,
        };

        let title = text_at(raw, "title").unwrap_or_else(|| format!("Deal {id}"));
        let external_stage = int_at(raw, "stage_id")
            .and_then(|sid| ctx.stage_names.get(&sid).cloned())
            .unwrap_or_default();
        let pipeline = pipeline_name(raw, ctx).unwrap_or_default().to_string();

        let mut record = DealRecord::new(id, title);
        record.external_stage = external_stage;
        record.pipeline = pipeline;

        for (field, source) in &cfg.fields {
            let value = match source {
                FieldSource::Builtin { paths } => {
                    let mut found = None;
                    for path in paths {
                        let text = scalar_text(nested_get(raw, path))
                            .map_err(|r| malformed(format!("{field} ({path}): {r}")))?;
                        if text.is_some() {
                            found = text;
                            break;
                        }
                    }
                    found
                }
                FieldSource::Custom { name } => {
                    let value = ctx.field_keys.get(name).and_then(|key| raw.get(key));
                    scalar_text(value).map_err(|r| malformed(format!("{field} ({name}): {r}")))?
                }
            };
            if let Some(text) = value {
                // Link fields only count when they hold an actual URL.
                if field.is_link() && !text.starts_with("http") {
                    continue;
                }
                record.set_field(*field, text);
            }
        }

        for (key, name) in &cfg.passthrough {
            let value = ctx.field_keys.get(name).and_then(|k| raw.get(k));
            if let Some(text) =
                scalar_text(value).map_err(|r| malformed(format!("{key} ({name}): {r}")))?
            {
                record.passthrough.insert(key.clone(), text);
            }
        }

        record.stage_changed_at = ["stage_change_time", "update_time", "add_time"]
            .iter()
            .find_map(|k| text_at(raw, k).and_then(|t| parse_timestamp(&t)));
        record.updated_at = text_at(raw, "update_time").and_then(|t| parse_timestamp(&t));
        record.company = first_text(raw, &["org_id.name", "org_name"]);
        record.contact = first_text(raw, &["person_id.name", "person_name"]);
        record.owner_name = first_text(raw, &["owner_id.name", "user_id.name", "owner_name"]);
        record.value = raw.get("value").and_then(Value::as_f64);
        record.currency = text_at(raw, "currency")
            .map(|c| c.to_uppercase())
            .unwrap_or_default();
        record.expected_close = text_at(raw, "expected_close_date")
            .and_then(|t| parse_timestamp(&t))
            .map(|ts| ts.date_naive());

        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Raw deal helpers
// ---------------------------------------------------------------------------

/// Numeric id of a raw deal; accepts numbers and numeric strings.
pub fn deal_id(raw: &Value) -> Option<i64> {
    int_at(raw, "id")
}

/// Name of the pipeline a raw deal belongs to, if known.
pub fn pipeline_name<'a>(raw: &Value, ctx: &'a DealContext) -> Option<&'a str> {
    int_at(raw, "pipeline_id")
        .and_then(|pid| ctx.pipeline_names.get(&pid))
        .map(String::as_str)
}

fn int_at(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        // Pipedrive expands some references into objects carrying the id.
        Value::Object(map) => map.get("value").or_else(|| map.get("id"))?.as_i64(),
        _ => None,
    }
}

fn text_at(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_text(raw: &Value, paths: &[&str]) -> String {
    paths
        .iter()
        .find_map(|p| {
            nested_get(raw, p)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

/// Follow a dotted path through nested objects.
pub fn nested_get<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |cur, token| cur.as_object()?.get(token))
}

/// Text form of a scalar field value; `None` for null, blank, zero and false.
fn scalar_text(value: Option<&Value>) -> std::result::Result<Option<String>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(b.then(|| "true".to_string())),
        Value::Number(n) => {
            let f = n.as_f64().unwrap_or(0.0);
            if f == 0.0 {
                Ok(None)
            } else if f.fract() == 0.0 {
                Ok(Some(format!("{}", f as i64)))
            } else {
                Ok(Some(n.to_string()))
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "0" {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Value::Object(map) => match map.get("value") {
            Some(inner) if !inner.is_object() => scalar_text(Some(inner)),
            _ => Err("expected a scalar value, found an object".to_string()),
        },
        Value::Array(_) => Err("expected a scalar value, found a list".to_string()),
    }
}

/// Parse the timestamp shapes Pipedrive emits. Bare dates mean midnight UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Collapse duplicate deal ids, keeping the most recently updated copy in the
/// position of the first occurrence. Deals without an id pass through so the
/// run can report them.
pub fn dedupe_by_id(deals: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(deals.len());
    let mut index: HashMap<i64, usize> = HashMap::new();
    for deal in deals {
        let Some(id) = deal_id(&deal) else {
            out.push(deal);
            continue;
        };
        match index.get(&id) {
            Some(&i) => {
                let updated = |d: &Value| {
                    text_at(d, "update_time")
                        .and_then(|t| parse_timestamp(&t))
                        .unwrap_or(DateTime::<Utc>::MIN_UTC)
                };
                if updated(&deal) >= updated(&out[i]) {
                    out[i] = deal;
                }
            }
            None => {
                index.insert(id, out.len());
                out.push(deal);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> DealContext {
        let mut ctx = DealContext::default();
        ctx.stage_names.insert(7, "Estimation".to_string());
        ctx.pipeline_names.insert(1, "Sales".to_string());
        ctx.field_keys
            .insert("doc_brief_url".to_string(), "abc_brief".to_string());
        ctx.field_keys
            .insert("doc_scope_url".to_string(), "abc_scope".to_string());
        ctx.field_keys
            .insert("Future Confidence".to_string(), "abc_conf".to_string());
        ctx
    }

    #[test]
    fn parses_pipedrive_deal() {
        let raw = json!({
            "id": 12,
            "title": "Acme rebuild",
            "stage_id": 7,
            "pipeline_id": 1,
            "owner_id": {"id": 5, "name": "Dana", "value": 5},
            "value": 15000,
            "currency": "eur",
            "expected_close_date": "2026-11-30",
            "stage_change_time": "2026-10-01 09:30:00",
            "org_id": {"name": "Acme GmbH", "value": 3},
            "person_name": "Kim",
            "abc_brief": "https://docs.example.com/acme-brief",
            "abc_scope": "tbd",
            "abc_conf": "High"
        });
        let record = DealRecord::from_pipedrive(&raw, &ctx(), &Config::default()).unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.external_stage, "Estimation");
        assert_eq!(record.pipeline, "Sales");
        assert_eq!(record.field(DealField::Owner), Some("5"));
        assert_eq!(record.field(DealField::Budget), Some("15000"));
        assert_eq!(record.field(DealField::Deadline), Some("2026-11-30"));
        assert_eq!(
            record.field(DealField::Brief),
            Some("https://docs.example.com/acme-brief")
        );
        // Not a URL, so it does not satisfy the scope document.
        assert!(!record.has(DealField::Scope));
        assert_eq!(record.company, "Acme GmbH");
        assert_eq!(record.contact, "Kim");
        assert_eq!(record.owner_name, "Dana");
        assert_eq!(record.currency, "EUR");
        assert_eq!(record.passthrough.get("confidence").map(String::as_str), Some("High"));
        assert_eq!(
            record.stage_changed_at.unwrap().to_rfc3339(),
            "2026-10-01T09:30:00+00:00"
        );
    }

    #[test]
    fn zero_and_blank_values_are_absent() {
        let raw = json!({"id": "3", "value": 0, "owner_id": "0", "expected_close_date": "  "});
        let record = DealRecord::from_pipedrive(&raw, &ctx(), &Config::default()).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.title, "Deal 3");
        assert!(!record.has(DealField::Budget));
        assert!(!record.has(DealField::Owner));
        assert!(!record.has(DealField::Deadline));
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = DealRecord::from_pipedrive(&json!({"title": "x"}), &ctx(), &Config::default())
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedDeal { .. }));
    }

    #[test]
    fn list_valued_field_is_malformed() {
        let raw = json!({"id": 4, "abc_brief": ["a", "b"]});
        let err = DealRecord::from_pipedrive(&raw, &ctx(), &Config::default()).unwrap_err();
        match err {
            SyncError::MalformedDeal { deal_id, reason } => {
                assert_eq!(deal_id, "4");
                assert!(reason.contains("brief"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stage_change_falls_back_to_update_time() {
        let raw = json!({"id": 9, "update_time": "2026-02-02T10:00:00Z"});
        let record = DealRecord::from_pipedrive(&raw, &ctx(), &Config::default()).unwrap();
        assert_eq!(
            record.stage_changed_at.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
        );
    }

    #[test]
    fn parse_timestamp_shapes() {
        assert!(parse_timestamp("2026-02-01").is_some());
        assert!(parse_timestamp("2026-02-01 10:00:00").is_some());
        assert!(parse_timestamp("2026-02-01T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2026-02-01T10:00:00.123").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn dedupe_keeps_latest_update() {
        let deals = vec![
            json!({"id": 1, "update_time": "2026-02-01 10:00:00", "title": "old"}),
            json!({"id": 2, "update_time": "2026-02-01 10:00:00"}),
            json!({"id": 1, "update_time": "2026-02-02 10:00:00", "title": "new"}),
        ];
        let deduped = dedupe_by_id(deals);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0]["title"], "new");
        assert_eq!(deal_id(&deduped[1]), Some(2));
    }

    #[test]
    fn fill_missing_links_keeps_existing() {
        let mut record = DealRecord::new(1, "x").with_field(DealField::Brief, "https://a/brief");
        let mut links = BTreeMap::new();
        links.insert(DealField::Brief, "https://b/brief".to_string());
        links.insert(DealField::EstimateLink, "https://b/estimate".to_string());
        links.insert(DealField::Owner, "ignored".to_string());
        record.fill_missing_links(links);
        assert_eq!(record.field(DealField::Brief), Some("https://a/brief"));
        assert_eq!(record.field(DealField::EstimateLink), Some("https://b/estimate"));
        assert!(!record.has(DealField::Owner));
    }
}
