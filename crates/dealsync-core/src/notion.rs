//! Notion database client and the property encoding it expects.

use crate::board::{
    keys, BoardEntry, BoardSchema, BoardSnapshot, BoardValue, BoardWriter, PropertyKind,
    MAX_TEXT_LEN,
};
use crate::config::{BoardConfig, HttpConfig, NotionCredentials};
use crate::error::Result;
use crate::http::HttpClient;
use crate::types::{DocsStatus, RunMode, SlaColor, Stage};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

pub const NOTION_VERSION: &str = "2022-06-28";

// ---------------------------------------------------------------------------
// NotionClient
// ---------------------------------------------------------------------------

pub struct NotionClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl NotionClient {
    pub fn new(creds: &NotionCredentials, cfg: &HttpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("notion", cfg)?,
            base_url: creds.base_url.trim_end_matches('/').to_string(),
            token: creds.token.clone(),
        })
    }

    fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.http.send_json(builder, path)
    }

    pub fn get_database(&self, database_id: &str) -> Result<Value> {
        self.call(Method::GET, &format!("/v1/databases/{database_id}"), None)
    }

    /// Every page in the database, following `next_cursor`.
    pub fn list_pages(&self, database_id: &str) -> Result<Vec<Value>> {
        let path = format!("/v1/databases/{database_id}/query");
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({"page_size": 100});
            if let Some(c) = &cursor {
                body["start_cursor"] = Value::String(c.clone());
            }
            let payload = self.call(Method::POST, &path, Some(&body))?;
            if let Some(results) = payload.get("results").and_then(Value::as_array) {
                pages.extend(results.iter().cloned());
            }
            if payload.get("has_more").and_then(Value::as_bool) != Some(true) {
                break;
            }
            match payload.get("next_cursor").and_then(Value::as_str) {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }
        Ok(pages)
    }

    pub fn create_page(&self, database_id: &str, properties: Value) -> Result<Value> {
        let body = json!({
            "parent": {"database_id": database_id},
            "properties": properties,
        });
        self.call(Method::POST, "/v1/pages", Some(&body))
    }

    pub fn update_page(&self, page_id: &str, properties: Value) -> Result<Value> {
        let body = json!({"properties": properties});
        self.call(Method::PATCH, &format!("/v1/pages/{page_id}"), Some(&body))
    }

    pub fn archive_page(&self, page_id: &str) -> Result<()> {
        let body = json!({"archived": true});
        self.call(Method::PATCH, &format!("/v1/pages/{page_id}"), Some(&body))?;
        Ok(())
    }

    pub fn create_database(&self, parent_page_id: &str, title: &str, properties: Value) -> Result<Value> {
        let body = json!({
            "parent": {"type": "page_id", "page_id": parent_page_id},
            "title": plain_text(title),
            "properties": properties,
        });
        self.call(Method::POST, "/v1/databases", Some(&body))
    }

    /// Schema and every page of `database_id`, keyed by CRM deal id.
    pub fn snapshot(&self, database_id: &str, cfg: &BoardConfig) -> Result<BoardSnapshot> {
        let schema = schema_from_database(&self.get_database(database_id)?);
        let pages = self.list_pages(database_id)?;
        let id_property = cfg.property_name(keys::CRM_DEAL_ID).unwrap_or_default();

        let mut entries = HashMap::new();
        let mut page_ids = Vec::with_capacity(pages.len());
        for page in &pages {
            let Some(page_id) = page.get("id").and_then(Value::as_str) else {
                continue;
            };
            page_ids.push(page_id.to_string());
            let values = read_page(page);
            let deal_id = match values.get(id_property) {
                Some(BoardValue::Number(n)) => Some(*n as i64),
                Some(BoardValue::Text(s)) => s.trim().parse().ok(),
                _ => None,
            };
            let Some(deal_id) = deal_id else {
                continue;
            };
            entries.insert(
                deal_id,
                BoardEntry {
                    page_id: page_id.to_string(),
                    deal_id,
                    values,
                },
            );
        }
        tracing::info!(
            pages = page_ids.len(),
            linked = entries.len(),
            "loaded board snapshot"
        );
        Ok(BoardSnapshot {
            schema,
            entries,
            page_ids,
        })
    }
}

// ---------------------------------------------------------------------------
// Reading properties
// ---------------------------------------------------------------------------

pub fn schema_from_database(database: &Value) -> BoardSchema {
    let properties = database
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, def)| {
                    let kind = def
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .parse::<PropertyKind>()
                        .unwrap_or_else(|never| match never {});
                    (name.clone(), kind)
                })
                .collect()
        })
        .unwrap_or_default();
    BoardSchema { properties }
}

fn read_page(page: &Value) -> BTreeMap<String, BoardValue> {
    page.get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), read_property(prop)))
                .collect()
        })
        .unwrap_or_default()
}

fn joined_plain_text(items: Option<&Value>) -> String {
    items
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Decode one page property value. Unsupported kinds read as empty.
pub fn read_property(prop: &Value) -> BoardValue {
    let kind = prop.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "title" | "rich_text" => BoardValue::text(joined_plain_text(prop.get(kind))),
        "number" => BoardValue::number(prop.get("number").and_then(Value::as_f64)),
        "select" | "status" => BoardValue::text(
            prop.get(kind)
                .and_then(|v| v.get("name"))
                .and_then(Value::as_str)
                .unwrap_or(""),
        ),
        "multi_select" => {
            let names: Vec<&str> = prop
                .get(kind)
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .filter_map(|o| o.get("name").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default();
            BoardValue::text(names.join(", "))
        }
        "url" | "email" | "phone_number" => {
            BoardValue::text(prop.get(kind).and_then(Value::as_str).unwrap_or(""))
        }
        "date" => BoardValue::date(
            prop.get("date")
                .and_then(|d| d.get("start"))
                .and_then(Value::as_str),
        ),
        "checkbox" => match prop.get("checkbox").and_then(Value::as_bool) {
            Some(b) => BoardValue::Text(b.to_string()),
            None => BoardValue::Empty,
        },
        _ => BoardValue::Empty,
    }
}

// ---------------------------------------------------------------------------
// Writing properties
// ---------------------------------------------------------------------------

fn plain_text(text: &str) -> Value {
    if text.is_empty() {
        return json!([]);
    }
    let content: String = text.chars().take(MAX_TEXT_LEN).collect();
    json!([{"type": "text", "text": {"content": content}}])
}

/// Encode `value` for a property of `kind`. `None` for kinds the sync
/// cannot write.
pub fn render_property(kind: &PropertyKind, value: &BoardValue) -> Option<Value> {
    let text = value.to_string();
    let rendered = match kind {
        PropertyKind::Title => json!({"title": plain_text(&text)}),
        PropertyKind::RichText => json!({"rich_text": plain_text(&text)}),
        PropertyKind::Number => {
            let number = match value {
                BoardValue::Number(n) => Some(*n),
                BoardValue::Text(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            json!({"number": number})
        }
        // Select option names may not contain commas.
        PropertyKind::Select | PropertyKind::Status => {
            let key = kind.as_str();
            if value.is_empty() {
                json!({key: null})
            } else {
                json!({key: {"name": text.replace(',', " ")}})
            }
        }
        PropertyKind::MultiSelect => {
            let options: Vec<Value> = text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| json!({"name": s}))
                .collect();
            json!({"multi_select": options})
        }
        PropertyKind::Url => {
            if value.is_empty() {
                json!({"url": null})
            } else {
                json!({"url": text})
            }
        }
        PropertyKind::Date => {
            if value.is_empty() {
                json!({"date": null})
            } else {
                json!({"date": {"start": text}})
            }
        }
        PropertyKind::Checkbox => json!({"checkbox": text == "true"}),
        PropertyKind::Other(_) => return None,
    };
    Some(rendered)
}

/// Encode a property-name → value map against `schema`, dropping names the
/// schema does not know or cannot be written.
pub fn render_properties(schema: &BoardSchema, values: &BTreeMap<String, BoardValue>) -> Value {
    let mut out = Map::new();
    for (name, value) in values {
        let Some(kind) = schema.kind_of(name) else {
            continue;
        };
        match render_property(kind, value) {
            Some(rendered) => {
                out.insert(name.clone(), rendered);
            }
            None => tracing::debug!(property = %name, kind = %kind, "unsupported property kind"),
        }
    }
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Board creation
// ---------------------------------------------------------------------------

fn select_options(names: &[&str]) -> Value {
    let options: Vec<Value> = names.iter().map(|n| json!({"name": n})).collect();
    json!({"select": {"options": options}})
}

fn property_definition(key: &str) -> Value {
    match key {
        keys::STAGE => {
            let names: Vec<&str> = Stage::all().iter().map(|s| s.as_str()).collect();
            select_options(&names)
        }
        keys::CURRENCY => select_options(&["EUR", "USD", "CHF", "GBP"]),
        keys::SLA_COLOR => select_options(&[
            SlaColor::Green.as_str(),
            SlaColor::Yellow.as_str(),
            SlaColor::Red.as_str(),
        ]),
        keys::GATE_STATUS => select_options(&["Pass", "Blocked"]),
        keys::DOCS_STATUS => select_options(&[
            DocsStatus::NoLinks.as_str(),
            DocsStatus::Partial.as_str(),
            DocsStatus::Complete.as_str(),
        ]),
        keys::CONFIDENCE => select_options(&["Low", "Medium", "High"]),
        keys::DEAL_VALUE => json!({"number": {"format": "number_with_commas"}}),
        _ => match PropertyKind::for_key(key) {
            PropertyKind::Title => json!({"title": {}}),
            PropertyKind::Number => json!({"number": {"format": "number"}}),
            PropertyKind::Select => json!({"select": {}}),
            PropertyKind::Url => json!({"url": {}}),
            PropertyKind::Date => json!({"date": {}}),
            _ => json!({"rich_text": {}}),
        },
    }
}

/// Full property schema for a new board: every mapped key plus protected
/// properties the sync itself never fills.
pub fn board_schema_definition(cfg: &BoardConfig) -> Value {
    let mut props = Map::new();
    for (key, name) in &cfg.properties {
        props.insert(name.clone(), property_definition(key));
    }
    for name in &cfg.protected {
        if !props.contains_key(name) {
            props.insert(name.clone(), json!({"select": {}}));
        }
    }
    Value::Object(props)
}

/// Share URL for a database id.
pub fn database_url(database_id: &str) -> String {
    format!("https://www.notion.so/{}", database_id.replace('-', ""))
}

// ---------------------------------------------------------------------------
// NotionWriter
// ---------------------------------------------------------------------------

/// Applies planned writes to a live board.
pub struct NotionWriter<'a> {
    client: &'a NotionClient,
    database_id: String,
    schema: BoardSchema,
}

impl<'a> NotionWriter<'a> {
    pub fn new(client: &'a NotionClient, database_id: impl Into<String>, schema: BoardSchema) -> Self {
        Self {
            client,
            database_id: database_id.into(),
            schema,
        }
    }
}

impl BoardWriter for NotionWriter<'_> {
    fn mode(&self) -> RunMode {
        RunMode::Apply
    }

    fn create(&mut self, properties: &BTreeMap<String, BoardValue>) -> Result<()> {
        let payload = render_properties(&self.schema, properties);
        self.client.create_page(&self.database_id, payload)?;
        Ok(())
    }

    fn update(&mut self, page_id: &str, properties: &BTreeMap<String, BoardValue>) -> Result<()> {
        let payload = render_properties(&self.schema, properties);
        self.client.update_page(page_id, payload)?;
        Ok(())
    }

    fn archive(&mut self, page_id: &str) -> Result<()> {
        self.client.archive_page(page_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
