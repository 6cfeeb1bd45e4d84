use crate::board::keys;
use crate::error::{Result, SyncError};
use crate::paths;
use crate::types::{DealField, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StageMapConfig
// ---------------------------------------------------------------------------

/// Translation table from CRM stage labels to board stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMapConfig {
    #[serde(default = "default_explicit_map")]
    pub explicit_map: BTreeMap<String, Stage>,
    #[serde(default = "default_pre_opportunity")]
    pub pre_opportunity_stage_names: Vec<String>,
    #[serde(default)]
    pub default: Stage,
}

fn default_explicit_map() -> BTreeMap<String, Stage> {
    let mut m = BTreeMap::new();
    m.insert("Opportunity".to_string(), Stage::ScopeDefinition);
    m.insert("Scope Definition".to_string(), Stage::ScopeDefinition);
    m.insert("Estimation".to_string(), Stage::Estimation);
    m.insert("Validation".to_string(), Stage::Validation);
    m.insert("Proposal Presented".to_string(), Stage::Presented);
    m.insert("Presented".to_string(), Stage::Presented);
    m.insert("Negotiation".to_string(), Stage::Potential);
    m.insert("Won".to_string(), Stage::Won);
    m
}

fn default_pre_opportunity() -> Vec<String> {
    vec![
        "Company Longlist".to_string(),
        "Contacted".to_string(),
        "Replied".to_string(),
        "Meeting Booked".to_string(),
    ]
}

impl Default for StageMapConfig {
    fn default() -> Self {
        Self {
            explicit_map: default_explicit_map(),
            pre_opportunity_stage_names: default_pre_opportunity(),
            default: Stage::FuturePipeline,
        }
    }
}

// ---------------------------------------------------------------------------
// GateRules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRules {
    #[serde(default = "default_required")]
    pub required: BTreeMap<Stage, Vec<DealField>>,
    /// When false, a failed gate is reported but the stage is kept.
    #[serde(default = "default_hard_rollback")]
    pub hard_rollback: bool,
    #[serde(default = "default_reason_template")]
    pub rollback_reason_template: String,
}

fn default_required() -> BTreeMap<Stage, Vec<DealField>> {
    let mut m = BTreeMap::new();
    m.insert(Stage::ScopeDefinition, vec![DealField::Brief]);
    m.insert(
        Stage::Estimation,
        vec![
            DealField::Brief,
            DealField::Scope,
            DealField::Owner,
            DealField::Budget,
        ],
    );
    m.insert(Stage::Validation, vec![DealField::EstimateLink]);
    m.insert(
        Stage::Presented,
        vec![DealField::EstimateLink, DealField::PresentationLink],
    );
    m.insert(
        Stage::Potential,
        vec![
            DealField::PresentationLink,
            DealField::Deadline,
            DealField::Budget,
        ],
    );
    m
}

fn default_hard_rollback() -> bool {
    true
}

fn default_reason_template() -> String {
    "Blocked move to {target_stage}: missing {missing}".to_string()
}

impl Default for GateRules {
    fn default() -> Self {
        Self {
            required: default_required(),
            hard_rollback: default_hard_rollback(),
            rollback_reason_template: default_reason_template(),
        }
    }
}

impl GateRules {
    /// Fields a record must carry to occupy `stage`. Empty when ungated.
    pub fn required_for(&self, stage: Stage) -> &[DealField] {
        self.required
            .get(&stage)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn render_reason(&self, target: Stage, missing: &[DealField]) -> String {
        let missing = missing
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.rollback_reason_template
            .replace("{target_stage}", target.as_str())
            .replace("{missing}", &missing)
    }
}

// ---------------------------------------------------------------------------
// FieldSource
// ---------------------------------------------------------------------------

/// Where a gate field is read from on a Pipedrive deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSource {
    /// Dotted paths into the deal object; the first present value wins.
    Builtin { paths: Vec<String> },
    /// A custom deal field, addressed by its display name.
    Custom { name: String },
}

fn builtin(paths: &[&str]) -> FieldSource {
    FieldSource::Builtin {
        paths: paths.iter().map(|p| p.to_string()).collect(),
    }
}

fn custom(name: &str) -> FieldSource {
    FieldSource::Custom {
        name: name.to_string(),
    }
}

fn default_fields() -> BTreeMap<DealField, FieldSource> {
    let mut m = BTreeMap::new();
    m.insert(DealField::Brief, custom("doc_brief_url"));
    m.insert(DealField::Scope, custom("doc_scope_url"));
    m.insert(
        DealField::Owner,
        builtin(&["owner_id.value", "owner_id.id", "owner_id", "user_id.id"]),
    );
    m.insert(DealField::Deadline, builtin(&["expected_close_date"]));
    m.insert(DealField::Budget, builtin(&["value"]));
    m.insert(DealField::EstimateLink, custom("doc_estimate_url"));
    m.insert(DealField::PresentationLink, custom("doc_presentation_url"));
    m
}

fn default_passthrough() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert(keys::CONFIDENCE.to_string(), "Future Confidence".to_string());
    m
}

// ---------------------------------------------------------------------------
// BoardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Used when `NOTION_DATABASE_ID` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    /// Logical property key → board property name.
    #[serde(default = "default_properties")]
    pub properties: BTreeMap<String, String>,
    /// Manually curated board properties the sync never overwrites.
    #[serde(default = "default_protected")]
    pub protected: Vec<String>,
}

fn default_properties() -> BTreeMap<String, String> {
    [
        (keys::TITLE, "Name"),
        (keys::CRM_DEAL_ID, "CRM Deal ID"),
        (keys::STAGE, "Stage"),
        (keys::PIPELINE, "Pipeline"),
        (keys::COMPANY, "Company"),
        (keys::CONTACT, "Contact"),
        (keys::OWNER, "Owner"),
        (keys::DEAL_VALUE, "Deal Value"),
        (keys::CURRENCY, "Currency"),
        (keys::EXPECTED_CLOSE_DATE, "Expected Close Date"),
        (keys::PIPEDRIVE_URL, "Pipedrive URL"),
        (keys::DAYS_IN_STAGE, "Days in Stage"),
        (keys::SLA_COLOR, "SLA Color"),
        (keys::READINESS_PERCENT, "Readiness %"),
        (keys::GATE_STATUS, "Gate Status"),
        (keys::SYNC_NOTES, "Sync Notes"),
        (keys::DOCS_STATUS, "Docs Status"),
        (keys::BRIEF_LINK, "Brief Link"),
        (keys::SCOPE_LINK, "Scope Link"),
        (keys::ESTIMATE_LINK, "Estimate Link"),
        (keys::PRESENTATION_LINK, "Presentation Link"),
        (keys::LAST_SYNC_AT, "Last Sync At"),
        (keys::CONFIDENCE, "Future Confidence"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_protected() -> Vec<String> {
    vec![
        "Future Confidence".to_string(),
        "Size".to_string(),
        "Domain".to_string(),
    ]
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            database_id: None,
            properties: default_properties(),
            protected: default_protected(),
        }
    }
}

impl BoardConfig {
    pub fn property_name(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    pub fn is_protected(&self, property: &str) -> bool {
        self.protected.iter().any(|p| p == property)
    }
}

// ---------------------------------------------------------------------------
// PipedriveConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipedriveConfig {
    #[serde(default = "default_deals_status")]
    pub deals_status: String,
    /// Pipeline names to include (case-insensitive). Empty means all.
    #[serde(default)]
    pub pipelines: Vec<String>,
    /// 0 means no limit.
    #[serde(default)]
    pub max_deals: usize,
    #[serde(default)]
    pub scan_notes: bool,
    #[serde(default = "default_notes_limit")]
    pub notes_limit: u32,
    /// Substrings that classify a URL found in notes as a given document.
    #[serde(default = "default_doc_hints")]
    pub doc_hints: BTreeMap<DealField, Vec<String>>,
}

fn default_deals_status() -> String {
    "all_not_deleted".to_string()
}

fn default_notes_limit() -> u32 {
    20
}

fn default_doc_hints() -> BTreeMap<DealField, Vec<String>> {
    let hints = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let mut m = BTreeMap::new();
    m.insert(DealField::Brief, hints(&["brief"]));
    m.insert(DealField::Scope, hints(&["scope", "sow"]));
    m.insert(DealField::EstimateLink, hints(&["estimate", "estimation", "quote"]));
    m.insert(
        DealField::PresentationLink,
        hints(&["presentation", "deck", "slides", "pitch"]),
    );
    m
}

impl Default for PipedriveConfig {
    fn default() -> Self {
        Self {
            deals_status: default_deals_status(),
            pipelines: Vec::new(),
            max_deals: 0,
            scan_notes: false,
            notes_limit: default_notes_limit(),
            doc_hints: default_doc_hints(),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: f64,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    4
}

fn default_backoff_secs() -> f64 {
    1.5
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub stages: StageMapConfig,
    #[serde(default)]
    pub gates: GateRules,
    #[serde(default = "default_fields")]
    pub fields: BTreeMap<DealField, FieldSource>,
    /// Logical key → Pipedrive custom field name, copied verbatim to the board.
    #[serde(default = "default_passthrough")]
    pub passthrough: BTreeMap<String, String>,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub pipedrive: PipedriveConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            stages: StageMapConfig::default(),
            gates: GateRules::default(),
            fields: default_fields(),
            passthrough: default_passthrough(),
            board: BoardConfig::default(),
            pipedrive: PipedriveConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SyncError::NotInitialized);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // The rollback walk relies on the first stage being ungated.
        if !self.gates.required_for(Stage::FuturePipeline).is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "gates.required declares fields for '{}', which must stay ungated",
                    Stage::FuturePipeline
                ),
            });
        }

        if !self.gates.rollback_reason_template.contains("{missing}") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "gates.rollback_reason_template does not mention {missing}".to_string(),
            });
        }

        for key in self.board.properties.keys() {
            if !keys::ALL.contains(&key.as_str()) && !self.passthrough.contains_key(key) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown property key '{key}' in board.properties"),
                });
            }
        }

        for key in self.passthrough.keys() {
            if !self.board.properties.contains_key(key) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "passthrough field '{key}' has no board.properties entry and is never written"
                    ),
                });
            }
        }

        for field in DealField::all() {
            if !self.fields.contains_key(field) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("deal field '{field}' has no source in fields"),
                });
            }
        }

        for key in [keys::CRM_DEAL_ID, keys::STAGE, keys::SYNC_NOTES] {
            match self.board.property_name(key) {
                None => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("board.properties is missing required key '{key}'"),
                }),
                Some(name) if self.board.is_protected(name) => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("property '{name}' ({key}) is listed in board.protected"),
                }),
                Some(_) => {}
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipedriveCredentials {
    pub domain: String,
    pub token: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct NotionCredentials {
    pub token: String,
    pub database_id: Option<String>,
    pub base_url: String,
}

pub const NOTION_DEFAULT_BASE: &str = "https://api.notion.com";

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PipedriveCredentials {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let domain = non_empty(&lookup, "PIPEDRIVE_DOMAIN");
        let token = non_empty(&lookup, "PIPEDRIVE_API_TOKEN");
        match (domain, token) {
            (Some(domain), Some(token)) => {
                let base_url = non_empty(&lookup, "PIPEDRIVE_BASE_URL")
                    .unwrap_or_else(|| format!("https://{domain}.pipedrive.com/api/v1"));
                Ok(Self {
                    domain,
                    token,
                    base_url,
                })
            }
            (domain, token) => {
                let mut missing = Vec::new();
                if domain.is_none() {
                    missing.push("PIPEDRIVE_DOMAIN".to_string());
                }
                if token.is_none() {
                    missing.push("PIPEDRIVE_API_TOKEN".to_string());
                }
                Err(SyncError::MissingEnv(missing))
            }
        }
    }

    /// Web link prefix for deals; append the deal id.
    pub fn deal_url_base(&self) -> String {
        format!("https://{}.pipedrive.com/deal/", self.domain)
    }

    pub fn deal_url(&self, deal_id: i64) -> String {
        format!("{}{deal_id}", self.deal_url_base())
    }
}

fn resolve_database_id(cfg: &Config, lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    non_empty(lookup, "NOTION_DATABASE_ID").or_else(|| {
        cfg.board
            .database_id
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

impl NotionCredentials {
    pub fn from_lookup(
        cfg: &Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let token = non_empty(&lookup, "NOTION_API_TOKEN")
            .ok_or_else(|| SyncError::MissingEnv(vec!["NOTION_API_TOKEN".to_string()]))?;
        let database_id = resolve_database_id(cfg, &lookup);
        let base_url =
            non_empty(&lookup, "NOTION_BASE_URL").unwrap_or_else(|| NOTION_DEFAULT_BASE.to_string());
        Ok(Self {
            token,
            database_id,
            base_url,
        })
    }

    pub fn from_env(cfg: &Config) -> Result<Self> {
        Self::from_lookup(cfg, |k| std::env::var(k).ok())
    }
}

/// Both sides of a sync run. Every missing variable is reported at once.
pub fn sync_credentials_from_lookup(
    cfg: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(PipedriveCredentials, NotionCredentials, String)> {
    let mut missing = Vec::new();
    let pipedrive = match PipedriveCredentials::from_lookup(&lookup) {
        Ok(c) => Some(c),
        Err(SyncError::MissingEnv(m)) => {
            missing.extend(m);
            None
        }
        Err(e) => return Err(e),
    };
    let notion = match NotionCredentials::from_lookup(cfg, &lookup) {
        Ok(c) => Some(c),
        Err(SyncError::MissingEnv(m)) => {
            missing.extend(m);
            None
        }
        Err(e) => return Err(e),
    };
    let database_id = resolve_database_id(cfg, &lookup);
    if database_id.is_none() {
        missing.push("NOTION_DATABASE_ID".to_string());
    }
    match (pipedrive, notion, database_id) {
        (Some(p), Some(n), Some(db)) if missing.is_empty() => Ok((p, n, db)),
        _ => Err(SyncError::MissingEnv(missing)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(
            parsed.gates.required_for(Stage::Validation),
            &[DealField::EstimateLink]
        );
        assert_eq!(
            parsed.stages.explicit_map.get("Opportunity"),
            Some(&Stage::ScopeDefinition)
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("version: 1\n").unwrap();
        assert!(cfg.gates.hard_rollback);
        assert_eq!(cfg.board.property_name(keys::STAGE), Some("Stage"));
        assert!(cfg.board.is_protected("Future Confidence"));
        assert_eq!(cfg.pipedrive.deals_status, "all_not_deleted");
        assert_eq!(cfg.http.max_retries, 4);
    }

    #[test]
    fn gates_parse_from_board_labels() {
        let yaml = r#"
gates:
  required:
    Estimation: [owner, budget]
    Potential 80%+: [deadline]
  hard_rollback: false
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.gates.required_for(Stage::Estimation),
            &[DealField::Owner, DealField::Budget]
        );
        assert_eq!(cfg.gates.required_for(Stage::Potential), &[DealField::Deadline]);
        assert!(cfg.gates.required_for(Stage::ScopeDefinition).is_empty());
        assert!(!cfg.gates.hard_rollback);
    }

    #[test]
    fn field_sources_are_tagged() {
        let yaml = r#"
fields:
  owner:
    type: builtin
    paths: [owner_id.id]
  brief:
    type: custom
    name: Brief URL
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.fields[&DealField::Brief],
            FieldSource::Custom {
                name: "Brief URL".to_string()
            }
        );
        assert!(matches!(
            &cfg.fields[&DealField::Owner],
            FieldSource::Builtin { paths } if paths == &["owner_id.id".to_string()]
        ));
    }

    #[test]
    fn render_reason_lists_missing_fields() {
        let rules = GateRules::default();
        let reason = rules.render_reason(Stage::Estimation, &[DealField::Owner, DealField::Budget]);
        assert_eq!(reason, "Blocked move to Estimation: missing owner, budget");
    }

    #[test]
    fn validate_default_config_is_clean() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_rejects_gated_floor() {
        let mut cfg = Config::default();
        cfg.gates
            .required
            .insert(Stage::FuturePipeline, vec![DealField::Owner]);
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("must stay ungated")));
    }

    #[test]
    fn validate_unknown_property_key() {
        let mut cfg = Config::default();
        cfg.board
            .properties
            .insert("bogus".to_string(), "Bogus".to_string());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("unknown property key 'bogus'")));
    }

    #[test]
    fn validate_protected_stage_property() {
        let mut cfg = Config::default();
        cfg.board.protected.push("Stage".to_string());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("'Stage'")));
    }

    #[test]
    fn validate_template_without_missing() {
        let mut cfg = Config::default();
        cfg.gates.rollback_reason_template = "blocked".to_string();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("{missing}")));
    }

    #[test]
    fn credentials_report_every_missing_var() {
        let cfg = Config::default();
        let err = sync_credentials_from_lookup(&cfg, lookup_from(&[("PIPEDRIVE_DOMAIN", "acme")]))
            .unwrap_err();
        match err {
            SyncError::MissingEnv(missing) => {
                assert_eq!(
                    missing,
                    vec![
                        "PIPEDRIVE_API_TOKEN".to_string(),
                        "NOTION_API_TOKEN".to_string(),
                        "NOTION_DATABASE_ID".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn credentials_fall_back_to_config_database() {
        let mut cfg = Config::default();
        cfg.board.database_id = Some("db-from-config".to_string());
        let (pd, notion, db) = sync_credentials_from_lookup(
            &cfg,
            lookup_from(&[
                ("PIPEDRIVE_DOMAIN", "acme"),
                ("PIPEDRIVE_API_TOKEN", "pd-token"),
                ("NOTION_API_TOKEN", "  secret  "),
            ]),
        )
        .unwrap();
        assert_eq!(pd.base_url, "https://acme.pipedrive.com/api/v1");
        assert_eq!(pd.deal_url(42), "https://acme.pipedrive.com/deal/42");
        assert_eq!(notion.token, "secret");
        assert_eq!(notion.base_url, NOTION_DEFAULT_BASE);
        assert_eq!(db, "db-from-config");
    }

    #[test]
    fn base_url_overrides() {
        let pd = PipedriveCredentials::from_lookup(lookup_from(&[
            ("PIPEDRIVE_DOMAIN", "acme"),
            ("PIPEDRIVE_API_TOKEN", "t"),
            ("PIPEDRIVE_BASE_URL", "http://127.0.0.1:9999"),
        ]))
        .unwrap();
        assert_eq!(pd.base_url, "http://127.0.0.1:9999");
    }
}
