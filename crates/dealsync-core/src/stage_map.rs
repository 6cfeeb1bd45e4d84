use crate::config::StageMapConfig;
use crate::types::Stage;

/// Translate a CRM stage label into a board stage.
///
/// Explicit entries match exactly first, then case-insensitively. Blank,
/// pre-opportunity and unrecognised labels all land on the configured default.
pub fn map_stage(label: &str, cfg: &StageMapConfig) -> Stage {
    let name = label.trim();
    if name.is_empty() {
        return cfg.default;
    }

    if let Some(stage) = cfg.explicit_map.get(name) {
        return *stage;
    }
    if let Some((_, stage)) = cfg
        .explicit_map
        .iter()
        .find(|(src, _)| src.eq_ignore_ascii_case(name))
    {
        return *stage;
    }

    if cfg
        .pre_opportunity_stage_names
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
    {
        return cfg.default;
    }

    tracing::debug!(label = name, default = %cfg.default, "unmapped stage label");
    cfg.default
}
