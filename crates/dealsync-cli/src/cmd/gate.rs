use crate::cmd::load_config;
use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use dealsync_core::deal::DealRecord;
use dealsync_core::gate;
use dealsync_core::readiness;
use dealsync_core::types::{DealField, Stage};
use std::path::Path;

#[derive(Subcommand)]
pub enum GateSubcommand {
    /// Decide the accepted stage for a proposed stage and a set of fields
    Check {
        /// Proposed board stage, e.g. "Estimation"
        #[arg(long)]
        stage: String,

        /// Known field as key=value (repeatable), e.g. --field brief=https://...
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// Stage currently stored on the board
        #[arg(long)]
        persisted_stage: Option<String>,

        /// Sync notes currently stored on the board
        #[arg(long)]
        persisted_notes: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: GateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        GateSubcommand::Check {
            stage,
            fields,
            persisted_stage,
            persisted_notes,
        } => check(
            root,
            &stage,
            &fields,
            persisted_stage.as_deref(),
            persisted_notes.as_deref(),
            json,
        ),
    }
}

fn parse_field(raw: &str) -> anyhow::Result<(DealField, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let field: DealField = key.trim().parse()?;
    Ok((field, value.to_string()))
}

fn check(
    root: &Path,
    stage: &str,
    fields: &[String],
    persisted_stage: Option<&str>,
    persisted_notes: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let proposed: Stage = stage.parse()?;

    let mut record = DealRecord::new(0, "gate check");
    for raw in fields {
        let (field, value) = parse_field(raw)?;
        record.set_field(field, value);
    }

    let decision = gate::enforce(proposed, &record, &config.gates);
    let ready = readiness::evaluate(proposed, &record, &config.gates);

    let needs_write = match persisted_stage {
        Some(s) => {
            let persisted: Stage = s.parse().context("invalid --persisted-stage")?;
            Some(decision.needs_write(Some(persisted), persisted_notes.unwrap_or("")))
        }
        None if persisted_notes.is_some() => {
            Some(decision.needs_write(None, persisted_notes.unwrap_or("")))
        }
        None => None,
    };

    if json {
        return print_json(&serde_json::json!({
            "proposed": decision.proposed,
            "accepted": decision.accepted,
            "gate_status": decision.status_label(),
            "reason": decision.reason,
            "missing": decision.missing,
            "readiness_percent": ready.percent,
            "docs_status": ready.docs_status,
            "needs_write": needs_write,
        }));
    }

    let mut lines = vec![
        ("proposed", decision.proposed.to_string()),
        ("accepted", decision.accepted.to_string()),
        ("gate", decision.status_label().to_string()),
        ("readiness", format!("{}%", ready.percent)),
        ("docs", ready.docs_status.to_string()),
    ];
    if let Some(reason) = &decision.reason {
        lines.push(("reason", reason.clone()));
    }
    if let Some(write) = needs_write {
        lines.push(("needs write", if write { "yes" } else { "no" }.to_string()));
    }
    print_fields(&lines);
    Ok(())
}
