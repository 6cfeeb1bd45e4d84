use crate::cmd::load_config;
use crate::output::{print_json, print_table};
use clap::Subcommand;
use dealsync_core::stage_map::map_stage;
use dealsync_core::types::Stage;
use std::path::Path;

#[derive(Subcommand)]
pub enum StageSubcommand {
    /// List board stages in order with the fields each gate requires
    List,

    /// Show which board stage a CRM stage label maps to
    Map {
        /// CRM stage label, e.g. "Proposal Presented"
        label: String,
    },
}

pub fn run(root: &Path, subcmd: StageSubcommand, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    match subcmd {
        StageSubcommand::List => {
            let stages: Vec<serde_json::Value> = Stage::all()
                .iter()
                .map(|stage| {
                    serde_json::json!({
                        "stage": stage,
                        "requires": config.gates.required_for(*stage),
                    })
                })
                .collect();
            if json {
                return print_json(&stages);
            }
            let rows = Stage::all()
                .iter()
                .enumerate()
                .map(|(i, stage)| {
                    let required = config.gates.required_for(*stage);
                    let requires = if required.is_empty() {
                        "-".to_string()
                    } else {
                        required
                            .iter()
                            .map(|f| f.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    vec![(i + 1).to_string(), stage.to_string(), requires]
                })
                .collect();
            print_table(&["#", "STAGE", "REQUIRES"], rows);
            Ok(())
        }
        StageSubcommand::Map { label } => {
            let stage = map_stage(&label, &config.stages);
            if json {
                print_json(&serde_json::json!({ "label": label, "stage": stage }))
            } else {
                println!("{stage}");
                Ok(())
            }
        }
    }
}
