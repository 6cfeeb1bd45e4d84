use crate::cmd::load_config;
use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use dealsync_core::config::NotionCredentials;
use dealsync_core::notion::{board_schema_definition, database_url, NotionClient};
use serde_json::Value;
use std::path::Path;

const DEFAULT_TITLE: &str = "Opportunities - CRM Sync";

#[derive(Subcommand)]
pub enum BoardSubcommand {
    /// Create a new Notion database with the full opportunity schema
    Create {
        /// Parent page (default: NOTION_PARENT_PAGE_ID, then the parent of the configured board)
        #[arg(long, env = "NOTION_PARENT_PAGE_ID")]
        parent_page_id: Option<String>,

        /// Database title
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Record the new database id in .dealsync/config.yaml
        #[arg(long)]
        save: bool,
    },
}

pub fn run(root: &Path, subcmd: BoardSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BoardSubcommand::Create {
            parent_page_id,
            title,
            save,
        } => create(root, parent_page_id, &title, save, json),
    }
}

fn parent_of(database: &Value) -> Option<String> {
    database
        .get("parent")
        .and_then(|p| p.get("page_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn create(
    root: &Path,
    parent_page_id: Option<String>,
    title: &str,
    save: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(root)?;
    let creds = NotionCredentials::from_env(&config).context("cannot reach Notion")?;
    let notion = NotionClient::new(&creds, &config.http)?;

    let parent = match parent_page_id.filter(|p| !p.trim().is_empty()) {
        Some(p) => p.trim().to_string(),
        None => {
            let source = creds.database_id.as_deref().context(
                "no --parent-page-id given and no existing board to take the parent page from",
            )?;
            let database = notion
                .get_database(source)
                .context("failed to read the configured board")?;
            parent_of(&database).context(
                "the configured board is not inside a page; pass --parent-page-id",
            )?
        }
    };

    let created = notion
        .create_database(&parent, title, board_schema_definition(&config.board))
        .context("failed to create database")?;
    let database_id = created
        .get("id")
        .and_then(Value::as_str)
        .context("Notion did not return a database id")?
        .to_string();
    tracing::info!(database_id = %database_id, "created board");

    if save {
        config.board.database_id = Some(database_id.clone());
        config.save(root).context("failed to write config.yaml")?;
    }

    if json {
        return print_json(&serde_json::json!({
            "database_id": database_id,
            "database_url": database_url(&database_id),
            "title": title,
            "parent_page_id": parent,
        }));
    }
    print_fields(&[
        ("database_id", database_id.clone()),
        ("url", database_url(&database_id)),
        ("title", title.to_string()),
    ]);
    if !save {
        println!("\nSet NOTION_DATABASE_ID={database_id} (or rerun with --save) to sync into it.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_page_from_database() {
        let db = serde_json::json!({"parent": {"type": "page_id", "page_id": "abc"}});
        assert_eq!(parent_of(&db).as_deref(), Some("abc"));
        let workspace = serde_json::json!({"parent": {"type": "workspace", "workspace": true}});
        assert_eq!(parent_of(&workspace), None);
    }
}
