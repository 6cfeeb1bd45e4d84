use anyhow::Context;
use dealsync_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing dealsync in: {}", root.display());

    for p in [paths::dealsync_dir(root), paths::reports_dir(root)] {
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let entry = format!("{}/", paths::REPORTS_DIR);
    if io::ensure_gitignore_entry(root, &entry).context("failed to update .gitignore")? {
        println!("  added:   {entry} to .gitignore");
    }

    println!("\ndealsync initialized.");
    println!("Set PIPEDRIVE_DOMAIN, PIPEDRIVE_API_TOKEN, NOTION_API_TOKEN and NOTION_DATABASE_ID,");
    println!("then run: dealsync sync --dry-run");
    Ok(())
}
