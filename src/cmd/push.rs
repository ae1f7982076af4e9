//! Save a drafts file against the backend — `fieldsync push`.

use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;
use std::sync::Arc;

use fieldsync::autosave::{AutoSaveScheduler, SaveOperation};
use fieldsync::errors::SaveError;
use fieldsync::gateway::HttpGateway;

use super::{load_config, load_drafts};
use crate::Cli;

pub async fn cmd_push(project_dir: &Path, cli: &Cli, file: &Path) -> Result<()> {
    let drafts = load_drafts(file)?;
    let config = load_config(project_dir, cli)?;
    let collection = config
        .collection()
        .context("No collection configured. Set gateway.collection, FIELDSYNC_COLLECTION or --collection")?;
    let gateway = Arc::new(HttpGateway::new(&config.gateway_settings()?)?);

    let on_screen = drafts.clone();
    let scheduler = AutoSaveScheduler::builder(gateway, collection.as_str())
        .config(config.autosave())
        .source(Arc::new(move || on_screen.clone()))
        .build();

    let mut failures = 0usize;
    for field in drafts {
        let identity = field.identity.clone();
        match scheduler.flush_now(field).await {
            Ok(outcome) => {
                let verb = match (outcome.operation, outcome.resolved_conflict) {
                    (SaveOperation::Create, _) => "created",
                    (SaveOperation::Update, Some(_)) => "merged",
                    (SaveOperation::Update, None) => "updated",
                };
                println!(
                    "{} {} -> {} ({})",
                    style(format!("{:<8}", verb)).green(),
                    identity,
                    outcome.field.id,
                    outcome.field.name
                );
            }
            Err(SaveError::NotEligible(reason)) => {
                println!("{} {} ({})", style(format!("{:<8}", "skipped")).yellow(), identity, reason);
            }
            Err(err) if err.is_user_visible(&identity) => {
                failures += 1;
                println!("{} {}: {}", style(format!("{:<8}", "failed")).red(), identity, err);
            }
            Err(err) => {
                println!("{} {}: {}", style(format!("{:<8}", "rejected")).yellow(), identity, err);
            }
        }
    }
    scheduler.shutdown();

    if failures > 0 {
        bail!("{} field(s) failed to save", failures);
    }
    Ok(())
}
