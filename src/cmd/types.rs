//! Field type listing — `fieldsync types`.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use fieldsync::cache::ConfigCache;
use fieldsync::catalog::FieldTypeCatalog;
use fieldsync::gateway::HttpGateway;

use super::load_config;
use crate::Cli;

pub async fn cmd_types(project_dir: &Path, cli: &Cli, refresh: bool) -> Result<()> {
    let config = load_config(project_dir, cli)?;
    let gateway = Arc::new(HttpGateway::new(&config.gateway_settings()?)?);
    let catalog = FieldTypeCatalog::new(gateway, Arc::new(ConfigCache::new()), config.field_types_ttl());

    let types = if refresh {
        catalog.refresh().await?
    } else {
        catalog.types().await?
    };

    if types.is_empty() {
        println!("The backend reported no field types.");
        return Ok(());
    }

    for definition in &types {
        print!("{:<14} {}", definition.key, definition.label);
        if !definition.required_attributes.is_empty() {
            print!("  [requires: {}]", definition.required_attributes.join(", "));
        }
        println!();
        if let Some(description) = &definition.description {
            println!("{:<14} {}", "", description);
        }
    }

    Ok(())
}
