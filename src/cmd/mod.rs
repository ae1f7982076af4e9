//! CLI command implementations.
//!
//! | Module      | Commands handled |
//! |-------------|------------------|
//! | `classify`  | `Classify`       |
//! | `push`      | `Push`           |
//! | `types`     | `Types`          |
//! | `config`    | `Config`         |

pub mod classify;
pub mod config;
pub mod push;
pub mod types;

pub use classify::cmd_classify;
pub use config::cmd_config;
pub use push::cmd_push;
pub use types::cmd_types;

use anyhow::{Context, Result};
use std::path::Path;

use fieldsync::config::FieldsyncConfig;
use fieldsync::field::EditableField;

use super::Cli;

/// Read a JSON array of drafts.
pub(crate) fn load_drafts(path: &Path) -> Result<Vec<EditableField>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read drafts file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse drafts file: {}", path.display()))
}

/// Effective config for this invocation.
pub(crate) fn load_config(project_dir: &Path, cli: &Cli) -> Result<FieldsyncConfig> {
    FieldsyncConfig::with_cli_args(
        project_dir.to_path_buf(),
        cli.base_url.clone(),
        cli.collection.clone(),
    )
}
