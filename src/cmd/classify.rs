//! Offline classification of a drafts file — `fieldsync classify`.

use anyhow::Result;
use console::style;
use std::path::Path;

use fieldsync::classifier::{Classification, classify};

use super::load_drafts;

pub fn cmd_classify(file: &Path) -> Result<()> {
    let drafts = load_drafts(file)?;

    if drafts.is_empty() {
        println!("No drafts in {}", file.display());
        return Ok(());
    }

    for field in &drafts {
        let classification = classify(field, &drafts);
        let label = match classification {
            Classification::Create => style(format!("{:<8}", "create")).green(),
            Classification::Update => style(format!("{:<8}", "update")).cyan(),
            Classification::NotEligible(_) => style(format!("{:<8}", "skip")).yellow(),
        };
        let kind = field.kind.as_ref().map(|k| k.as_str()).unwrap_or("-");

        print!(
            "{} {:<40} {:<14} {}",
            label,
            field.identity.to_string(),
            kind,
            field.name
        );
        if let Classification::NotEligible(reason) = classification {
            print!("  ({})", reason);
        }
        println!();
    }

    Ok(())
}
