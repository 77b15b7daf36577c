use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use jonmem_lib::storage::seed;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, file: &Path, format: &OutputFormat) -> Result<()> {
    let yaml = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let counts = seed::import_seed(&app.repository, &yaml)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        OutputFormat::Plain => {
            println!(
                "Imported {} topics and {} cards into {}",
                counts.topics_added,
                counts.cards_added,
                app.data_dir().display()
            );
            if counts.skipped > 0 {
                println!("{} records skipped (already present or without id)", counts.skipped);
            }
        }
    }

    Ok(())
}
