use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use jonmem_lib::training::log::{last_training, training_counts_by_day};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, days: usize, format: &OutputFormat) -> Result<()> {
    let entries = app
        .repository
        .training_log()
        .context("Failed to read training log")?;
    let counts = training_counts_by_day(&entries);
    let recent: Vec<_> = counts.iter().rev().take(days).collect();
    let last = last_training(&entries);
    let overdue = last.map_or(true, |at| Utc::now() - at > Duration::hours(24));

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "days": recent.iter().map(|(day, c)| serde_json::json!({
                    "date": day.to_string(),
                    "introduce": c.introduce,
                    "review": c.review,
                })).collect::<Vec<_>>(),
                "lastTraining": last,
                "overdue": overdue,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if recent.is_empty() {
                println!("No training sessions yet.");
                return Ok(());
            }

            println!("{:<10}  Introduce  Review", "Date");
            println!("{}", "\u{2500}".repeat(29));
            for (day, c) in &recent {
                println!("{:<10}  {:>9}  {:>6}", day.to_string(), c.introduce, c.review);
            }

            if let Some(at) = last {
                println!("\nLast training: {}", at.format("%Y-%m-%d %H:%M UTC"));
            }
            if overdue {
                println!("Last training was more than 24 hours ago. Time for a session!");
            }
        }
    }

    Ok(())
}
