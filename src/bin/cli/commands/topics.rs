use std::collections::BTreeSet;

use anyhow::{Context, Result};

use jonmem_lib::training::{Direction, VocabularyRepository};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, lang: Option<&str>, direction: Direction, format: &OutputFormat) -> Result<()> {
    let topics = app.list_topics()?;
    let learned = app.introduced_topics()?;

    let langs: BTreeSet<String> = match lang {
        Some(lang) => BTreeSet::from([lang.to_string()]),
        None => app
            .repository
            .list_cards()
            .context("Failed to list cards")?
            .into_iter()
            .map(|card| card.lang)
            .collect(),
    };

    let mut introduction = Vec::new();
    for lang in &langs {
        let progress = app
            .repository
            .intro_topic_progress(lang, direction)
            .context("Failed to compute introduction progress")?;
        introduction.push((lang.clone(), progress));
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "learned": learned.iter().map(|id| serde_json::json!({
                    "id": id,
                    "name": app.topic_name(&topics, id),
                })).collect::<Vec<_>>(),
                "direction": direction,
                "introduction": introduction.iter().map(|(lang, items)| serde_json::json!({
                    "lang": lang,
                    "topics": items,
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if learned.is_empty() {
                println!("No topics learned yet.");
            } else {
                println!("Learned topics:");
                for id in &learned {
                    println!("  {}", app.topic_name(&topics, id));
                }
            }

            for (lang, items) in &introduction {
                if items.is_empty() {
                    continue;
                }
                println!("\nStill to introduce ({}, {}):", lang, direction);
                let width = items.iter().map(|i| i.name.len()).max().unwrap_or(5).max(5);
                for item in items {
                    println!(
                        "  {:<width$} {:>3}/{:<3} {:>3}%",
                        item.name,
                        item.done,
                        item.total,
                        item.percent,
                        width = width
                    );
                }
            }
        }
    }

    Ok(())
}
