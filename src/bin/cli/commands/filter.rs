use anyhow::{Context, Result};

use jonmem_lib::training::{TopicFilter, VocabularyRepository};

use crate::app::App;
use crate::OutputFormat;

pub fn run_set(app: &App, names: &[String], format: &OutputFormat) -> Result<()> {
    let filter = app.resolve_topics(names)?;
    let learned = app.introduced_topics()?;
    let unlearned: Vec<&String> = filter.iter().filter(|id| !learned.contains(*id)).collect();

    app.repository
        .set_topic_filter(Some(filter.clone()))
        .context("Failed to save topic filter")?;

    print_filter(app, Some(&filter), format)?;
    if !unlearned.is_empty() && matches!(format, OutputFormat::Plain) {
        println!(
            "Note: no learned cards yet in {}; reviews ignore these topics until then.",
            unlearned
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

pub fn run_clear(app: &App, format: &OutputFormat) -> Result<()> {
    app.repository
        .set_topic_filter(None)
        .context("Failed to clear topic filter")?;
    print_filter(app, None, format)
}

pub fn run_show(app: &App, format: &OutputFormat) -> Result<()> {
    let filter = app
        .repository
        .topic_filter()
        .context("Failed to read topic filter")?;
    print_filter(app, filter.as_ref(), format)
}

fn print_filter(app: &App, filter: Option<&TopicFilter>, format: &OutputFormat) -> Result<()> {
    let topics = app.list_topics()?;
    let names: Vec<String> = filter
        .map(|f| f.iter().map(|id| app.topic_name(&topics, id)).collect())
        .unwrap_or_default();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "topics": filter,
                "names": names,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if names.is_empty() {
                println!("Review filter: all learned topics");
            } else {
                println!("Review filter: {}", names.join(", "));
            }
        }
    }
    Ok(())
}
