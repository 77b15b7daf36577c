use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use jonmem_lib::storage::FileRepository;
use jonmem_lib::training::{Topic, TopicFilter, TopicId, TrainerConfig, VocabularyRepository};

/// Shared application state for CLI commands
pub struct App {
    pub repository: FileRepository,
    pub config: TrainerConfig,
}

impl App {
    /// Open the data directory (default: the platform data dir) and load the trainer config
    pub fn new(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => FileRepository::default_data_dir().context("Failed to get data directory")?,
        };

        let repository = FileRepository::new(data_dir);
        repository
            .init()
            .context("Failed to initialize data directory")?;

        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repository.config_path());
        let config = TrainerConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        Ok(Self { repository, config })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.repository.base_path().to_path_buf()
    }

    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        self.repository.list_topics().context("Failed to list topics")
    }

    pub fn introduced_topics(&self) -> Result<BTreeSet<TopicId>> {
        self.repository
            .list_topics_with_introduced_cards()
            .context("Failed to read progress")
    }

    /// Display name of a topic, falling back to its id
    pub fn topic_name(&self, topics: &[Topic], topic_id: &str) -> String {
        topics
            .iter()
            .find(|t| t.id == topic_id)
            .map(|t| t.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| topic_id.to_string())
    }

    /// Resolve topic ids or names (case-insensitive) to a filter
    pub fn resolve_topics(&self, names: &[String]) -> Result<TopicFilter> {
        let topics = self.list_topics()?;
        let mut filter = TopicFilter::new();
        for name in names {
            let wanted = name.to_lowercase();
            match topics
                .iter()
                .find(|t| t.id.to_lowercase() == wanted || t.name.to_lowercase() == wanted)
            {
                Some(topic) => {
                    filter.insert(topic.id.clone());
                }
                None => bail!(
                    "No topic matching '{}'. Available topics:\n{}",
                    name,
                    topics
                        .iter()
                        .map(|t| format!("  - {} ({})", t.name, t.id))
                        .collect::<Vec<_>>()
                        .join("\n")
                ),
            }
        }
        Ok(filter)
    }
}
