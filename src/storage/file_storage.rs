//! JSON-file vocabulary repository
//!
//! Directory layout:
//! ```text
//! {base_path}/
//! ├── vocab.json          # topics and cards
//! ├── progress.json       # card id -> direction -> progress entry
//! ├── settings.json       # persisted review topic filter
//! ├── training_log.json   # finished sessions
//! └── config.toml         # optional trainer configuration
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::models::{Settings, Vocabulary};
use crate::training::repository::{RepositoryError, Result, VocabularyRepository};
use crate::training::{
    intro_topic_progress, Card, Direction, ProgressEntry, ProgressMap, RepositorySnapshot, Topic,
    TopicFilter, TopicId, TopicIntroProgress, TrainingLogEntry,
};

pub struct FileRepository {
    base_path: PathBuf,
}

impl FileRepository {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("jonmem"))
            .ok_or(RepositoryError::DataDirNotFound)
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_path.join("config.toml")
    }

    fn vocab_path(&self) -> PathBuf {
        self.base_path.join("vocab.json")
    }

    fn progress_path(&self) -> PathBuf {
        self.base_path.join("progress.json")
    }

    fn settings_path(&self) -> PathBuf {
        self.base_path.join("settings.json")
    }

    fn training_log_path(&self) -> PathBuf {
        self.base_path.join("training_log.json")
    }

    /// Read a JSON file, or the default value when it does not exist yet
    fn read_json<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            log::error!("Failed to parse {:?}: {}", path, e);
            RepositoryError::Corrupt(format!("{}: {}", path.display(), e))
        })
    }

    /// Atomic write (write to .tmp then rename)
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    // ===== Vocabulary =====

    /// Load topics and cards. Cards that fail to parse are skipped.
    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        let raw: serde_json::Value = self.read_json(&self.vocab_path())?;
        if raw.is_null() {
            return Ok(Vocabulary::default());
        }

        let topics = match raw.get("topics") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Vec::new(),
        };

        let mut cards = Vec::new();
        if let Some(items) = raw.get("cards").and_then(|v| v.as_array()) {
            for item in items {
                match serde_json::from_value::<Card>(item.clone()) {
                    Ok(card) => cards.push(card),
                    Err(e) => log::warn!("Skipping unreadable card record: {}", e),
                }
            }
        }

        Ok(Vocabulary { topics, cards })
    }

    pub fn save_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        self.write_json(&self.vocab_path(), vocab)
    }

    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.load_vocabulary()?.topics)
    }

    pub fn get_card(&self, card_id: &str) -> Result<Card> {
        self.load_vocabulary()?
            .cards
            .into_iter()
            .find(|c| c.id == card_id)
            .ok_or_else(|| RepositoryError::CardNotFound(card_id.to_string()))
    }

    /// Insert a card or replace the fields of the card with the same id
    pub fn save_card(&self, card: Card) -> Result<()> {
        let mut vocab = self.load_vocabulary()?;
        match vocab.cards.iter_mut().find(|c| c.id == card.id) {
            Some(existing) => *existing = card,
            None => vocab.cards.push(card),
        }
        self.save_vocabulary(&vocab)
    }

    /// Delete a card together with its progress
    pub fn delete_card(&self, card_id: &str) -> Result<()> {
        let mut vocab = self.load_vocabulary()?;
        let before = vocab.cards.len();
        vocab.cards.retain(|c| c.id != card_id);
        if vocab.cards.len() == before {
            return Err(RepositoryError::CardNotFound(card_id.to_string()));
        }
        self.save_vocabulary(&vocab)?;

        let mut progress = self.list_progress()?;
        progress.remove_card(card_id);
        self.write_json(&self.progress_path(), &progress)
    }

    pub fn set_directional_hint(&self, card_id: &str, direction: Direction, text: &str) -> Result<()> {
        let mut card = self.get_card(card_id)?;
        card.set_directional_hint(direction, text);
        self.save_card(card)
    }

    pub fn intro_topic_progress(&self, lang: &str, direction: Direction) -> Result<Vec<TopicIntroProgress>> {
        let vocab = self.load_vocabulary()?;
        let progress = self.list_progress()?;
        Ok(intro_topic_progress(
            &vocab.topics,
            &vocab.cards,
            &progress,
            lang,
            direction,
        ))
    }

    // ===== Settings =====

    pub fn set_topic_filter(&self, filter: Option<TopicFilter>) -> Result<()> {
        let mut settings: Settings = self.read_json(&self.settings_path())?;
        settings.topic_filter = filter;
        self.write_json(&self.settings_path(), &settings)
    }

    // ===== Training log =====

    pub fn training_log(&self) -> Result<Vec<TrainingLogEntry>> {
        self.read_json(&self.training_log_path())
    }
}

impl VocabularyRepository for FileRepository {
    fn list_cards(&self) -> Result<Vec<Card>> {
        Ok(self.load_vocabulary()?.cards)
    }

    fn list_progress(&self) -> Result<ProgressMap> {
        self.read_json(&self.progress_path())
    }

    fn commit_progress(
        &mut self,
        card_id: &str,
        direction: Direction,
        stage: u8,
        introduced: bool,
    ) -> Result<()> {
        let mut progress = self.list_progress()?;

        if introduced {
            let entry = match progress.get(card_id, direction) {
                Some(previous) => ProgressEntry {
                    stage,
                    ..previous.clone()
                },
                None => ProgressEntry::with_stage(stage),
            };
            progress.insert(card_id, direction, entry);
        } else {
            progress.remove(card_id, direction);
        }

        self.write_json(&self.progress_path(), &progress)
    }

    fn commit_entry(
        &mut self,
        card_id: &str,
        direction: Direction,
        entry: &ProgressEntry,
    ) -> Result<()> {
        let mut progress = self.list_progress()?;
        progress.insert(card_id, direction, entry.clone());
        self.write_json(&self.progress_path(), &progress)
    }

    fn list_topics_with_introduced_cards(&self) -> Result<BTreeSet<TopicId>> {
        let cards = self.list_cards()?;
        let progress = self.list_progress()?;
        Ok(RepositorySnapshot::new(cards, progress).topics_with_introduced_cards())
    }

    fn topic_filter(&self) -> Result<Option<TopicFilter>> {
        let settings: Settings = self.read_json(&self.settings_path())?;
        Ok(settings.topic_filter)
    }

    fn record_session(&mut self, entry: &TrainingLogEntry) -> Result<()> {
        let mut log = self.training_log()?;
        log.push(entry.clone());
        self.write_json(&self.training_log_path(), &log)
    }
}
