//! The vocabulary repository seen from the training core
//!
//! Persistence lives behind this trait. The core only reads snapshots and
//! commits single progress entries; how and where they are stored is up to
//! the implementation (see `crate::storage`).

use std::collections::BTreeSet;

use thiserror::Error;

use super::log::TrainingLogEntry;
use super::models::{Card, Direction, ProgressEntry, ProgressMap, TopicFilter, TopicId};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Storage contract consumed by the trainer.
///
/// Implementations must serialize their writes. The trainer calls
/// `commit_entry` once per reveal and once per final answer, and
/// `commit_progress` with `introduced == false` once per entry removed by the
/// time-expiry reset.
pub trait VocabularyRepository {
    /// All cards, in stable repository order
    fn list_cards(&self) -> Result<Vec<Card>>;

    fn list_progress(&self) -> Result<ProgressMap>;

    /// Store a stage, or remove the entry when `introduced` is false.
    /// An existing entry keeps its `last_seen` and `last_result`.
    fn commit_progress(
        &mut self,
        card_id: &str,
        direction: Direction,
        stage: u8,
        introduced: bool,
    ) -> Result<()>;

    /// Store a complete entry, including the last verdict and its time
    fn commit_entry(
        &mut self,
        card_id: &str,
        direction: Direction,
        entry: &ProgressEntry,
    ) -> Result<()> {
        self.commit_progress(card_id, direction, entry.stage, entry.introduced)
    }

    fn list_topics_with_introduced_cards(&self) -> Result<BTreeSet<TopicId>>;

    /// Persisted review topic filter, if one was saved
    fn topic_filter(&self) -> Result<Option<TopicFilter>> {
        Ok(None)
    }

    /// Append a finished session to the training log
    fn record_session(&mut self, _entry: &TrainingLogEntry) -> Result<()> {
        Ok(())
    }
}
