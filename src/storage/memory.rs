//! In-memory repository for tests and dry runs

use std::collections::BTreeSet;
use std::io;

use super::models::Vocabulary;
use crate::training::repository::{RepositoryError, Result, VocabularyRepository};
use crate::training::{
    Card, Direction, ProgressEntry, ProgressMap, RepositorySnapshot, Topic, TopicFilter, TopicId,
    TrainingLogEntry,
};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    vocab: Vocabulary,
    progress: ProgressMap,
    topic_filter: Option<TopicFilter>,
    training_log: Vec<TrainingLogEntry>,
    /// Make every write fail, to exercise the trainer's retry queue
    fail_writes: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vocabulary(vocab: Vocabulary) -> Self {
        Self {
            vocab,
            ..Self::default()
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn add_topic(&mut self, topic: Topic) -> bool {
        self.vocab.add_topic(topic)
    }

    pub fn add_card(&mut self, card: Card) -> bool {
        self.vocab.add_card(card)
    }

    pub fn progress(&self) -> &ProgressMap {
        &self.progress
    }

    pub fn set_progress(&mut self, card_id: &str, direction: Direction, entry: ProgressEntry) {
        self.progress.insert(card_id, direction, entry);
    }

    pub fn set_topic_filter(&mut self, filter: TopicFilter) {
        self.topic_filter = Some(filter);
    }

    pub fn training_log(&self) -> &[TrainingLogEntry] {
        &self.training_log
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(RepositoryError::Io(io::Error::new(
                io::ErrorKind::Other,
                "repository is read-only",
            )));
        }
        Ok(())
    }
}

impl VocabularyRepository for MemoryRepository {
    fn list_cards(&self) -> Result<Vec<Card>> {
        Ok(self.vocab.cards.clone())
    }

    fn list_progress(&self) -> Result<ProgressMap> {
        Ok(self.progress.clone())
    }

    fn commit_progress(
        &mut self,
        card_id: &str,
        direction: Direction,
        stage: u8,
        introduced: bool,
    ) -> Result<()> {
        self.check_writable()?;
        if introduced {
            let entry = match self.progress.get(card_id, direction) {
                Some(previous) => ProgressEntry {
                    stage,
                    ..previous.clone()
                },
                None => ProgressEntry::with_stage(stage),
            };
            self.progress.insert(card_id, direction, entry);
        } else {
            self.progress.remove(card_id, direction);
        }
        Ok(())
    }

    fn commit_entry(
        &mut self,
        card_id: &str,
        direction: Direction,
        entry: &ProgressEntry,
    ) -> Result<()> {
        self.check_writable()?;
        self.progress.insert(card_id, direction, entry.clone());
        Ok(())
    }

    fn list_topics_with_introduced_cards(&self) -> Result<BTreeSet<TopicId>> {
        let snapshot = RepositorySnapshot::new(self.vocab.cards.clone(), self.progress.clone());
        Ok(snapshot.topics_with_introduced_cards())
    }

    fn topic_filter(&self) -> Result<Option<TopicFilter>> {
        Ok(self.topic_filter.clone())
    }

    fn record_session(&mut self, entry: &TrainingLogEntry) -> Result<()> {
        self.check_writable()?;
        self.training_log.push(entry.clone());
        Ok(())
    }
}
