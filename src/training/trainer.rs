//! Trainer: wires planner, runtime and repository together
//!
//! Hosts (the CLI, tests) only talk to this type. It loads a repository
//! snapshot at session start, forwards host events to the running
//! [`Session`] and persists every progress change the session reports.
//! Introduce sessions work on the least introduced topic unless the host
//! names one.
//! Commits that fail are kept in a write-behind queue and retried before the
//! next write; a new session refuses to start while that queue is stuck.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::config::TrainerConfig;
use super::log::TrainingLogEntry;
use super::models::{
    Direction, ProgressMap, RepositorySnapshot, SessionMode, TopicFilter, TopicId, MIN_STAGE,
};
use super::planner::{
    least_introduced_topic, plan, restrict_topic_filter, PlanError, PlanRequest,
};
use super::repository::{RepositoryError, VocabularyRepository};
use super::session::{
    FinishReason, ProgressUpdate, Session, SessionError, SessionEvent, SessionSnapshot,
    SessionSummary,
};

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("No eligible cards for a {mode} session ({direction})")]
    NoEligibleCards {
        mode: SessionMode,
        direction: Direction,
    },

    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(#[from] RepositoryError),

    #[error("No active session")]
    NoActiveSession,

    #[error("A session is already running")]
    SessionActive,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<PlanError> for TrainingError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::NoEligibleCards { mode, direction } => {
                TrainingError::NoEligibleCards { mode, direction }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TrainingError>;

pub struct Trainer<R: VocabularyRepository, G: Rng = StdRng> {
    repository: R,
    config: TrainerConfig,
    rng: G,
    /// Working copy of the repository's progress, owned by the active session
    progress: ProgressMap,
    session: Option<Session>,
    pending: VecDeque<ProgressUpdate>,
}

impl<R: VocabularyRepository> Trainer<R, StdRng> {
    pub fn new(repository: R, config: TrainerConfig) -> Self {
        Self::with_rng(repository, config, StdRng::from_entropy())
    }
}

impl<R: VocabularyRepository, G: Rng> Trainer<R, G> {
    pub fn with_rng(repository: R, config: TrainerConfig, rng: G) -> Self {
        Self {
            repository,
            config: config.sanitized(),
            rng,
            progress: ProgressMap::new(),
            session: None,
            pending: VecDeque::new(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Progress changes not yet accepted by the repository
    pub fn pending_commits(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session
            .as_ref()
            .map(|session| session.snapshot(&self.progress))
    }

    pub fn start_introduce(
        &mut self,
        direction: Direction,
        lang: Option<String>,
    ) -> Result<Vec<SessionEvent>> {
        self.start(PlanRequest::introduce(direction).with_lang(lang))
    }

    /// Start an introduce session on one topic
    pub fn start_introduce_topic(
        &mut self,
        direction: Direction,
        topic: TopicId,
        lang: Option<String>,
    ) -> Result<Vec<SessionEvent>> {
        self.start(
            PlanRequest::introduce(direction)
                .with_lang(lang)
                .with_topic(Some(topic)),
        )
    }

    /// Start a review session. `None` uses the persisted topic filter.
    pub fn start_review(
        &mut self,
        direction: Direction,
        filter: Option<TopicFilter>,
        lang: Option<String>,
    ) -> Result<Vec<SessionEvent>> {
        let requested = match filter {
            Some(filter) => filter,
            None => self.repository.topic_filter()?.unwrap_or_default(),
        };
        let introduced = self.repository.list_topics_with_introduced_cards()?;
        let filter = restrict_topic_filter(&requested, &introduced);
        self.start(PlanRequest::review(direction, filter).with_lang(lang))
    }

    fn start(&mut self, mut request: PlanRequest) -> Result<Vec<SessionEvent>> {
        if self.session.as_ref().is_some_and(|s| !s.is_finished()) {
            return Err(TrainingError::SessionActive);
        }
        self.flush_pending()?;

        let snapshot = RepositorySnapshot::new(
            self.repository.list_cards()?,
            self.repository.list_progress()?,
        );
        if request.mode == SessionMode::Introduce && request.topic.is_none() {
            request.topic =
                least_introduced_topic(&snapshot, request.direction, request.lang.as_deref());
        }
        let plan = plan(&request, &snapshot, &self.config, &mut self.rng)?;

        self.progress = snapshot.progress;
        let mut session = Session::new(plan, &self.config);
        let events = session.begin(Utc::now(), &mut self.progress)?;
        self.session = Some(session);
        self.apply(&events);
        Ok(events)
    }

    pub fn dismiss_reveal(&mut self) -> Result<Vec<SessionEvent>> {
        let session = self.session.as_mut().ok_or(TrainingError::NoActiveSession)?;
        let events = session.dismiss_reveal(&mut self.progress)?;
        self.apply(&events);
        Ok(events)
    }

    pub fn submit_answer(&mut self, typed: &str) -> Result<Vec<SessionEvent>> {
        let session = self.session.as_mut().ok_or(TrainingError::NoActiveSession)?;
        let events = session.submit_answer(typed, &mut self.progress, Utc::now())?;
        self.apply(&events);
        Ok(events)
    }

    pub fn tick(&mut self, elapsed: Duration) -> Result<Vec<SessionEvent>> {
        let session = self.session.as_mut().ok_or(TrainingError::NoActiveSession)?;
        let events = session.tick(elapsed, &mut self.progress);
        self.apply(&events);
        Ok(events)
    }

    pub fn abandon_session(&mut self) -> Result<Vec<SessionEvent>> {
        let session = self.session.as_mut().ok_or(TrainingError::NoActiveSession)?;
        let events = session.abandon(&mut self.progress);
        self.apply(&events);
        Ok(events)
    }

    /// Retry queued commits in order; stops at the first failure
    pub fn flush_pending(&mut self) -> Result<()> {
        while let Some(update) = self.pending.front() {
            write_update(&mut self.repository, update)?;
            self.pending.pop_front();
        }
        Ok(())
    }

    fn apply(&mut self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::Progress(update) => self.commit(update.clone()),
                SessionEvent::Finished(summary) => self.record(summary),
                _ => {}
            }
        }
    }

    fn commit(&mut self, update: ProgressUpdate) {
        self.pending.push_back(update);
        if let Err(e) = self.flush_pending() {
            log::warn!(
                "Progress commit failed, {} change(s) queued for retry: {}",
                self.pending.len(),
                e
            );
        }
    }

    fn record(&mut self, summary: &SessionSummary) {
        if summary.reason == FinishReason::Abandoned {
            return;
        }
        let entry = TrainingLogEntry::new(
            summary.started_at,
            summary.items_answered,
            summary.correct,
            summary.mode,
            summary.direction,
        );
        if let Err(e) = self.repository.record_session(&entry) {
            log::warn!("Failed to record training session: {}", e);
        }
    }
}

fn write_update<R: VocabularyRepository>(
    repository: &mut R,
    update: &ProgressUpdate,
) -> std::result::Result<(), RepositoryError> {
    match &update.entry {
        Some(entry) => repository.commit_entry(&update.card_id, update.direction, entry),
        None => repository.commit_progress(&update.card_id, update.direction, MIN_STAGE, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileRepository, MemoryRepository};
    use crate::training::models::{Card, ProgressEntry};
    use crate::training::session::SessionPhase;
    use tempfile::TempDir;

    fn repository() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for (id, de, en, topic) in [
            ("c1", "Hund", "dog", "animals"),
            ("c2", "Katze", "cat", "animals"),
            ("c3", "Rot", "red", "colours"),
            ("c4", "Blau", "blue", "colours"),
            ("c5", "Brot", "bread", "food"),
        ] {
            repo.add_card(Card::new(id, de, en, "en", topic));
        }
        repo
    }

    fn trainer(repo: MemoryRepository) -> Trainer<MemoryRepository> {
        Trainer::with_rng(repo, TrainerConfig::default(), StdRng::seed_from_u64(7))
    }

    fn expected<R: VocabularyRepository>(trainer: &Trainer<R>) -> String {
        let current = trainer.snapshot().unwrap().current.unwrap();
        trainer
            .repository()
            .list_cards()
            .unwrap()
            .into_iter()
            .find(|card| card.id == current.card_id)
            .map(|card| card.en)
            .unwrap()
    }

    fn finished(events: &[SessionEvent]) -> bool {
        events.iter().any(|e| matches!(e, SessionEvent::Finished(_)))
    }

    fn revealing_id<R: VocabularyRepository>(trainer: &Trainer<R>) -> Option<String> {
        trainer.snapshot().unwrap().revealing.map(|card| card.id)
    }

    #[test]
    fn test_review_without_introduced_cards() {
        let mut trainer = trainer(repository());
        let err = trainer
            .start_review(Direction::DeToEn, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainingError::NoEligibleCards {
                mode: SessionMode::Review,
                ..
            }
        ));
    }

    #[test]
    fn test_introduce_commits_reveals_and_answers() {
        let mut trainer = trainer(repository());
        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        assert!(trainer.repository().progress().is_empty());
        // No topic started yet; ties go to the lowest topic id
        assert_eq!(revealing_id(&trainer).as_deref(), Some("c1"));

        trainer.dismiss_reveal().unwrap();
        assert_eq!(
            trainer.repository().progress().stage("c1", Direction::DeToEn),
            Some(1)
        );
        assert_eq!(revealing_id(&trainer).as_deref(), Some("c2"));
        trainer.dismiss_reveal().unwrap();
        assert_eq!(trainer.snapshot().unwrap().phase, SessionPhase::Drilling);

        let answer = expected(&trainer);
        trainer.submit_answer(&answer).unwrap();
        let entry = trainer
            .repository()
            .progress()
            .get("c1", Direction::DeToEn)
            .cloned()
            .unwrap();
        assert_eq!(entry.stage, 2);
        assert_eq!(entry.last_result, Some(true));
        assert!(entry.last_seen.is_some());
        // The topic has no further new cards to unlock
        assert_eq!(trainer.snapshot().unwrap().phase, SessionPhase::Drilling);
    }

    #[test]
    fn test_introduce_picks_least_introduced_topic() {
        let mut repo = repository();
        repo.set_progress("c1", Direction::DeToEn, ProgressEntry::introduced());
        let config = TrainerConfig {
            session_max_items: 1,
            ..TrainerConfig::default()
        };
        let mut trainer = Trainer::with_rng(repo, config, StdRng::seed_from_u64(7));

        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        assert_eq!(revealing_id(&trainer).as_deref(), Some("c3"));
        trainer.dismiss_reveal().unwrap();
        assert_eq!(revealing_id(&trainer).as_deref(), Some("c4"));
        trainer.dismiss_reveal().unwrap();

        let events = trainer.submit_answer("nothing like it").unwrap();
        let summary = trainer.session().unwrap().summary().unwrap();
        assert!(finished(&events));
        assert_eq!(summary.topic_completed.as_deref(), Some("colours"));
    }

    #[test]
    fn test_introduce_named_topic() {
        let mut trainer = trainer(repository());
        trainer
            .start_introduce_topic(Direction::DeToEn, "food".to_string(), None)
            .unwrap();
        assert_eq!(revealing_id(&trainer).as_deref(), Some("c5"));
        trainer.dismiss_reveal().unwrap();
        assert_eq!(trainer.snapshot().unwrap().phase, SessionPhase::Drilling);

        trainer.abandon_session().unwrap();
        let err = trainer
            .start_introduce_topic(Direction::DeToEn, "food".to_string(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainingError::NoEligibleCards {
                mode: SessionMode::Introduce,
                ..
            }
        ));
    }

    #[test]
    fn test_file_repository_keeps_verdicts() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::new(temp_dir.path().to_path_buf());
        repo.init().unwrap();
        repo.save_card(Card::new("c1", "Hund", "dog", "en", "animals"))
            .unwrap();
        let mut trainer =
            Trainer::with_rng(repo, TrainerConfig::default(), StdRng::seed_from_u64(7));

        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        trainer.dismiss_reveal().unwrap();
        let stored = trainer.repository().list_progress().unwrap();
        let entry = stored.get("c1", Direction::DeToEn).unwrap();
        assert_eq!(entry.stage, 1);
        assert_eq!(entry.last_seen, None);
        assert_eq!(entry.last_result, None);

        // Wrong at stage 1: the stage stays, the verdict is still saved
        trainer.submit_answer("zzzzzzzzzz").unwrap();
        let stored = trainer.repository().list_progress().unwrap();
        let entry = stored.get("c1", Direction::DeToEn).unwrap();
        assert_eq!(entry.stage, 1);
        assert_eq!(entry.last_result, Some(false));
        assert!(entry.last_seen.is_some());

        trainer.submit_answer("dog").unwrap();
        assert_eq!(trainer.pending_commits(), 0);

        let reopened = FileRepository::new(temp_dir.path().to_path_buf());
        let stored = reopened.list_progress().unwrap();
        let entry = stored.get("c1", Direction::DeToEn).unwrap();
        assert_eq!(entry.stage, 2);
        assert_eq!(entry.last_result, Some(true));
        assert!(entry.last_seen.is_some());
    }

    #[test]
    fn test_time_expiry_removes_entries_from_repository() {
        let mut trainer = trainer(repository());
        trainer.start_introduce(Direction::EnToDe, None).unwrap();
        for _ in 0..2 {
            trainer.dismiss_reveal().unwrap();
        }
        assert_eq!(trainer.repository().progress().len(), 2);

        let events = trainer.tick(Duration::from_secs(300)).unwrap();
        assert!(finished(&events));
        assert!(trainer.repository().progress().is_empty());

        let log = trainer.repository().training_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].mode, SessionMode::Introduce);
        assert_eq!(log[0].items, 0);
    }

    #[test]
    fn test_failed_commits_are_retried_in_order() {
        let mut trainer = trainer(repository());
        trainer.start_introduce(Direction::DeToEn, None).unwrap();

        trainer.repository_mut().set_fail_writes(true);
        trainer.dismiss_reveal().unwrap();
        trainer.dismiss_reveal().unwrap();
        assert_eq!(trainer.pending_commits(), 2);
        let answer = expected(&trainer);
        assert_eq!(answer, "dog");
        assert!(trainer.repository().progress().is_empty());

        trainer.repository_mut().set_fail_writes(false);
        trainer.submit_answer(&answer).unwrap();
        assert_eq!(trainer.pending_commits(), 0);
        assert_eq!(trainer.repository().progress().len(), 2);
        assert_eq!(
            trainer.repository().progress().stage("c1", Direction::DeToEn),
            Some(2)
        );
    }

    #[test]
    fn test_start_refused_while_commits_are_stuck() {
        let mut trainer = trainer(repository());
        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        trainer.repository_mut().set_fail_writes(true);
        trainer.dismiss_reveal().unwrap();
        trainer.abandon_session().unwrap();

        let err = trainer
            .start_introduce(Direction::DeToEn, None)
            .unwrap_err();
        assert!(matches!(err, TrainingError::RepositoryUnavailable(_)));

        trainer.repository_mut().set_fail_writes(false);
        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        assert_eq!(trainer.pending_commits(), 0);
        assert!(trainer.repository().progress().contains("c1", Direction::DeToEn));
    }

    #[test]
    fn test_review_uses_persisted_topic_filter() {
        let mut repo = repository();
        for id in ["c1", "c3", "c4"] {
            repo.set_progress(id, Direction::DeToEn, ProgressEntry::with_stage(2));
        }
        repo.set_topic_filter(["colours".to_string()].into_iter().collect());

        let mut trainer = trainer(repo);
        trainer.start_review(Direction::DeToEn, None, None).unwrap();

        let mut seen = Vec::new();
        loop {
            let current = trainer.snapshot().unwrap().current.unwrap();
            seen.push(current.card_id);
            let answer = expected(&trainer);
            if finished(&trainer.submit_answer(&answer).unwrap()) {
                break;
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["c3", "c4"]);
        assert_eq!(
            trainer.repository().progress().stage("c3", Direction::DeToEn),
            Some(3)
        );
        assert_eq!(trainer.repository().training_log().len(), 1);
    }

    #[test]
    fn test_filter_without_introduced_topics_means_all() {
        let mut repo = repository();
        repo.set_progress("c1", Direction::DeToEn, ProgressEntry::with_stage(1));
        repo.set_progress("c5", Direction::DeToEn, ProgressEntry::with_stage(1));

        let mut trainer = trainer(repo);
        let filter = ["colours".to_string()].into_iter().collect();
        trainer
            .start_review(Direction::DeToEn, Some(filter), None)
            .unwrap();
        assert_eq!(trainer.snapshot().unwrap().items_remaining, 2);
    }

    #[test]
    fn test_one_session_at_a_time() {
        let mut trainer = trainer(repository());
        assert!(matches!(
            trainer.submit_answer("dog").unwrap_err(),
            TrainingError::NoActiveSession
        ));

        trainer.start_introduce(Direction::DeToEn, None).unwrap();
        assert!(matches!(
            trainer.start_introduce(Direction::DeToEn, None).unwrap_err(),
            TrainingError::SessionActive
        ));

        trainer.abandon_session().unwrap();
        assert!(trainer.repository().training_log().is_empty());
        trainer.start_introduce(Direction::DeToEn, None).unwrap();
    }
}
