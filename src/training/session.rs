//! Session runtime
//!
//! A small state machine driven by host events:
//!
//! ```text
//! Idle ──begin──▶ Revealing ──dismiss──▶ Drilling ──answer──▶ Finished
//!                     ▲                     │
//!                     └──── 1→2 promotion ──┘
//! ```
//!
//! The session clock only advances on `tick` while drilling, so new-card
//! reveals never eat into the time budget. Every transition returns the
//! events the host has to act on.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::config::TrainerConfig;
use super::evaluator::{evaluate, evaluate_second_attempt, Evaluation, Verdict};
use super::models::{
    next_stage, Card, CardId, Direction, DrillItem, ProgressEntry, ProgressMap, SessionMode,
    TopicId, MAX_STAGE, MIN_STAGE,
};
use super::planner::{FocusTopic, SessionPlan};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session has already started")]
    AlreadyStarted,

    #[error("No item is waiting for an answer")]
    NotDrilling,

    #[error("No new card is being revealed")]
    NotRevealing,

    #[error("Session is finished")]
    Finished,
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// "New Card!" dialog open, clock paused
    Revealing,
    Drilling,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    ItemLimit,
    TimeExpired,
    /// Review list used up before the item limit
    QueueExhausted,
    Abandoned,
}

/// Audio cue the host should play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    NewCard,
    Success,
    AlmostRight,
}

/// The item currently waiting for an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedItem {
    pub card_id: CardId,
    pub prompt: String,
    pub topic: TopicId,
    pub stage: u8,
    /// This is the one re-attempt after a near miss
    pub second_chance: bool,
}

/// A change to one progress entry; `entry: None` means the entry was removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub card_id: CardId,
    pub direction: Direction,
    pub previous: Option<u8>,
    pub entry: Option<ProgressEntry>,
}

impl ProgressUpdate {
    pub fn stage(&self) -> Option<u8> {
        self.entry.as_ref().map(|entry| entry.stage)
    }
}

/// Distinct session cards at one stage, by prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidLevel {
    pub stage: u8,
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub mode: SessionMode,
    pub direction: Direction,
    pub reason: FinishReason,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub items_answered: usize,
    pub correct: usize,
    /// Cards sent back to "not yet seen" by the time-expiry rule
    pub reset_cards: Vec<CardId>,
    /// Introduce only: the focus topic, once every one of its cards is introduced
    pub topic_completed: Option<TopicId>,
    /// Highest stage first
    pub pyramid: Vec<PyramidLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Show the "New Card!" dialog with solution and mnemonics
    Reveal(Card),
    Present(PresentedItem),
    Cue(Cue),
    Feedback(Evaluation),
    Progress(ProgressUpdate),
    Finished(SessionSummary),
}

/// Read-only view for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub mode: SessionMode,
    pub direction: Direction,
    pub current: Option<PresentedItem>,
    pub revealing: Option<Card>,
    pub elapsed: Duration,
    pub time_remaining: Duration,
    pub items_answered: usize,
    pub items_remaining: usize,
    pub correct: usize,
}

pub struct Session {
    mode: SessionMode,
    direction: Direction,
    max_items: usize,
    time_budget: Duration,
    phase: SessionPhase,
    /// Growable drill list; `cursor` indexes the item being asked
    queue: Vec<DrillItem>,
    cursor: usize,
    /// Queue indexes still waiting for their reveal
    reveals: VecDeque<usize>,
    reserve: VecDeque<Card>,
    focus: Option<FocusTopic>,
    started_at: DateTime<Utc>,
    active: Duration,
    answered: usize,
    correct: usize,
    revealed: usize,
    second_chance: bool,
    introduced: Vec<CardId>,
    summary: Option<SessionSummary>,
}

impl Session {
    pub fn new(plan: SessionPlan, config: &TrainerConfig) -> Self {
        Self {
            mode: plan.mode,
            direction: plan.direction,
            max_items: config.session_max_items,
            time_budget: Duration::from_secs(config.session_seconds),
            phase: SessionPhase::Idle,
            queue: plan.items,
            cursor: 0,
            reveals: VecDeque::new(),
            reserve: plan.reserve,
            focus: plan.focus,
            started_at: Utc::now(),
            active: Duration::ZERO,
            answered: 0,
            correct: 0,
            revealed: 0,
            second_chance: false,
            introduced: Vec::new(),
            summary: None,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// New cards revealed so far
    pub fn revealed(&self) -> usize {
        self.revealed
    }

    /// Leave `Idle`: reveal pending new cards, or present the first item
    pub fn begin(
        &mut self,
        now: DateTime<Utc>,
        progress: &mut ProgressMap,
    ) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.started_at = now;
        self.reveals = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_new)
            .map(|(idx, _)| idx)
            .collect();

        log::info!(
            "Starting {} session ({}) with {} items",
            self.mode,
            self.direction,
            self.queue.len()
        );

        let mut events = Vec::new();
        self.advance(progress, &mut events);
        Ok(events)
    }

    /// Close the "New Card!" dialog. The card gets its stage-1 entry here.
    pub fn dismiss_reveal(&mut self, progress: &mut ProgressMap) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::Revealing {
            return Err(self.phase_error(SessionPhase::Revealing));
        }
        let Some(idx) = self.reveals.pop_front() else {
            return Err(SessionError::NotRevealing);
        };

        let mut events = Vec::new();
        let item = &mut self.queue[idx];
        item.is_new = false;
        let card_id = item.card.id.clone();
        if !progress.contains(&card_id, self.direction) {
            let entry = ProgressEntry::introduced();
            progress.insert(card_id.clone(), self.direction, entry.clone());
            events.push(SessionEvent::Progress(ProgressUpdate {
                card_id: card_id.clone(),
                direction: self.direction,
                previous: None,
                entry: Some(entry),
            }));
        }
        self.introduced.push(card_id);
        self.revealed += 1;

        self.advance(progress, &mut events);
        Ok(events)
    }

    /// Advance the active clock. Ignored unless drilling.
    pub fn tick(&mut self, elapsed: Duration, progress: &mut ProgressMap) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.phase != SessionPhase::Drilling {
            return events;
        }
        self.active += elapsed;
        if self.active >= self.time_budget {
            self.finish(FinishReason::TimeExpired, progress, &mut events);
        }
        events
    }

    /// Score the typed answer for the current item
    pub fn submit_answer(
        &mut self,
        typed: &str,
        progress: &mut ProgressMap,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>> {
        if self.phase != SessionPhase::Drilling {
            return Err(self.phase_error(SessionPhase::Drilling));
        }

        let item = self.queue[self.cursor].clone();
        let card_id = item.card_id().to_string();
        let previous = progress.stage(&card_id, self.direction);
        let stage = previous.unwrap_or(MIN_STAGE);

        let evaluation = if self.second_chance {
            evaluate_second_attempt(item.expected(), typed)
        } else {
            evaluate(item.expected(), typed, stage)
        };

        let mut events = Vec::new();
        if evaluation.verdict == Verdict::SecondChance {
            self.second_chance = true;
            events.push(SessionEvent::Cue(Cue::AlmostRight));
            events.push(SessionEvent::Feedback(evaluation));
            if let Some(current) = self.current_item(progress) {
                events.push(SessionEvent::Present(current));
            }
            return Ok(events);
        }

        self.second_chance = false;
        let correct = evaluation.verdict == Verdict::Correct;
        let new_stage = next_stage(stage, correct);

        let mut entry = progress
            .get(&card_id, self.direction)
            .cloned()
            .unwrap_or_else(ProgressEntry::introduced);
        entry.stage = new_stage;
        entry.introduced = true;
        entry.last_seen = Some(now);
        entry.last_result = Some(correct);
        progress.insert(card_id.clone(), self.direction, entry.clone());
        log::debug!(
            "Card {} ({}): stage {} -> {}",
            card_id,
            self.direction,
            stage,
            new_stage
        );

        if correct {
            self.correct += 1;
            events.push(SessionEvent::Cue(Cue::Success));
        }
        events.push(SessionEvent::Feedback(evaluation));
        events.push(SessionEvent::Progress(ProgressUpdate {
            card_id: card_id.clone(),
            direction: self.direction,
            previous,
            entry: Some(entry),
        }));

        self.answered += 1;
        self.cursor += 1;

        if self.answered >= self.max_items {
            self.finish(FinishReason::ItemLimit, progress, &mut events);
            return Ok(events);
        }

        if self.mode == SessionMode::Introduce {
            if stage == 1 && new_stage == 2 {
                self.unlock_next_card();
            }
            self.queue.push(DrillItem::new(item.card, self.direction, false));
        }

        self.advance(progress, &mut events);
        Ok(events)
    }

    /// Leave the session early. Stage changes already made stay in place.
    pub fn abandon(&mut self, progress: &mut ProgressMap) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.is_finished() {
            self.finish(FinishReason::Abandoned, progress, &mut events);
        }
        events
    }

    pub fn snapshot(&self, progress: &ProgressMap) -> SessionSnapshot {
        let revealing = if self.phase == SessionPhase::Revealing {
            self.reveals
                .front()
                .map(|idx| self.queue[*idx].card.clone())
        } else {
            None
        };
        let current = if self.phase == SessionPhase::Drilling {
            self.current_item(progress)
        } else {
            None
        };

        let mut items_remaining = self.max_items.saturating_sub(self.answered);
        if self.mode == SessionMode::Review {
            items_remaining = items_remaining.min(self.queue.len().saturating_sub(self.cursor));
        }
        if self.is_finished() {
            items_remaining = 0;
        }

        SessionSnapshot {
            phase: self.phase,
            mode: self.mode,
            direction: self.direction,
            current,
            revealing,
            elapsed: self.active,
            time_remaining: self.time_budget.saturating_sub(self.active),
            items_answered: self.answered,
            items_remaining,
            correct: self.correct,
        }
    }

    fn phase_error(&self, wanted: SessionPhase) -> SessionError {
        match (self.phase, wanted) {
            (SessionPhase::Finished, _) => SessionError::Finished,
            (_, SessionPhase::Revealing) => SessionError::NotRevealing,
            _ => SessionError::NotDrilling,
        }
    }

    /// Queue one more never-seen card behind the current block
    fn unlock_next_card(&mut self) {
        if let Some(card) = self.reserve.pop_front() {
            log::debug!("Unlocked new card {}", card.id);
            self.queue.push(DrillItem::new(card, self.direction, true));
            self.reveals.push_back(self.queue.len() - 1);
        }
    }

    /// Move to the next reveal, the next item, or the end of the session
    fn advance(&mut self, progress: &mut ProgressMap, events: &mut Vec<SessionEvent>) {
        if let Some(idx) = self.reveals.front() {
            self.phase = SessionPhase::Revealing;
            events.push(SessionEvent::Cue(Cue::NewCard));
            events.push(SessionEvent::Reveal(self.queue[*idx].card.clone()));
            return;
        }

        if self.cursor >= self.queue.len() {
            self.finish(FinishReason::QueueExhausted, progress, events);
            return;
        }

        self.phase = SessionPhase::Drilling;
        if let Some(current) = self.current_item(progress) {
            events.push(SessionEvent::Present(current));
        }
    }

    fn current_item(&self, progress: &ProgressMap) -> Option<PresentedItem> {
        let item = self.queue.get(self.cursor)?;
        Some(PresentedItem {
            card_id: item.card.id.clone(),
            prompt: item.prompt().to_string(),
            topic: item.card.topic.clone(),
            stage: progress
                .stage(item.card_id(), self.direction)
                .unwrap_or(MIN_STAGE),
            second_chance: self.second_chance,
        })
    }

    fn finish(
        &mut self,
        reason: FinishReason,
        progress: &mut ProgressMap,
        events: &mut Vec<SessionEvent>,
    ) {
        self.phase = SessionPhase::Finished;
        self.reveals.clear();

        let mut reset_cards = Vec::new();
        if reason == FinishReason::TimeExpired && self.mode == SessionMode::Introduce {
            let mut seen = HashSet::new();
            for card_id in &self.introduced {
                if !seen.insert(card_id.as_str()) {
                    continue;
                }
                if progress.stage(card_id, self.direction) == Some(MIN_STAGE) {
                    progress.remove(card_id, self.direction);
                    events.push(SessionEvent::Progress(ProgressUpdate {
                        card_id: card_id.clone(),
                        direction: self.direction,
                        previous: Some(MIN_STAGE),
                        entry: None,
                    }));
                    reset_cards.push(card_id.clone());
                }
            }
            if !reset_cards.is_empty() {
                log::info!(
                    "Time expired: {} stage-1 cards returned to the unseen pool",
                    reset_cards.len()
                );
            }
        }

        let topic_completed = self.completed_topic(reason, progress);
        if let Some(topic) = &topic_completed {
            log::info!("Topic {} fully introduced ({})", topic, self.direction);
        }

        let summary = SessionSummary {
            mode: self.mode,
            direction: self.direction,
            reason,
            started_at: self.started_at,
            elapsed: self.active,
            items_answered: self.answered,
            correct: self.correct,
            reset_cards,
            topic_completed,
            pyramid: self.pyramid(progress),
        };
        log::info!(
            "Session finished ({:?}): {} of {} correct",
            reason,
            summary.correct,
            summary.items_answered
        );

        self.summary = Some(summary.clone());
        events.push(SessionEvent::Finished(summary));
    }

    fn completed_topic(&self, reason: FinishReason, progress: &ProgressMap) -> Option<TopicId> {
        if self.mode != SessionMode::Introduce || reason == FinishReason::Abandoned {
            return None;
        }
        let focus = self.focus.as_ref()?;
        let complete = !focus.cards.is_empty()
            && focus
                .cards
                .iter()
                .all(|card_id| progress.contains(card_id, self.direction));
        complete.then(|| focus.topic.clone())
    }

    fn pyramid(&self, progress: &ProgressMap) -> Vec<PyramidLevel> {
        let mut by_stage: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        let mut seen = HashSet::new();
        for item in &self.queue {
            if !seen.insert(item.card_id()) {
                continue;
            }
            if let Some(stage) = progress.stage(item.card_id(), self.direction) {
                by_stage
                    .entry(stage)
                    .or_default()
                    .push(item.prompt().to_string());
            }
        }

        (MIN_STAGE..=MAX_STAGE)
            .rev()
            .filter_map(|stage| {
                by_stage
                    .remove(&stage)
                    .map(|prompts| PyramidLevel { stage, prompts })
            })
            .collect()
    }
}
