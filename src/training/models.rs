//! Data models for the training core

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest pyramid stage a card can reach
pub const MAX_STAGE: u8 = 4;

/// Lowest pyramid stage, assigned on introduction
pub const MIN_STAGE: u8 = 1;

pub type CardId = String;
pub type TopicId = String;

/// Which side of a card is the prompt and which is the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// German prompt, target-language answer
    DeToEn,
    /// Target-language prompt, German answer
    EnToDe,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::DeToEn => "de_to_en",
            Direction::EnToDe => "en_to_de",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Present cards never drilled before in a direction
    Introduce,
    /// Drill already-introduced cards, weighted toward low stages
    Review,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Introduce => f.write_str("introduce"),
            SessionMode::Review => f.write_str("review"),
        }
    }
}

/// A topic groups cards of one target language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    "en".to_string()
}

/// A vocabulary card. Edits replace fields but never the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub de: String,
    /// Target-language text (named `en` for historical reasons, any language)
    pub en: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub topic: TopicId,
    #[serde(default)]
    pub hint_de_to_en: String,
    #[serde(default)]
    pub hint_en_to_de: String,
    #[serde(default)]
    pub mnemonic: String,
}

impl Card {
    pub fn new(
        id: impl Into<CardId>,
        de: impl Into<String>,
        en: impl Into<String>,
        lang: impl Into<String>,
        topic: impl Into<TopicId>,
    ) -> Self {
        Self {
            id: id.into(),
            de: de.into(),
            en: en.into(),
            lang: lang.into(),
            topic: topic.into(),
            hint_de_to_en: String::new(),
            hint_en_to_de: String::new(),
            mnemonic: String::new(),
        }
    }

    /// Text shown to the user for a direction
    pub fn prompt(&self, direction: Direction) -> &str {
        match direction {
            Direction::DeToEn => &self.de,
            Direction::EnToDe => &self.en,
        }
    }

    /// Text the user is expected to type for a direction
    pub fn answer(&self, direction: Direction) -> &str {
        match direction {
            Direction::DeToEn => &self.en,
            Direction::EnToDe => &self.de,
        }
    }

    pub fn directional_hint(&self, direction: Direction) -> &str {
        match direction {
            Direction::DeToEn => self.hint_de_to_en.trim(),
            Direction::EnToDe => self.hint_en_to_de.trim(),
        }
    }

    /// Only the field for `direction` is touched
    pub fn set_directional_hint(&mut self, direction: Direction, text: &str) {
        let text = text.trim().to_string();
        match direction {
            Direction::DeToEn => self.hint_de_to_en = text,
            Direction::EnToDe => self.hint_en_to_de = text,
        }
    }
}

/// Mastery of one card in one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    #[serde(default = "default_stage", deserialize_with = "deserialize_stage")]
    pub stage: u8,
    #[serde(default = "default_introduced")]
    pub introduced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<bool>,
}

fn default_stage() -> u8 {
    MIN_STAGE
}

fn default_introduced() -> bool {
    true
}

fn deserialize_stage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(MIN_STAGE as i64, MAX_STAGE as i64) as u8)
}

impl ProgressEntry {
    pub fn introduced() -> Self {
        Self {
            stage: MIN_STAGE,
            introduced: true,
            last_seen: None,
            last_result: None,
        }
    }

    pub fn with_stage(stage: u8) -> Self {
        Self {
            stage: clamp_stage(stage),
            ..Self::introduced()
        }
    }
}

pub fn clamp_stage(stage: u8) -> u8 {
    stage.clamp(MIN_STAGE, MAX_STAGE)
}

/// Stage after a final verdict: one up when correct, one down when not
pub fn next_stage(stage: u8, correct: bool) -> u8 {
    let stage = clamp_stage(stage);
    if correct {
        (stage + 1).min(MAX_STAGE)
    } else {
        stage.saturating_sub(1).max(MIN_STAGE)
    }
}

/// Progress keyed by card id, then direction.
///
/// The nested map makes an entry unique per (card, direction) and serializes
/// as `{ "<card id>": { "de_to_en": { "stage": 2, ... } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap {
    entries: BTreeMap<CardId, BTreeMap<Direction, ProgressEntry>>,
}

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, card_id: &str, direction: Direction) -> Option<&ProgressEntry> {
        self.entries.get(card_id).and_then(|dirs| dirs.get(&direction))
    }

    pub fn contains(&self, card_id: &str, direction: Direction) -> bool {
        self.get(card_id, direction).is_some()
    }

    pub fn stage(&self, card_id: &str, direction: Direction) -> Option<u8> {
        self.get(card_id, direction).map(|entry| entry.stage)
    }

    pub fn insert(&mut self, card_id: impl Into<CardId>, direction: Direction, entry: ProgressEntry) {
        self.entries
            .entry(card_id.into())
            .or_default()
            .insert(direction, entry);
    }

    /// Remove one direction's entry; drops the card's map once it is empty
    pub fn remove(&mut self, card_id: &str, direction: Direction) -> Option<ProgressEntry> {
        let dirs = self.entries.get_mut(card_id)?;
        let removed = dirs.remove(&direction);
        if dirs.is_empty() {
            self.entries.remove(card_id);
        }
        removed
    }

    /// Drop every direction for a card
    pub fn remove_card(&mut self, card_id: &str) {
        self.entries.remove(card_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction, &ProgressEntry)> {
        self.entries.iter().flat_map(|(card_id, dirs)| {
            dirs.iter()
                .map(move |(direction, entry)| (card_id.as_str(), *direction, entry))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|dirs| dirs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Topics a review session is restricted to. Empty means "all introduced topics".
pub type TopicFilter = BTreeSet<TopicId>;

/// The unit the runtime presents to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrillItem {
    pub card: Card,
    pub direction: Direction,
    /// Still waiting for its "New Card!" reveal
    pub is_new: bool,
}

impl DrillItem {
    pub fn new(card: Card, direction: Direction, is_new: bool) -> Self {
        Self {
            card,
            direction,
            is_new,
        }
    }

    pub fn card_id(&self) -> &str {
        &self.card.id
    }

    pub fn prompt(&self) -> &str {
        self.card.prompt(self.direction)
    }

    pub fn expected(&self) -> &str {
        self.card.answer(self.direction)
    }
}

/// Consistent view of the repository taken at plan time
#[derive(Debug, Clone, Default)]
pub struct RepositorySnapshot {
    pub cards: Vec<Card>,
    pub progress: ProgressMap,
}

impl RepositorySnapshot {
    pub fn new(cards: Vec<Card>, progress: ProgressMap) -> Self {
        Self { cards, progress }
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    /// Topics owning at least one card introduced in any direction
    pub fn topics_with_introduced_cards(&self) -> BTreeSet<TopicId> {
        self.cards
            .iter()
            .filter(|card| !card.topic.is_empty())
            .filter(|card| {
                self.progress.contains(&card.id, Direction::DeToEn)
                    || self.progress.contains(&card.id, Direction::EnToDe)
            })
            .map(|card| card.topic.clone())
            .collect()
    }
}

/// Introduction progress of one topic in one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicIntroProgress {
    pub id: TopicId,
    pub name: String,
    pub done: usize,
    pub total: usize,
    pub percent: u32,
}

/// Topics not yet fully introduced, least complete first
pub fn intro_topic_progress(
    topics: &[Topic],
    cards: &[Card],
    progress: &ProgressMap,
    lang: &str,
    direction: Direction,
) -> Vec<TopicIntroProgress> {
    let mut totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for card in cards.iter().filter(|c| c.lang == lang && !c.topic.is_empty()) {
        let counts = totals.entry(card.topic.as_str()).or_default();
        counts.1 += 1;
        if progress.contains(&card.id, direction) {
            counts.0 += 1;
        }
    }

    let mut items: Vec<TopicIntroProgress> = totals
        .into_iter()
        .filter_map(|(topic_id, (done, total))| {
            let percent = ((done as f64 / total as f64) * 100.0).round() as u32;
            if percent >= 100 {
                return None;
            }
            let name = topics
                .iter()
                .find(|t| t.id == topic_id)
                .map(|t| t.name.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| topic_id.to_string());
            Some(TopicIntroProgress {
                id: topic_id.to_string(),
                name,
                done,
                total,
                percent,
            })
        })
        .collect();

    items.sort_by(|a, b| {
        a.percent
            .cmp(&b.percent)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    items
}
