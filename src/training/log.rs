//! Training log: one entry per finished session, plus the per-day rollup
//! the calendar view shows.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Direction, SessionMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingLogEntry {
    pub id: Uuid,
    pub started: DateTime<Utc>,
    pub items: usize,
    pub correct: usize,
    pub mode: SessionMode,
    pub direction: Direction,
}

impl TrainingLogEntry {
    pub fn new(
        started: DateTime<Utc>,
        items: usize,
        correct: usize,
        mode: SessionMode,
        direction: Direction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started,
            items,
            correct,
            mode,
            direction,
        }
    }
}

/// Sessions started on one day, by mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub introduce: usize,
    pub review: usize,
}

pub fn training_counts_by_day(entries: &[TrainingLogEntry]) -> BTreeMap<NaiveDate, DayCounts> {
    let mut counts: BTreeMap<NaiveDate, DayCounts> = BTreeMap::new();
    for entry in entries {
        let day = counts.entry(entry.started.date_naive()).or_default();
        match entry.mode {
            SessionMode::Introduce => day.introduce += 1,
            SessionMode::Review => day.review += 1,
        }
    }
    counts
}

/// Start time of the most recent session
pub fn last_training(entries: &[TrainingLogEntry]) -> Option<DateTime<Utc>> {
    entries.iter().map(|entry| entry.started).max()
}
