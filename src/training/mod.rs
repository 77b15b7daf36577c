//! Vocabulary training core
//!
//! This module provides:
//! - Cards, topics and per-direction pyramid progress
//! - Session planning for introduce and review modes
//! - The session runtime (reveals, drilling, time and item caps)
//! - Answer evaluation with second chances and hints
//! - The training log and its per-day rollup

pub mod config;
pub mod evaluator;
pub mod log;
pub mod models;
pub mod planner;
pub mod repository;
pub mod session;
pub mod trainer;

pub use config::{ConfigError, StageWeights, TrainerConfig};
pub use evaluator::{evaluate, evaluate_second_attempt, Evaluation, Hint, Verdict};
pub use self::log::{training_counts_by_day, DayCounts, TrainingLogEntry};
pub use models::*;
pub use planner::{least_introduced_topic, plan, FocusTopic, PlanError, PlanRequest, SessionPlan};
pub use repository::{RepositoryError, VocabularyRepository};
pub use session::{
    Cue, FinishReason, PresentedItem, ProgressUpdate, PyramidLevel, Session, SessionError,
    SessionEvent, SessionPhase, SessionSnapshot, SessionSummary,
};
pub use trainer::{Trainer, TrainingError};
