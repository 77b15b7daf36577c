//! Trainer configuration
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! or missing file yields the stock session limits.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::clamp_stage;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Relative pick weight of each pyramid stage in review sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageWeights {
    pub stage1: u32,
    pub stage2: u32,
    pub stage3: u32,
    pub stage4: u32,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            stage1: 4,
            stage2: 3,
            stage3: 2,
            stage4: 1,
        }
    }
}

impl StageWeights {
    pub fn weight(&self, stage: u8) -> u32 {
        match clamp_stage(stage) {
            1 => self.stage1,
            2 => self.stage2,
            3 => self.stage3,
            _ => self.stage4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Answered items after which a session ends
    pub session_max_items: usize,
    /// Active (unpaused) seconds after which a session ends
    pub session_seconds: u64,
    /// New cards revealed before an introduce session starts drilling
    pub initial_reveal_count: usize,
    pub stage_weights: StageWeights,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            session_max_items: 10,
            session_seconds: 300,
            initial_reveal_count: 4,
            stage_weights: StageWeights::default(),
        }
    }
}

impl TrainerConfig {
    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No trainer config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded trainer config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TrainerConfig = toml::from_str(content)?;
        Ok(config.sanitized())
    }

    /// Raise zero limits and weights to one so no session or pool is empty by configuration
    pub fn sanitized(mut self) -> Self {
        self.session_max_items = self.session_max_items.max(1);
        self.session_seconds = self.session_seconds.max(1);
        self.initial_reveal_count = self.initial_reveal_count.max(1);
        let weights = &mut self.stage_weights;
        for weight in [
            &mut weights.stage1,
            &mut weights.stage2,
            &mut weights.stage3,
            &mut weights.stage4,
        ] {
            *weight = (*weight).max(1);
        }
        self
    }
}
