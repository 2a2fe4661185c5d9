use crate::board::{CENTER, CORNERS, NUM_CELLS};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NUM_EPISODES: usize = 20_000_usize;

/// Step sizes and exploration schedule of the learning player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f32,
    pub min_learning_rate: f32,
    pub learning_rate_decay: f32,
    /// Episodes between two learning-rate decays.
    pub learning_rate_decay_every: usize,
    pub discount_rate: f32,
    pub exploration_rate: f32,
    pub min_exploration_rate: f32,
    /// Applied after every action choice.
    pub exploration_decay: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            learning_rate: 0.5,
            min_learning_rate: 0.05,
            learning_rate_decay: 0.95,
            learning_rate_decay_every: 1_000,
            discount_rate: 0.9,
            exploration_rate: 1.0,
            min_exploration_rate: 0.05,
            exploration_decay: 0.9995,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub win: f32,
    pub draw: f32,
    pub loss: f32,
    /// Used instead of `loss` for the move the opponent punished with a win.
    pub opponent_win_penalty: f32,
    pub center_bonus: f32,
    pub corner_bonus: f32,
    pub edge_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            win: 1.0,
            draw: 0.5,
            loss: -1.0,
            opponent_win_penalty: -1.5,
            center_bonus: 0.03,
            corner_bonus: 0.02,
            edge_bonus: 0.005,
        }
    }
}

impl RewardConfig {
    pub fn cell_bonus(&self, action: usize) -> f32 {
        if action == CENTER {
            self.center_bonus
        } else if CORNERS.contains(&action) {
            self.corner_bonus
        } else {
            self.edge_bonus
        }
    }

    /// Shaping reward of an empty board, the largest one possible.
    pub fn max_shaping(&self) -> f32 {
        (0..NUM_CELLS).map(|action| self.cell_bonus(action)).sum()
    }
}

/// Top-level configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub episodes: usize,
    pub seed: Option<u64>,
    /// Episodes between two progress log lines.
    pub log_every: usize,
    pub learning: LearningConfig,
    pub rewards: RewardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            episodes: NUM_EPISODES,
            seed: None,
            log_every: 5_000,
            learning: LearningConfig::default(),
            rewards: RewardConfig::default(),
        }
    }
}

fn in_unit_interval(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{name} must be in [0, 1], got {value}")))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Falls back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!("config file '{}' not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.learning;
        if !(l.learning_rate > 0.0 && l.learning_rate <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "learning_rate must be in (0, 1], got {}",
                l.learning_rate
            )));
        }
        in_unit_interval("min_learning_rate", l.min_learning_rate)?;
        in_unit_interval("learning_rate_decay", l.learning_rate_decay)?;
        in_unit_interval("discount_rate", l.discount_rate)?;
        in_unit_interval("exploration_rate", l.exploration_rate)?;
        in_unit_interval("min_exploration_rate", l.min_exploration_rate)?;
        in_unit_interval("exploration_decay", l.exploration_decay)?;
        if l.min_learning_rate > l.learning_rate {
            return Err(ConfigError::Validation(format!(
                "min_learning_rate ({}) must not exceed learning_rate ({})",
                l.min_learning_rate, l.learning_rate
            )));
        }
        if l.min_exploration_rate > l.exploration_rate {
            return Err(ConfigError::Validation(format!(
                "min_exploration_rate ({}) must not exceed exploration_rate ({})",
                l.min_exploration_rate, l.exploration_rate
            )));
        }
        if l.learning_rate_decay_every == 0 {
            return Err(ConfigError::Validation(
                "learning_rate_decay_every must be > 0".to_string(),
            ));
        }
        if self.log_every == 0 {
            return Err(ConfigError::Validation("log_every must be > 0".to_string()));
        }

        let r = &self.rewards;
        if [r.center_bonus, r.corner_bonus, r.edge_bonus]
            .iter()
            .any(|&bonus| bonus < 0.0)
        {
            return Err(ConfigError::Validation(
                "cell bonuses must be non-negative".to_string(),
            ));
        }
        if !(r.win > r.draw && r.draw > r.max_shaping() && r.loss < 0.0) {
            return Err(ConfigError::Validation(format!(
                "rewards must satisfy win > draw > shaping >= 0 > loss, got win {} draw {} shaping {} loss {}",
                r.win,
                r.draw,
                r.max_shaping(),
                r.loss
            )));
        }
        if r.opponent_win_penalty > r.loss {
            return Err(ConfigError::Validation(format!(
                "opponent_win_penalty ({}) must not exceed loss ({})",
                r.opponent_win_penalty, r.loss
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn is_default_config_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.rewards.max_shaping() < config.rewards.draw);
    }

    #[test]
    fn cell_bonus_prefers_center_then_corners() {
        let rewards = RewardConfig::default();
        assert!(rewards.cell_bonus(4) > rewards.cell_bonus(0));
        for corner in CORNERS {
            assert!(rewards.cell_bonus(corner) > rewards.cell_bonus(1));
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"episodes": 10, "learning": {"discount_rate": 0.5}}"#).unwrap();
        assert_eq!(config.episodes, 10);
        assert_eq!(config.learning.discount_rate, 0.5);
        assert_eq!(config.learning.learning_rate, LearningConfig::default().learning_rate);
        assert_eq!(config.rewards, RewardConfig::default());
    }

    #[test]
    fn reward_ordering_is_validated() {
        let mut config = Config::default();
        config.rewards.draw = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.rewards.opponent_win_penalty = -0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.rewards.center_bonus = 0.4;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn learning_ranges_are_validated() {
        let mut config = Config::default();
        config.learning.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.learning.discount_rate = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn floors_above_starting_rates_are_rejected() {
        let mut config = Config::default();
        config.learning.exploration_rate = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.learning.min_exploration_rate = 0.0;
        config.validate().unwrap();

        let mut config = Config::default();
        config.learning.learning_rate = 0.01;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"episodes": 42, "seed": 7}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.episodes, 42);
        assert_eq!(config.seed, Some(7));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(Config::load(bad.path()), Err(ConfigError::JsonParse(_))));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, Config::default());
    }
}
