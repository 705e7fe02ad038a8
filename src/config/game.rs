//! Game rules tunables.
//!
//! The source history used differing damage constants across iterations,
//! so everything combat-related is configuration rather than a literal.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Rules-engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Multiplier K in `damage = level * max(1, streak / 10) * K`
    #[serde(default = "default_damage_factor")]
    pub damage_factor: u32,

    /// Fixed difficulty reduction from a completed heal sequence
    #[serde(default = "default_heal_amount")]
    pub heal_amount: u32,

    /// Chance that a player's next sequence is a heal
    #[serde(default = "default_heal_probability")]
    pub heal_probability: f64,

    /// Level bonus applied to heal sequences (still capped at 10)
    #[serde(default = "default_heal_level_bonus")]
    pub heal_level_bonus: u8,

    /// Client-driven countdown between StartGame and actual play, seconds
    #[serde(default = "default_start_delay_secs")]
    pub start_delay_secs: u32,

    /// TTL refreshed on every Game/User write, seconds
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,

    /// Per-client mailbox capacity
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Bounded wait before a full mailbox fails the send, milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl GameConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Validate game configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.heal_probability) {
            return Err(ValidationError::InvalidHealProbability);
        }
        if self.damage_factor == 0 {
            return Err(ValidationError::InvalidDamageFactor);
        }
        if self.state_ttl_secs == 0 {
            return Err(ValidationError::InvalidStateTtl);
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            damage_factor: default_damage_factor(),
            heal_amount: default_heal_amount(),
            heal_probability: default_heal_probability(),
            heal_level_bonus: default_heal_level_bonus(),
            start_delay_secs: default_start_delay_secs(),
            state_ttl_secs: default_state_ttl_secs(),
            mailbox_capacity: default_mailbox_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

fn default_damage_factor() -> u32 {
    20
}

fn default_heal_amount() -> u32 {
    50
}

fn default_heal_probability() -> f64 {
    0.1
}

fn default_heal_level_bonus() -> u8 {
    2
}

fn default_start_delay_secs() -> u32 {
    30
}

fn default_state_ttl_secs() -> u64 {
    30 * 60
}

fn default_mailbox_capacity() -> usize {
    100
}

fn default_send_timeout_ms() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.damage_factor, 20);
        assert_eq!(config.state_ttl(), Duration::from_secs(1800));
        assert_eq!(config.send_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn out_of_range_heal_probability_is_rejected() {
        let config = GameConfig {
            heal_probability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_damage_factor_is_rejected() {
        let config = GameConfig {
            damage_factor: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
