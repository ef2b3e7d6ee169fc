// src/config/synthesis.rs

use super::parse_env_or;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub tick_interval: Duration,
}

impl SynthesisConfig {
    pub fn from_env() -> Self {
        Self {
            tick_interval: Duration::from_secs(parse_env_or("WADDLE_SYNTHESIS_TICK_SECS", 15)),
        }
    }
}
