// src/config/crypto.rs

use super::parse_env_or;

/// Fixed Argon2id parameters per spec §4.1. Not user-tunable: changing them would
/// silently change the derived working key for a key that's already enveloped.
#[derive(Debug, Clone)]
pub struct CryptoConfig {
    pub credential_name: String,
    pub argon2_time_cost: u32,
    pub argon2_memory_kib: u32,
    pub argon2_parallelism: u32,
    pub argon2_output_len: usize,
}

impl CryptoConfig {
    pub fn from_env() -> Self {
        Self {
            credential_name: std::env::var("WADDLE_CREDENTIAL_NAME")
                .unwrap_or_else(|_| "Waddle_Encryption_Key".to_string()),
            argon2_time_cost: parse_env_or("WADDLE_ARGON2_TIME", 1),
            argon2_memory_kib: parse_env_or("WADDLE_ARGON2_MEMORY_KIB", 64 * 1024),
            argon2_parallelism: parse_env_or("WADDLE_ARGON2_PARALLELISM", 4),
            argon2_output_len: parse_env_or("WADDLE_ARGON2_OUTPUT_LEN", 32),
        }
    }
}
