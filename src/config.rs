//! Runtime configuration for the Warforge Arena server.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug)]
pub struct Settings {
    /// Default seconds a participant has to submit a turn.
    pub turn_timeout_secs: i64,
    /// Consecutive missed deadlines before forced elimination.
    pub timeout_threshold: u32,
    /// Default minutes before an in-progress battle is force-completed.
    pub battle_length_mins: i64,
    /// Default seconds an open battle waits for joins and deposits.
    pub open_ttl_secs: i64,
    /// Interval of the deadline sweep loop (seconds).
    pub sweep_interval_secs: u64,
    /// Interval of the escrow reconciliation loop (seconds).
    pub reconcile_interval_secs: u64,
}

impl Settings {
    fn from_env() -> Self {
        let turn_timeout_secs = env::var("TURN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(90);

        let timeout_threshold = env::var("TIMEOUT_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let battle_length_mins = env::var("BATTLE_LENGTH_MINS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(30);

        let open_ttl_secs = env::var("OPEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(900); // 15 min default

        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5);

        let reconcile_interval_secs = env::var("RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Settings {
            turn_timeout_secs,
            timeout_threshold,
            battle_length_mins,
            open_ttl_secs,
            sweep_interval_secs,
            reconcile_interval_secs,
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
