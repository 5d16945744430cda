pub mod battle;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod events;
pub mod http;
pub mod metrics;
pub mod narration;
pub mod protocol;
pub mod rail;
