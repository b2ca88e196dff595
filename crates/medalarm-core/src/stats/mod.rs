//! Statistics module for medalarm
//!
//! Adherence statistics are recomputed from alarms and history every time
//! they are requested.

mod adherence;

pub use adherence::{
    current_streak, longest_streak, AdherenceEngine, AdherenceStats, DEFAULT_WINDOW_DAYS,
};
