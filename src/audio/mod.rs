//! # Audio Module
//!
//! Song queue and playback for the bot.
//!
//! ### [`queue`] - Song Queue
//! - Strict FIFO list of songs shared between commands and the session
//!
//! ### [`controller`] - Playback State Machine
//! - Advances the queue when the player goes idle
//! - Retries the head when the player errors
//! - Tracks connection loss and recovery
//!
//! ### [`session`] - Session Task
//! - Runs one controller on its own task, fed by a typed event channel
//! - Tears the connection down when recovery times out
//!
//! ### [`voice`] - Songbird Backend
//! - Joins, plays and leaves through songbird
//! - Translates songbird events into session events

pub mod controller;
pub mod queue;
pub mod retry;
pub mod session;
pub mod voice;
