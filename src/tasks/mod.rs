//! Background Tasks Module
//!
//! Contains the timer machinery that drives expiration sweeps.
//!
//! # Tasks
//! - Expiration timer: a self-adjusting single-shot timer, rearmed after every
//!   sweep to fire when the next item is due
//! - Scheduler: resolves the Tokio runtime the timers run on

pub(crate) mod expiration;
pub(crate) mod scheduler;

pub(crate) use expiration::ExpirationTimer;
pub(crate) use scheduler::sweep_handle;
