//! # Synchronization Primitives
//!
//! ## The Problem
//!
//! ```text
//! Driving thread:      step, step, step, [camera due] ... step
//! Coordinator thread:  window, window, window, [render camera] ...
//!
//! The camera must see the state at exactly the time it was requested,
//! and the driving thread must not race ahead while it is rendered.
//! ```
//!
//! ## The Solution: A Rendezvous
//!
//! The driving thread raises a pending flag, releases every lock it holds,
//! and blocks on a [`HandoffSemaphore`]. The coordinator renders, then
//! releases the semaphore. [`CameraSchedule`] decides when a frame is due.

mod handoff;
mod schedule;

pub use handoff::HandoffSemaphore;
pub use schedule::{CameraSchedule, CAMERA_TIME_EPSILON};
