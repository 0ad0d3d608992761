//! Task orchestration core for the edgesense telemetry agent.
//!
//! Four cooperating long-running activities keep an edge sensor node alive:
//! link supervision, clock sync, sensor sampling, and reporting. Each is a
//! small state machine generic over a capability trait, so the firmware
//! decides when to suspend (every state machine returns the wait it wants)
//! and the logic stays host-testable without any hardware attached.
//!
//! ```text
//! SensorSampler ──▶ ReadingCell ──▶ Reporter ──▶ Uploader
//!                                      ▲
//! LinkSupervisor ──▶ LinkStatus ───────┤
//!                                      └── ClockSync
//! ```
//!
//! Every failure in steady state is recoverable: a task logs its own errors
//! and carries on, and no error ever crosses a task boundary.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod link;
pub mod reading;
pub mod reporter;
pub mod sampler;

pub use clock::{CivilTime, ClockOutcome, ClockSync, TimeSource};
pub use config::{Cadence, ConfigError, UploadTarget};
pub use link::{LinkOutcome, LinkStatus, LinkSupervisor, NetworkLink};
pub use reading::{Reading, ReadingCell};
pub use reporter::{ReportOutcome, Reporter, UploadResponse, Uploader};
pub use sampler::{Measurement, SampleOutcome, Sampler, SensorSource};
