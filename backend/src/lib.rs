//! # TSI Scheduler Core
//!
//! Per-job scheduling engine for an observatory scheduler.
//!
//! Given a target, the observing site and a set of constraints (minimum
//! altitude, Moon separation, astronomical twilight, artificial horizon and
//! mount limits), this crate answers when a job may start, when it must stop
//! and how it ranks against other jobs.
//!
//! ## Architecture
//!
//! - [`api`]: Data Transfer Objects for sites, job definitions and snapshots
//! - [`astro`]: Coordinate resolution and the ephemeris/almanac/horizon seams
//! - [`config`]: TOML configuration and environment overrides
//! - [`context`]: Capabilities and options shared by the jobs of a scheduler
//! - [`models`]: The job record, its conditions and time handling
//! - [`services`]: Scores, night-time cache, time-window search and orderings
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tsi_scheduler::api::{Equatorial, GeographicLocation, SchedulerContext, SchedulerJob};
//! use tsi_scheduler::config::SchedulerOptions;
//! use tsi_scheduler::models::When;
//!
//! let site = GeographicLocation::new(28.7606, -17.8816, Some(2396.0)).unwrap();
//! let context = Arc::new(SchedulerContext::new(site, SchedulerOptions::default()));
//! let mut job = SchedulerJob::new("M31", Equatorial::new(0.712, 41.269), context);
//! job.set_min_altitude(Some(30.0));
//!
//! let start = job.next_possible_start_time(When::Now, 1, false, None);
//! println!("{:?}", start);
//! ```

pub mod api;
pub mod astro;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod services;
