//! TSI job planner binary
//!
//! Loads the scheduler configuration and one job definition, then prints a
//! JSON report with the next start and end times of the job, its scores and
//! the upcoming astronomical nights.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tsi-plan -- job.json --config scheduler.toml \
//!     --from 2024-01-15T18:00:00+00:00 --step 5
//! ```
//!
//! # Environment Variables
//!
//! - `TSI_CONFIG`: Configuration file used when `--config` is absent
//! - `TSI_*`: Option overrides, see `SchedulerOptions::with_env_overrides`
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tsi_scheduler::api::{JobDefinition, JobSnapshot, SchedulerConfig, SchedulerContext, SchedulerJob};
use tsi_scheduler::models::{FixedClock, LocalTime, When};

#[derive(Parser, Debug)]
#[command(name = "tsi-plan", version, about = "Plan the next run of one scheduler job")]
struct PlanArgs {
    /// Job definition (JSON)
    job_path: PathBuf,

    /// Scheduler configuration (TOML)
    #[arg(long = "config", env = "TSI_CONFIG")]
    config_path: Option<PathBuf>,

    /// Evaluate at this instant instead of now (RFC 3339)
    #[arg(long, value_parser = parse_instant)]
    from: Option<DateTime<Utc>>,

    /// Search step in minutes
    #[arg(long = "step", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    step_minutes: u32,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|e| format!("invalid instant {:?}: {}", raw, e))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport {
    evaluated_at: LocalTime,
    altitude: f64,
    altitude_score: i16,
    moon_separation_score: i16,
    moon_separation: f64,
    night_now: bool,
    next_start: Option<LocalTime>,
    next_end: Option<LocalTime>,
    end_reason: Option<String>,
    culmination: Option<LocalTime>,
    nights: Vec<(LocalTime, LocalTime)>,
    job: JobSnapshot,
}

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = PlanArgs::parse();

    let config = match &args.config_path {
        Some(path) => SchedulerConfig::from_file(path)?,
        None => SchedulerConfig::from_default_location()?,
    };
    let options = config.options().with_env_overrides()?;
    info!(
        "Site lat {:.4} lon {:.4}, pre-dawn {} min",
        config.location.latitude, config.location.longitude, options.twilight.pre_dawn_minutes
    );

    let mut context = SchedulerContext::new(config.location.clone(), options);
    if let Some(mask) = config.horizon_mask() {
        info!("Artificial horizon with {} regions", mask.regions().len());
        context = context.with_horizon(Arc::new(mask));
    }
    if let Some(from) = args.from {
        context = context.with_clock(Arc::new(FixedClock::new(from)));
    }
    let context = Arc::new(context);

    let definition = JobDefinition::from_file(&args.job_path)
        .with_context(|| format!("failed to load job {}", args.job_path.display()))?;
    let mut job = SchedulerJob::from_definition(&definition, Arc::clone(&context))?;
    info!("Planning job '{}' ({})", job.name(), job.id());

    let now = context.now();
    let (altitude_score, altitude) = job.altitude_score(When::Now);
    let moon_separation_score = job.moon_separation_score(When::Now);
    let next_start = job.next_possible_start_time(When::Now, args.step_minutes, false, None);

    let end = match next_start {
        Some(start) => job.next_end_time(start, args.step_minutes, None),
        None => Default::default(),
    };
    if let Some(start) = next_start {
        let (start_altitude_score, _) = job.altitude_score(start);
        job.set_score(i32::from(start_altitude_score) + i32::from(job.moon_separation_score(start)));
        job.set_startup_time(Some(start));
    }
    info!("Next start {:?}, next end {:?}", next_start, end.time);

    let report = PlanReport {
        evaluated_at: now,
        altitude,
        altitude_score,
        moon_separation_score,
        moon_separation: job.current_moon_separation(),
        night_now: job.runs_during_astronomical_night(When::Now),
        next_start,
        next_end: end.time,
        end_reason: end.reason.map(|reason| reason.to_string()),
        culmination: job.culmination_time(When::Now),
        nights: context.night_cache().astronomical_nights(
            now,
            now + Duration::days(3),
            context.location(),
            &context.options().twilight,
        ),
        job: job.snapshot(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
