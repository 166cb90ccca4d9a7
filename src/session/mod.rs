//! Interactive runtime for a verification session and the focus timer.
//!
//! Every ticker lives inside the session future. When the session returns,
//! on completion or on Ctrl+C, the tickers are dropped with it and nothing
//! can tick against the ledger afterwards.

use crate::collector::{LocationSampler, MotionSampler};
use crate::config::Config;
use crate::db::{BadgeStore, HistoryStore, ProgressStore, TaskStore};
use crate::tracker::{ProgressEvent, Tracker};
use crate::verification::{AttemptState, Completion, Verdict, VerificationAttempt, VerifyError};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::signal;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{debug, error, info, warn};

const FOCUS_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub tick: Duration,
    pub badge_poll: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick: Duration::from_secs(config.tick_seconds.max(1)),
            badge_poll: Duration::from_secs(config.badge_poll_seconds.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProofInput {
    pub text: Option<String>,
    pub photo: Option<String>,
}

impl ProofInput {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.photo.is_none()
    }
}

#[derive(Debug)]
pub enum SessionOutcome {
    Finished {
        verdict: Verdict,
        events: Vec<ProgressEvent>,
    },
    Abandoned,
}

pub struct SessionSensors<'a> {
    pub location: &'a mut dyn LocationSampler,
    pub motion: &'a mut dyn MotionSampler,
}

/// Runs one verification attempt. Each line read from `input` is a
/// "done" signal, or the proof text when the attempt is waiting for it.
pub async fn run_verification_session<S, R>(
    tracker: &mut Tracker<S>,
    date: NaiveDate,
    task_id: &str,
    proof: ProofInput,
    sensors: SessionSensors<'_>,
    settings: SessionSettings,
    input: R,
) -> Result<SessionOutcome>
where
    S: ProgressStore + TaskStore + HistoryStore + BadgeStore,
    R: AsyncBufRead + Unpin,
{
    run_until_abandoned(
        tracker,
        date,
        task_id,
        proof,
        sensors,
        settings,
        input,
        signal::ctrl_c(),
    )
    .await
}

/// Session loop; `abandon` resolving ends it without a verdict. The
/// future is polled across loop turns, so it fires even mid-tick.
#[allow(clippy::too_many_arguments)]
async fn run_until_abandoned<S, R, A>(
    tracker: &mut Tracker<S>,
    date: NaiveDate,
    task_id: &str,
    proof: ProofInput,
    sensors: SessionSensors<'_>,
    settings: SessionSettings,
    input: R,
    abandon: A,
) -> Result<SessionOutcome>
where
    S: ProgressStore + TaskStore + HistoryStore + BadgeStore,
    R: AsyncBufRead + Unpin,
    A: Future,
{
    let SessionSensors { location, motion } = sensors;
    let mut attempt = tracker.start_verification(date, task_id, location, Utc::now())?;

    if !proof.is_empty() {
        attempt.submit_proof(proof.text.as_deref(), proof.photo.as_deref())?;
    }

    print_briefing(&attempt);

    let mut pattern_ticker = ticker_after(settings.tick);
    let mut badge_ticker = ticker_after(settings.badge_poll);
    let mut lines = input.lines();
    let mut reported_flags = attempt.flags().len();
    tokio::pin!(abandon);

    loop {
        tokio::select! {
            _ = pattern_ticker.tick() => {
                if attempt.state() != AttemptState::Running {
                    continue;
                }
                let now = Utc::now();
                attempt.tick(now, motion)?;
                debug!(
                    remaining = attempt.remaining_seconds(now),
                    score = attempt.score(),
                    motion = attempt.device_motion(),
                    "verification tick"
                );
                attempt.flags().iter().skip(reported_flags).for_each(|flag| {
                    println!("! {flag}");
                });
                reported_flags = attempt.flags().len();
            }
            _ = badge_ticker.tick() => {
                if let Err(error) = tracker.poll_badges(Utc::now()) {
                    error!(error = %error, "badge poll failed");
                }
            }
            line = lines.next_line() => {
                let line = line.context("Failed to read session input")?;
                let Some(verdict) = advance(&mut attempt, motion, line)? else {
                    continue;
                };
                let events = tracker.finish_verification(date, &verdict, Utc::now())?;
                return Ok(SessionOutcome::Finished { verdict, events });
            }
            _ = &mut abandon => {
                info!(task_id, "verification abandoned");
                return Ok(SessionOutcome::Abandoned);
            }
        }
    }
}

/// First tick one period from now.
fn ticker_after(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Moves the attempt forward on one input line. `None` input is end of
/// input, which counts as "done" once and abandons a pending proof prompt.
fn advance(
    attempt: &mut VerificationAttempt,
    motion: &mut dyn MotionSampler,
    line: Option<String>,
) -> Result<Option<Verdict>> {
    match attempt.state() {
        AttemptState::Running => match attempt.complete(Utc::now(), motion)? {
            Completion::Verdict(verdict) => Ok(Some(verdict)),
            Completion::ProofRequired => {
                println!("Proof required. Describe what you did, then press Enter:");
                Ok(None)
            }
        },
        AttemptState::AwaitingProof => {
            let text = line.context("Input closed before proof was submitted")?;
            match attempt.submit_proof(Some(&text), None) {
                Ok(verdict) => Ok(verdict),
                Err(VerifyError::ProofMissing) => {
                    println!("Proof cannot be empty. Describe what you did:");
                    Ok(None)
                }
                Err(error) => Err(error.into()),
            }
        }
        state => {
            warn!(?state, "input ignored");
            Ok(None)
        }
    }
}

fn print_briefing(attempt: &VerificationAttempt) {
    println!("Verification started: {}", attempt.task_id());
    println!(
        "- minimum duration: {}m {}s",
        attempt.min_duration() / 60,
        attempt.min_duration() % 60
    );
    println!("- proof required: {}", attempt.proof_required());
    if let Some(point) = attempt.location() {
        println!("- location: {:.4}, {:.4}", point.lat, point.lng);
    }
    attempt.flags().iter().for_each(|flag| println!("! {flag}"));
    println!("Press Enter when done. Ctrl+C abandons the task.");
}

/// Counts `minutes` down and logs them as focus time. Interrupting the
/// timer gives no credit.
pub async fn run_focus_timer<S>(
    tracker: &mut Tracker<S>,
    minutes: u32,
) -> Result<Option<Vec<ProgressEvent>>>
where
    S: ProgressStore + TaskStore + HistoryStore + BadgeStore,
{
    let total = Duration::from_secs(u64::from(minutes) * 60);
    info!(minutes, "focus timer started");

    tokio::select! {
        _ = count_down(total, FOCUS_STEP) => {
            let events = tracker.record_focus(minutes, Utc::now())?;
            Ok(Some(events))
        }
        _ = signal::ctrl_c() => {
            info!(minutes, "focus timer abandoned");
            Ok(None)
        }
    }
}

async fn count_down(total: Duration, step: Duration) {
    let deadline = Instant::now() + total;
    let mut ticker = interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_minute = None;

    loop {
        ticker.tick().await;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }

        let minute = remaining.as_secs().div_ceil(60);
        if last_minute != Some(minute) {
            debug!(remaining_minutes = minute, "focus timer");
            println!("{minute} minute(s) left");
            last_minute = Some(minute);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ProofInput, SessionOutcome, SessionSensors, SessionSettings, count_down,
        run_focus_timer, run_until_abandoned, run_verification_session,
    };
    use crate::catalog::{Difficulty, Task, TaskCategory};
    use crate::collector::ConfiguredLocation;
    use crate::collector::motion::ScriptedMotion;
    use crate::db::{HistoryStore, MemoryStore, TaskStore};
    use crate::tracker::Tracker;
    use chrono::Local;
    use tokio::io::BufReader;
    use tokio::time::{Duration, Instant, sleep};

    const SETTINGS: SessionSettings = SessionSettings {
        tick: Duration::from_millis(50),
        badge_poll: Duration::from_millis(100),
    };

    fn seeded(title: &str) -> Tracker<MemoryStore> {
        let store = MemoryStore::default();
        let task = Task {
            id: "task_0".to_string(),
            title: title.to_string(),
            description: String::new(),
            category: TaskCategory::Mindfulness,
            difficulty: Difficulty::Easy,
            coins: 10,
            completed: false,
        };
        store
            .save_tasks(Local::now().date_naive(), &[task])
            .expect("seed tasks");
        Tracker::new(store)
    }

    #[tokio::test]
    async fn instant_completion_is_rejected_and_penalized() {
        let mut tracker = seeded("Sleep Hygiene");
        let mut location = ConfiguredLocation::new(None);
        let mut motion = ScriptedMotion::still();

        let outcome = run_verification_session(
            &mut tracker,
            Local::now().date_naive(),
            "task_0",
            ProofInput::default(),
            SessionSensors {
                location: &mut location,
                motion: &mut motion,
            },
            SETTINGS,
            &b"\n"[..],
        )
        .await
        .expect("session");

        let SessionOutcome::Finished { verdict, .. } = outcome else {
            panic!("session should finish");
        };
        assert!(!verdict.verified);
        assert_eq!(tracker.progress().strikes, 1);
        assert_eq!(tracker.store().load_history().len(), 1);
    }

    #[tokio::test]
    async fn proof_prompt_reads_the_next_line() {
        let mut tracker = seeded("guided meditation");
        let mut location = ConfiguredLocation::new(None);
        let mut motion = ScriptedMotion::still();

        let outcome = run_verification_session(
            &mut tracker,
            Local::now().date_naive(),
            "task_0",
            ProofInput::default(),
            SessionSensors {
                location: &mut location,
                motion: &mut motion,
            },
            SETTINGS,
            &b"\n   \nbreathed for a while\n"[..],
        )
        .await
        .expect("session");

        assert!(matches!(outcome, SessionOutcome::Finished { .. }));
        assert_eq!(tracker.store().load_history().len(), 1);
    }

    #[tokio::test]
    async fn closed_input_during_proof_prompt_fails_the_session() {
        let mut tracker = seeded("guided meditation");
        let mut location = ConfiguredLocation::new(None);
        let mut motion = ScriptedMotion::still();

        let result = run_verification_session(
            &mut tracker,
            Local::now().date_naive(),
            "task_0",
            ProofInput::default(),
            SessionSensors {
                location: &mut location,
                motion: &mut motion,
            },
            SETTINGS,
            &b"\n"[..],
        )
        .await;

        assert!(result.is_err());
        assert!(tracker.store().load_history().is_empty());
        assert_eq!(tracker.progress().strikes, 0);
    }

    #[tokio::test]
    async fn abandon_after_several_ticks_leaves_no_trace() {
        let mut tracker = seeded("Sleep Hygiene");
        let mut location = ConfiguredLocation::new(None);
        let mut motion = ScriptedMotion::still();
        let (_keep_open, reader) = tokio::io::duplex(64);

        let outcome = run_until_abandoned(
            &mut tracker,
            Local::now().date_naive(),
            "task_0",
            ProofInput::default(),
            SessionSensors {
                location: &mut location,
                motion: &mut motion,
            },
            SETTINGS,
            BufReader::new(reader),
            sleep(Duration::from_millis(230)),
        )
        .await
        .expect("session");

        assert!(matches!(outcome, SessionOutcome::Abandoned));
        assert!(tracker.store().load_history().is_empty());
        assert_eq!(tracker.progress().strikes, 0);
        assert_eq!(tracker.progress().coins, 0);
    }

    #[tokio::test]
    async fn count_down_waits_for_the_full_duration() {
        let started = Instant::now();
        count_down(Duration::from_millis(120), Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn zero_minute_focus_still_logs() {
        let mut tracker = seeded("Sleep Hygiene");
        let events = run_focus_timer(&mut tracker, 0)
            .await
            .expect("focus timer")
            .expect("not interrupted");
        assert_eq!(events.len(), 1);
    }
}
