//! Anti-cheat gate for task completion.
//!
//! A [`VerificationAttempt`] is one timed session for one task. It collects
//! suspicious-activity flags while running, applies the terminal duration and
//! motion checks on completion, and produces a [`Verdict`]. The heuristic is
//! best-effort; every signal it reads can be faked.

pub mod patterns;
pub mod policy;

use crate::catalog::{Task, TaskCategory};
use crate::collector::motion::is_motion;
use crate::collector::{GeoPoint, LocationSampler, MotionSampler};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const FLAG_LOCATION_DENIED: &str = "location access denied for outdoor task";
pub const PENALTY_NO_MOTION: &str = "no device motion detected";

const INITIAL_SCORE: i32 = 100;
const PASSING_SCORE: i32 = 60;
const MAX_PENALTIES: usize = 3;
const FLAG_COST: i32 = 20;
const LOCATION_COST: i32 = 15;
const TOO_QUICK_COST: i32 = 30;
const NO_MOTION_COST: i32 = 25;
const FINAL_COST_PER_PENALTY: i32 = 10;
const MOTION_CHECK_AFTER_SECONDS: u64 = 300;

/// Durable summary of one finished attempt, passed or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: String,
    pub completed_at: DateTime<Utc>,
    pub duration_sec: u64,
    pub verified: bool,
    pub score: u32,
    pub penalties: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Running,
    AwaitingProof,
    Completed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("proof requires a description or a photo")]
    ProofMissing,
    #[error("cannot {action} while the attempt is {state:?}")]
    InvalidState {
        action: &'static str,
        state: AttemptState,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub task_id: String,
    pub verified: bool,
    pub score: u32,
    pub duration_sec: u64,
    pub completed_at: DateTime<Utc>,
    /// Penalties charged to the user. Empty when verified.
    pub penalties: Vec<String>,
    /// Every flag and terminal penalty the attempt recorded, verified or not.
    pub findings: Vec<String>,
}

impl Verdict {
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            task_id: self.task_id.clone(),
            completed_at: self.completed_at,
            duration_sec: self.duration_sec,
            verified: self.verified,
            score: self.score,
            penalties: self.findings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The task needs proof; call [`VerificationAttempt::submit_proof`].
    ProofRequired,
    Verdict(Verdict),
}

#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    task_id: String,
    title: String,
    category: TaskCategory,
    min_duration: u64,
    proof_required: bool,
    state: AttemptState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    flags: Vec<String>,
    score: i32,
    proof_text: Option<String>,
    photo_ref: Option<String>,
    location: Option<GeoPoint>,
    device_motion: bool,
    history: Vec<HistoryEntry>,
    pending_penalties: Vec<String>,
    duration_sec: u64,
}

impl VerificationAttempt {
    pub fn new(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            category: task.category,
            min_duration: policy::minimum_duration(task.category, &task.hint_text()),
            proof_required: policy::requires_proof(&task.title),
            state: AttemptState::Idle,
            started_at: None,
            ended_at: None,
            flags: Vec::new(),
            score: INITIAL_SCORE,
            proof_text: None,
            photo_ref: None,
            location: None,
            device_motion: false,
            history: Vec::new(),
            pending_penalties: Vec::new(),
            duration_sec: 0,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn min_duration(&self) -> u64 {
        self.min_duration
    }

    pub fn proof_required(&self) -> bool {
        self.proof_required
    }

    pub fn score(&self) -> u32 {
        self.score.clamp(0, INITIAL_SCORE) as u32
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn device_motion(&self) -> bool {
        self.device_motion
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|started| rounded_seconds(now - started))
            .unwrap_or_default()
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.min_duration.saturating_sub(self.elapsed_seconds(now))
    }

    /// Begins the timed session. `history` is the completion log, newest first.
    pub fn start(
        &mut self,
        now: DateTime<Utc>,
        history: Vec<HistoryEntry>,
        location: &mut dyn LocationSampler,
    ) -> Result<(), VerifyError> {
        self.expect_state(AttemptState::Idle, "start")?;

        self.started_at = Some(now);
        self.history = history;
        self.state = AttemptState::Running;

        if policy::is_outdoor(&self.title) {
            match location.sample() {
                Ok(point) => self.location = Some(point),
                Err(error) => {
                    warn!(task_id = %self.task_id, error = %error, "location sample failed");
                    self.add_flag(FLAG_LOCATION_DENIED, LOCATION_COST);
                }
            }
        }

        debug!(
            task_id = %self.task_id,
            min_duration = self.min_duration,
            proof_required = self.proof_required,
            "verification started"
        );
        Ok(())
    }

    /// Periodic check while running.
    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        motion: &mut dyn MotionSampler,
    ) -> Result<(), VerifyError> {
        self.expect_state(AttemptState::Running, "tick")?;
        self.observe(now, motion);
        Ok(())
    }

    /// Proof may be attached while running or once the attempt asks for it.
    /// In the latter case the verdict is finalized and returned.
    pub fn submit_proof(
        &mut self,
        text: Option<&str>,
        photo_ref: Option<&str>,
    ) -> Result<Option<Verdict>, VerifyError> {
        if !matches!(
            self.state,
            AttemptState::Running | AttemptState::AwaitingProof
        ) {
            return Err(VerifyError::InvalidState {
                action: "submit proof",
                state: self.state,
            });
        }

        let text = non_blank(text);
        let photo_ref = non_blank(photo_ref);
        if text.is_none() && photo_ref.is_none() {
            return Err(VerifyError::ProofMissing);
        }

        self.proof_text = text.or(self.proof_text.take());
        self.photo_ref = photo_ref.or(self.photo_ref.take());

        if self.state == AttemptState::AwaitingProof {
            return Ok(Some(self.finalize()));
        }
        Ok(None)
    }

    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        motion: &mut dyn MotionSampler,
    ) -> Result<Completion, VerifyError> {
        self.expect_state(AttemptState::Running, "complete")?;
        self.observe(now, motion);

        let duration = self.elapsed_seconds(now);
        self.ended_at = Some(now);
        self.duration_sec = duration;

        if duration < self.min_duration {
            self.pending_penalties.push(format!(
                "completed too quickly ({duration}s vs required {}s)",
                self.min_duration
            ));
            self.deduct(TOO_QUICK_COST);
        }

        if self.category == TaskCategory::Fitness
            && !self.device_motion
            && duration > MOTION_CHECK_AFTER_SECONDS
        {
            self.pending_penalties.push(PENALTY_NO_MOTION.to_string());
            self.deduct(NO_MOTION_COST);
        }

        if self.proof_required && !self.has_proof() {
            self.state = AttemptState::AwaitingProof;
            debug!(task_id = %self.task_id, "verification awaiting proof");
            return Ok(Completion::ProofRequired);
        }

        Ok(Completion::Verdict(self.finalize()))
    }

    fn finalize(&mut self) -> Verdict {
        let new_penalties = self.pending_penalties.len();
        let final_score =
            (self.score - FINAL_COST_PER_PENALTY * new_penalties as i32).max(0);
        let verified =
            final_score >= PASSING_SCORE && self.flags.len() + new_penalties < MAX_PENALTIES;

        self.state = AttemptState::Completed;

        let findings = self
            .flags
            .iter()
            .chain(self.pending_penalties.iter())
            .cloned()
            .collect::<Vec<_>>();
        let penalties = if verified {
            Vec::new()
        } else {
            findings.clone()
        };

        Verdict {
            task_id: self.task_id.clone(),
            verified,
            score: final_score as u32,
            duration_sec: self.duration_sec,
            completed_at: self.ended_at.unwrap_or_else(Utc::now),
            penalties,
            findings,
        }
    }

    fn observe(&mut self, now: DateTime<Utc>, motion: &mut dyn MotionSampler) {
        let Some(started_at) = self.started_at else {
            return;
        };

        let window_end = started_at + Duration::seconds(self.min_duration as i64);
        if self.category == TaskCategory::Fitness && !self.device_motion && now <= window_end {
            match motion.drain() {
                Ok(samples) => {
                    if samples.iter().any(is_motion) {
                        self.device_motion = true;
                        debug!(task_id = %self.task_id, "device motion detected");
                    }
                }
                Err(error) => {
                    debug!(task_id = %self.task_id, error = %error, "motion sample unavailable");
                }
            }
        }

        patterns::detect(&self.history, started_at, self.min_duration, now)
            .into_iter()
            .for_each(|flag| {
                self.add_flag(flag, FLAG_COST);
            });
    }

    fn add_flag(&mut self, flag: &str, cost: i32) -> bool {
        if self.flags.iter().any(|existing| existing == flag) {
            return false;
        }

        debug!(task_id = %self.task_id, flag, "suspicious activity flagged");
        self.flags.push(flag.to_string());
        self.deduct(cost);
        true
    }

    fn deduct(&mut self, cost: i32) {
        self.score = (self.score - cost).max(0);
    }

    fn has_proof(&self) -> bool {
        self.proof_text.is_some() || self.photo_ref.is_some()
    }

    fn expect_state(&self, expected: AttemptState, action: &'static str) -> Result<(), VerifyError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(VerifyError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn rounded_seconds(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}

#[cfg(test)]
mod tests {
    use super::{
        AttemptState, Completion, FLAG_LOCATION_DENIED, HistoryEntry, PENALTY_NO_MOTION,
        VerificationAttempt, VerifyError,
    };
    use crate::catalog::{Difficulty, Task, TaskCategory};
    use crate::collector::motion::ScriptedMotion;
    use crate::collector::{ConfiguredLocation, GeoPoint};
    use crate::verification::patterns::{FLAG_RAPID, FLAG_TOO_QUICK};
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};

    fn noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .single()
            .expect("unambiguous local noon")
            .with_timezone(&Utc)
    }

    fn task(title: &str, description: &str, category: TaskCategory) -> Task {
        Task {
            id: "task_0".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category,
            difficulty: Difficulty::Hard,
            coins: 9,
            completed: false,
        }
    }

    fn started(task: &Task, now: DateTime<Utc>, history: Vec<HistoryEntry>) -> VerificationAttempt {
        let mut attempt = VerificationAttempt::new(task);
        attempt
            .start(now, history, &mut ConfiguredLocation::new(None))
            .expect("idle attempt starts");
        attempt
    }

    fn verdict(completion: Completion) -> super::Verdict {
        match completion {
            Completion::Verdict(verdict) => verdict,
            Completion::ProofRequired => panic!("expected a verdict"),
        }
    }

    #[test]
    fn meditation_after_301_seconds_passes() {
        let start = noon();
        let task = task("Meditation Session", "Sit quietly and breathe", TaskCategory::Mindfulness);
        let mut attempt = started(&task, start, Vec::new());

        assert!(!attempt.proof_required());
        let result = verdict(
            attempt
                .complete(start + Duration::seconds(301), &mut ScriptedMotion::still())
                .expect("running attempt completes"),
        );

        assert!(result.verified);
        assert!(result.penalties.is_empty());
        assert_eq!(result.score, 100);
        assert_eq!(attempt.state(), AttemptState::Completed);
    }

    #[test]
    fn meditation_ticked_every_five_seconds_passes_without_penalties() {
        let start = noon();
        let task = task("Meditation Session", "Sit quietly and breathe", TaskCategory::Mindfulness);
        let mut attempt = started(&task, start, Vec::new());
        let mut motion = ScriptedMotion::still();

        (5..=300).step_by(5).for_each(|second| {
            attempt
                .tick(start + Duration::seconds(second), &mut motion)
                .expect("tick while running");
        });
        assert_eq!(attempt.flags(), [FLAG_TOO_QUICK.to_string()]);

        let result = verdict(
            attempt
                .complete(start + Duration::seconds(301), &mut motion)
                .expect("running attempt completes"),
        );

        assert!(result.verified);
        assert_eq!(result.score, 80);
        assert!(result.penalties.is_empty());
        assert_eq!(
            result.history_entry().penalties,
            vec![FLAG_TOO_QUICK.to_string()]
        );
    }

    #[test]
    fn workout_completed_in_100_seconds_fails() {
        let start = noon();
        let task = task(
            "Workout Challenge",
            "Complete a 45-minute high-intensity workout",
            TaskCategory::Fitness,
        );
        let mut attempt = started(&task, start, Vec::new());
        assert_eq!(attempt.min_duration(), 2700);

        let result = verdict(
            attempt
                .complete(start + Duration::seconds(100), &mut ScriptedMotion::still())
                .expect("running attempt completes"),
        );

        assert!(!result.verified);
        assert!(
            result
                .penalties
                .contains(&"completed too quickly (100s vs required 2700s)".to_string())
        );
        assert!(result.score < 60);
    }

    #[test]
    fn too_quick_penalty_costs_exactly_thirty() {
        let start = noon();
        let task = task("Help a Teammate", "Comment on progress", TaskCategory::Team);
        let mut attempt = started(&task, start, Vec::new());

        // 60s clears the 30% early warning (54s) but not the 180s minimum.
        let result = verdict(
            attempt
                .complete(start + Duration::seconds(60), &mut ScriptedMotion::still())
                .expect("running attempt completes"),
        );

        assert!(result.penalties.is_empty());
        assert_eq!(
            result.findings,
            vec!["completed too quickly (60s vs required 180s)".to_string()]
        );
        assert_eq!(attempt.score(), 70);
        assert_eq!(result.score, 60);
        assert!(result.verified);
    }

    #[test]
    fn rapid_completions_flag_once() {
        let start = noon();
        let history = (1..=4)
            .map(|index| HistoryEntry {
                task_id: format!("task_{index}"),
                completed_at: start - Duration::seconds(30 * index),
                duration_sec: 200 + index as u64,
                verified: true,
                score: 100,
                penalties: Vec::new(),
            })
            .collect::<Vec<_>>();
        let task = task("Help a Teammate", "Comment on progress", TaskCategory::Team);
        let mut attempt = started(&task, start, history);
        let mut motion = ScriptedMotion::still();

        attempt
            .tick(start + Duration::seconds(60), &mut motion)
            .expect("tick while running");
        assert_eq!(attempt.flags(), [FLAG_RAPID.to_string()]);
        assert_eq!(attempt.score(), 80);

        attempt
            .tick(start + Duration::seconds(65), &mut motion)
            .expect("tick while running");
        assert_eq!(attempt.flags().len(), 1);
        assert_eq!(attempt.score(), 80);
    }

    #[test]
    fn score_floors_at_zero() {
        let start = noon();
        let history = (0..21)
            .map(|index| HistoryEntry {
                task_id: format!("task_{index}"),
                completed_at: start - Duration::seconds(30 + index * 10),
                duration_sec: 42,
                verified: true,
                score: 100,
                penalties: Vec::new(),
            })
            .collect::<Vec<_>>();
        let task = task("Nature Walk", "Take a walk outdoors", TaskCategory::Fitness);
        let mut attempt = started(&task, start, history);
        assert_eq!(attempt.flags(), [FLAG_LOCATION_DENIED.to_string()]);

        attempt
            .tick(start + Duration::seconds(5), &mut ScriptedMotion::still())
            .expect("tick while running");
        // 15 for location plus four pattern flags at 20 each.
        assert_eq!(attempt.flags().len(), 5);
        assert_eq!(attempt.score(), 5);

        let result = verdict(
            attempt
                .complete(start + Duration::seconds(10), &mut ScriptedMotion::still())
                .expect("running attempt completes"),
        );
        assert_eq!(result.score, 0);
        assert!(!result.verified);
        assert!(result.penalties.contains(&FLAG_TOO_QUICK.to_string()));
    }

    #[test]
    fn outdoor_task_keeps_granted_location() {
        let start = noon();
        let task = task("Nature Walk", "Take a walk outdoors", TaskCategory::Fitness);
        let point = GeoPoint {
            lat: 37.56,
            lng: 126.97,
        };
        let mut attempt = VerificationAttempt::new(&task);
        attempt
            .start(start, Vec::new(), &mut ConfiguredLocation::new(Some(point)))
            .expect("idle attempt starts");

        assert_eq!(attempt.location(), Some(point));
        assert!(attempt.flags().is_empty());
    }

    #[test]
    fn fitness_without_motion_is_penalized() {
        let start = noon();
        let task = task("Morning Stretch", "Stretch routine", TaskCategory::Fitness);
        let mut attempt = started(&task, start, Vec::new());

        let result = verdict(
            attempt
                .complete(start + Duration::seconds(601), &mut ScriptedMotion::still())
                .expect("running attempt completes"),
        );

        assert!(result.verified);
        assert!(result.penalties.is_empty());
        assert_eq!(
            result.history_entry().penalties,
            vec![PENALTY_NO_MOTION.to_string()]
        );
        assert_eq!(result.score, 65);
    }

    #[test]
    fn motion_inside_window_counts_once() {
        let start = noon();
        let task = task("Morning Stretch", "Stretch routine", TaskCategory::Fitness);
        let mut attempt = started(&task, start, Vec::new());
        let mut motion = ScriptedMotion::shaking();

        attempt
            .tick(start + Duration::seconds(200), &mut motion)
            .expect("tick while running");
        assert!(attempt.device_motion());

        let result = verdict(
            attempt
                .complete(start + Duration::seconds(650), &mut motion)
                .expect("running attempt completes"),
        );
        assert!(result.penalties.is_empty());
        assert_eq!(result.score, 100);
    }

    #[test]
    fn motion_after_window_is_ignored() {
        let start = noon();
        let task = task("Morning Stretch", "Stretch routine", TaskCategory::Fitness);
        let mut attempt = started(&task, start, Vec::new());

        attempt
            .tick(start + Duration::seconds(700), &mut ScriptedMotion::shaking())
            .expect("tick while running");
        assert!(!attempt.device_motion());
    }

    #[test]
    fn proof_gate_blocks_until_submitted() {
        let start = noon();
        let task = task("guided meditation", "Sit with a recording", TaskCategory::Mindfulness);
        let mut attempt = started(&task, start, Vec::new());

        let completion = attempt
            .complete(start + Duration::seconds(400), &mut ScriptedMotion::still())
            .expect("running attempt completes");
        assert_eq!(completion, Completion::ProofRequired);
        assert_eq!(attempt.state(), AttemptState::AwaitingProof);

        assert_eq!(
            attempt.submit_proof(Some("   "), None),
            Err(VerifyError::ProofMissing)
        );
        assert_eq!(attempt.state(), AttemptState::AwaitingProof);

        let result = attempt
            .submit_proof(Some("Followed a 7 minute body scan"), None)
            .expect("proof accepted")
            .expect("awaiting attempt finalizes");
        assert!(result.verified);
        assert_eq!(result.duration_sec, 400);
        assert_eq!(result.completed_at, start + Duration::seconds(400));
    }

    #[test]
    fn proof_submitted_early_skips_the_gate() {
        let start = noon();
        let task = task("guided meditation", "Sit with a recording", TaskCategory::Mindfulness);
        let mut attempt = started(&task, start, Vec::new());

        assert_eq!(attempt.submit_proof(None, Some("photo://mat.jpg")), Ok(None));
        let completion = attempt
            .complete(start + Duration::seconds(400), &mut ScriptedMotion::still())
            .expect("running attempt completes");
        assert!(matches!(completion, Completion::Verdict(ref verdict) if verdict.verified));
    }

    #[test]
    fn completed_attempt_is_immutable() {
        let start = noon();
        let task = task("Help a Teammate", "Comment on progress", TaskCategory::Team);
        let mut attempt = started(&task, start, Vec::new());
        attempt
            .complete(start + Duration::seconds(200), &mut ScriptedMotion::still())
            .expect("running attempt completes");

        assert!(matches!(
            attempt.tick(start + Duration::seconds(205), &mut ScriptedMotion::still()),
            Err(VerifyError::InvalidState { .. })
        ));
        assert!(matches!(
            attempt.submit_proof(Some("late"), None),
            Err(VerifyError::InvalidState { .. })
        ));
        assert!(matches!(
            attempt.start(start, Vec::new(), &mut ConfiguredLocation::new(None)),
            Err(VerifyError::InvalidState { .. })
        ));
    }
}
