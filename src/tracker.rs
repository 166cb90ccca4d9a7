use crate::badges::{Badge, BadgeEvaluator};
use crate::catalog::{Task, daily_task_set};
use crate::collector::LocationSampler;
use crate::db::{BadgeStore, HistoryStore, ProgressStore, TaskStore};
use crate::progression::{Ledger, UserProgress};
use crate::verification::{Verdict, VerificationAttempt};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    TaskCredited {
        task_id: String,
        coins: u32,
        balance: u32,
    },
    AllTasksComplete {
        date: NaiveDate,
    },
    PenaltiesApplied {
        penalties: Vec<String>,
        coins_deducted: u32,
        strikes: u32,
        restricted: bool,
    },
    StreakUpdated {
        streak: u32,
        longest: u32,
    },
    Comeback {
        days_away: i64,
    },
    FocusLogged {
        minutes: u32,
        total: u32,
    },
    BadgeEarned(Badge),
}

/// Receives events synchronously, in emission order.
pub trait ProgressListener {
    fn on_event(&mut self, event: &ProgressEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounts {
    pub daily: usize,
    pub comeback: usize,
}

pub struct Tracker<S> {
    store: S,
    evaluator: BadgeEvaluator,
    listeners: Vec<Box<dyn ProgressListener>>,
}

impl<S> Tracker<S>
where
    S: ProgressStore + TaskStore + HistoryStore + BadgeStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            evaluator: BadgeEvaluator,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> Ledger<'_, S> {
        Ledger::new(&self.store)
    }

    pub fn progress(&self) -> UserProgress {
        self.ledger().progress()
    }

    pub fn earned_badges(&self) -> Vec<Badge> {
        self.store.load_badges()
    }

    /// First activity of the day: updates the streak and makes sure today's
    /// task set exists. A user returning after a gap gets the gentler set.
    pub fn check_in(
        &mut self,
        today: NaiveDate,
        counts: TaskCounts,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let comeback = self.ledger().comeback_mode(today);
        let tasks = match self.store.load_tasks(today) {
            Some(tasks) => tasks,
            None => {
                let count = if comeback {
                    counts.comeback
                } else {
                    counts.daily
                };
                let tasks = daily_task_set(today, count, comeback);
                self.store.save_tasks(today, &tasks)?;
                info!(%today, count, comeback, "daily tasks generated");
                tasks
            }
        };

        let events = self.ledger().touch_daily_streak(today)?;
        self.settle(events, now)?;

        Ok(tasks)
    }

    pub fn task(&self, date: NaiveDate, task_id: &str) -> Result<Task> {
        self.store
            .load_tasks(date)
            .with_context(|| format!("No tasks for {date}. Run `shineup checkin` first."))?
            .into_iter()
            .find(|task| task.id == task_id)
            .with_context(|| format!("Unknown task for {date}: {task_id}"))
    }

    /// Credits a task that needs no verification session.
    pub fn complete_unverified_task(
        &mut self,
        date: NaiveDate,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressEvent>> {
        let task = self.task(date, task_id)?;
        if task.requires_verification() {
            bail!("Task {task_id} requires verification. Run `shineup verify {task_id}`.");
        }

        let events = self.ledger().credit_task(date, task_id)?;
        self.settle(events, now)
    }

    pub fn start_verification(
        &self,
        date: NaiveDate,
        task_id: &str,
        location: &mut dyn LocationSampler,
        now: DateTime<Utc>,
    ) -> Result<VerificationAttempt> {
        if self.ledger().is_restricted(now)? {
            let until = self
                .progress()
                .restriction_end
                .map(|end| end.to_rfc3339())
                .unwrap_or_else(|| "later".to_string());
            bail!("Verification is restricted after repeated failures. Try again after {until}.");
        }

        let task = self.task(date, task_id)?;
        if task.completed {
            bail!("Task {task_id} is already completed");
        }

        let mut attempt = VerificationAttempt::new(&task);
        attempt.start(now, self.store.load_history(), location)?;
        Ok(attempt)
    }

    /// Applies a verdict and rescans badges before anyone is notified.
    pub fn finish_verification(
        &mut self,
        date: NaiveDate,
        verdict: &Verdict,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressEvent>> {
        self.store.append_history(verdict.history_entry())?;

        let events = if verdict.verified {
            self.ledger().credit_task(date, &verdict.task_id)?
        } else {
            self.ledger().apply_penalties(&verdict.penalties, now)?
        };

        info!(
            task_id = %verdict.task_id,
            verified = verdict.verified,
            score = verdict.score,
            "verification finished"
        );

        self.settle(events, now)
    }

    pub fn record_focus(&mut self, minutes: u32, now: DateTime<Utc>) -> Result<Vec<ProgressEvent>> {
        let events = self.ledger().record_focus_session(minutes)?;
        self.settle(events, now)
    }

    /// Low-frequency safety net for a missed scan.
    pub fn poll_badges(&mut self, now: DateTime<Utc>) -> Result<Vec<ProgressEvent>> {
        self.settle(Vec::new(), now)
    }

    fn settle(
        &mut self,
        mut events: Vec<ProgressEvent>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressEvent>> {
        let minted = self.evaluator.scan(&self.store, now)?;
        events.extend(minted.into_iter().map(ProgressEvent::BadgeEarned));

        debug!(events = events.len(), "notifying listeners");
        events.iter().for_each(|event| {
            self.listeners
                .iter_mut()
                .for_each(|listener| listener.on_event(event));
        });

        Ok(events)
    }
}
