//! The progression ledger: coins, streak, lifetime counters, strikes and the
//! temporary restriction that three strikes impose.
//!
//! Every mutation loads the current record, applies the change and writes it
//! back before returning the [`ProgressEvent`]s it caused.

use crate::db::{ProgressStore, TaskStore};
use crate::tracker::ProgressEvent;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PENALTY_COINS: u32 = 5;
pub const DAILY_LOGIN_BONUS: u32 = 1;
pub const STRIKES_BEFORE_RESTRICTION: u32 = 3;
pub const RESTRICTION_HOURS: i64 = 24;
pub const ACTIVITY_HISTORY_DAYS: usize = 30;
pub const COMEBACK_GAP_DAYS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProgress {
    pub coins: u32,
    pub lifetime_coins_earned: u64,
    pub streak: u32,
    pub longest_streak: u32,
    pub total_tasks_completed: u32,
    pub daily_completes: u32,
    pub total_focus_minutes: u32,
    pub comebacks: u32,
    pub strikes: u32,
    pub last_strike: Option<DateTime<Utc>>,
    pub restricted: bool,
    pub restriction_end: Option<DateTime<Utc>>,
    pub last_active_date: Option<NaiveDate>,
    /// Days with at least one check-in, oldest first.
    pub activity_history: Vec<NaiveDate>,
}

impl UserProgress {
    fn earn(&mut self, coins: u32) {
        self.coins = self.coins.saturating_add(coins);
        self.lifetime_coins_earned = self.lifetime_coins_earned.saturating_add(u64::from(coins));
    }

    fn days_since_active(&self, today: NaiveDate) -> Option<i64> {
        self.last_active_date
            .map(|last| (today - last).num_days())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("task {task_id} is not part of the task set for {date}")]
    UnknownTask { date: NaiveDate, task_id: String },
    #[error("cannot spend {requested} coins with a balance of {balance}")]
    InsufficientCoins { requested: u32, balance: u32 },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct Ledger<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> Ledger<'s, S>
where
    S: ProgressStore + TaskStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn progress(&self) -> UserProgress {
        self.store.load_progress()
    }

    pub fn credit_task(
        &self,
        date: NaiveDate,
        task_id: &str,
    ) -> Result<Vec<ProgressEvent>, LedgerError> {
        let unknown = || LedgerError::UnknownTask {
            date,
            task_id: task_id.to_string(),
        };

        let mut tasks = self.store.load_tasks(date).ok_or_else(unknown)?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(unknown)?;

        if task.completed {
            debug!(task_id, "task already credited");
            return Ok(Vec::new());
        }

        task.completed = true;
        let coins = task.coins;
        let all_complete = tasks.iter().all(|task| task.completed);
        self.store.save_tasks(date, &tasks)?;

        let mut progress = self.store.load_progress();
        progress.earn(coins);
        progress.total_tasks_completed += 1;
        if all_complete {
            progress.daily_completes += 1;
        }
        self.store.save_progress(&progress)?;

        info!(task_id, coins, balance = progress.coins, "task credited");

        let mut events = vec![ProgressEvent::TaskCredited {
            task_id: task_id.to_string(),
            coins,
            balance: progress.coins,
        }];
        if all_complete {
            events.push(ProgressEvent::AllTasksComplete { date });
        }

        Ok(events)
    }

    pub fn apply_penalties(
        &self,
        penalties: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<ProgressEvent>, LedgerError> {
        let mut progress = self.store.load_progress();

        let owed = u32::try_from(penalties.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(PENALTY_COINS);
        let deducted = owed.min(progress.coins);
        progress.coins -= deducted;
        progress.strikes += 1;
        progress.last_strike = Some(now);

        if progress.strikes >= STRIKES_BEFORE_RESTRICTION {
            progress.restricted = true;
            progress.restriction_end = Some(now + Duration::hours(RESTRICTION_HOURS));
        }
        self.store.save_progress(&progress)?;

        warn!(
            penalties = penalties.len(),
            deducted,
            strikes = progress.strikes,
            restricted = progress.restricted,
            "verification penalties applied"
        );

        Ok(vec![ProgressEvent::PenaltiesApplied {
            penalties: penalties.to_vec(),
            coins_deducted: deducted,
            strikes: progress.strikes,
            restricted: progress.restricted,
        }])
    }

    pub fn touch_daily_streak(&self, today: NaiveDate) -> Result<Vec<ProgressEvent>, LedgerError> {
        let mut progress = self.store.load_progress();
        let mut events = Vec::new();

        match progress.days_since_active(today) {
            None => progress.streak = 1,
            Some(days) if days <= 0 => return Ok(events),
            Some(1) => progress.streak += 1,
            Some(days_away) => {
                progress.streak = 0;
                progress.comebacks += 1;
                info!(days_away, "streak broken, welcome back");
                events.push(ProgressEvent::Comeback { days_away });
            }
        }

        progress.longest_streak = progress.longest_streak.max(progress.streak);
        progress.earn(DAILY_LOGIN_BONUS);
        progress.activity_history.push(today);
        let overflow = progress
            .activity_history
            .len()
            .saturating_sub(ACTIVITY_HISTORY_DAYS);
        progress.activity_history.drain(..overflow);
        progress.last_active_date = Some(today);
        self.store.save_progress(&progress)?;

        events.push(ProgressEvent::StreakUpdated {
            streak: progress.streak,
            longest: progress.longest_streak,
        });

        Ok(events)
    }

    pub fn record_focus_session(&self, minutes: u32) -> Result<Vec<ProgressEvent>, LedgerError> {
        let mut progress = self.store.load_progress();
        progress.total_focus_minutes = progress.total_focus_minutes.saturating_add(minutes);
        self.store.save_progress(&progress)?;

        Ok(vec![ProgressEvent::FocusLogged {
            minutes,
            total: progress.total_focus_minutes,
        }])
    }

    pub fn spend_coins(&self, amount: u32) -> Result<u32, LedgerError> {
        let mut progress = self.store.load_progress();
        if amount > progress.coins {
            return Err(LedgerError::InsufficientCoins {
                requested: amount,
                balance: progress.coins,
            });
        }

        progress.coins -= amount;
        self.store.save_progress(&progress)?;

        Ok(progress.coins)
    }

    pub fn is_restricted(&self, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        let mut progress = self.store.load_progress();
        if !progress.restricted {
            return Ok(false);
        }

        match progress.restriction_end {
            Some(end) if end > now => Ok(true),
            _ => {
                progress.restricted = false;
                progress.restriction_end = None;
                progress.strikes = 0;
                self.store.save_progress(&progress)?;
                info!("restriction lifted");
                Ok(false)
            }
        }
    }

    /// Hint for the task generator: relax the day after a long absence.
    pub fn comeback_mode(&self, today: NaiveDate) -> bool {
        self.store
            .load_progress()
            .days_since_active(today)
            .is_some_and(|days| days >= COMEBACK_GAP_DAYS)
    }
}
