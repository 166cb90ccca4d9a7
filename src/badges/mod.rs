//! Badge catalog and threshold evaluation. Badges are minted once and never
//! revoked; evaluation only ever grows the earned set.

use crate::db::{BadgeStore, ProgressStore};
use crate::progression::UserProgress;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// Declaration order is display order, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Diamond => "diamond",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Streak,
    Tasks,
    Consistency,
    Focus,
    Wellness,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Streak(u32),
    TotalTasks(u32),
    DailyComplete(u32),
    FocusMinutes(u32),
    Coins(u32),
    Comeback(u32),
}

impl Requirement {
    pub fn threshold(self) -> u32 {
        match self {
            Self::Streak(value)
            | Self::TotalTasks(value)
            | Self::DailyComplete(value)
            | Self::FocusMinutes(value)
            | Self::Coins(value)
            | Self::Comeback(value) => value,
        }
    }

    /// Current value of the tracked stat.
    pub fn current(self, progress: &UserProgress) -> u32 {
        match self {
            Self::Streak(_) => progress.streak.max(progress.longest_streak),
            Self::TotalTasks(_) => progress.total_tasks_completed,
            Self::DailyComplete(_) => progress.daily_completes,
            Self::FocusMinutes(_) => progress.total_focus_minutes,
            // Current balance, not lifetime earnings: spending delays first minting.
            Self::Coins(_) => progress.coins,
            Self::Comeback(_) => progress.comebacks,
        }
    }

    pub fn is_met(self, progress: &UserProgress) -> bool {
        self.current(progress) >= self.threshold()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BadgeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tier: Tier,
    pub category: BadgeCategory,
    pub requirement: Requirement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tier: Tier,
    pub category: BadgeCategory,
    pub earned_at: DateTime<Utc>,
}

impl BadgeDefinition {
    fn mint(&self, now: DateTime<Utc>) -> Badge {
        Badge {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            tier: self.tier,
            category: self.category,
            earned_at: now,
        }
    }
}

const fn badge(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    tier: Tier,
    category: BadgeCategory,
    requirement: Requirement,
) -> BadgeDefinition {
    BadgeDefinition {
        id,
        name,
        description,
        tier,
        category,
        requirement,
    }
}

use BadgeCategory as C;
use Requirement as R;

#[rustfmt::skip]
static DEFINITIONS: [BadgeDefinition; 15] = [
    badge("first_steps", "First Steps", "Started your wellness journey", Tier::Bronze, C::Streak, R::Streak(1)),
    badge("week_warrior", "Week Warrior", "Maintained a 7-day streak", Tier::Silver, C::Streak, R::Streak(7)),
    badge("month_master", "Month Master", "Achieved a 30-day streak", Tier::Gold, C::Streak, R::Streak(30)),
    badge("streak_legend", "Streak Legend", "Incredible 100-day streak", Tier::Platinum, C::Streak, R::Streak(100)),
    badge("task_starter", "Task Starter", "Completed your first 10 tasks", Tier::Bronze, C::Tasks, R::TotalTasks(10)),
    badge("task_crusher", "Task Crusher", "Completed 100 tasks total", Tier::Silver, C::Tasks, R::TotalTasks(100)),
    badge("task_master", "Task Master", "Completed 500 tasks total", Tier::Gold, C::Tasks, R::TotalTasks(500)),
    badge("daily_hero", "Daily Hero", "Completed all daily tasks 10 times", Tier::Silver, C::Consistency, R::DailyComplete(10)),
    badge("consistency_king", "Consistency King", "Completed all daily tasks 50 times", Tier::Gold, C::Consistency, R::DailyComplete(50)),
    badge("focus_novice", "Focus Novice", "Completed 10 hours of focus time", Tier::Bronze, C::Focus, R::FocusMinutes(600)),
    badge("focus_master", "Focus Master", "Completed 100 hours of focus time", Tier::Gold, C::Focus, R::FocusMinutes(6000)),
    badge("wellness_warrior", "Wellness Warrior", "Earned 1000 wellness coins", Tier::Silver, C::Wellness, R::Coins(1000)),
    badge("wellness_champion", "Wellness Champion", "Earned 5000 wellness coins", Tier::Gold, C::Wellness, R::Coins(5000)),
    badge("comeback_hero", "Comeback Hero", "Returned after a break and rebuilt your streak", Tier::Gold, C::Special, R::Comeback(1)),
    badge("diamond_elite", "Diamond Elite", "Ultimate wellness achievement - 365-day streak", Tier::Diamond, C::Special, R::Streak(365)),
];

pub fn definitions() -> &'static [BadgeDefinition] {
    &DEFINITIONS
}

/// Mints every definition that is not yet in `earned` and whose requirement
/// holds. Pure; the caller persists the result.
pub fn evaluate(progress: &UserProgress, earned: &[Badge], now: DateTime<Utc>) -> Vec<Badge> {
    let earned_ids = earned
        .iter()
        .map(|badge| badge.id.as_str())
        .collect::<HashSet<_>>();

    definitions()
        .iter()
        .filter(|definition| !earned_ids.contains(definition.id))
        .filter(|definition| definition.requirement.is_met(progress))
        .map(|definition| definition.mint(now))
        .collect()
}

/// Earned badges sorted for display: highest tier first, then oldest first.
pub fn display_order(mut badges: Vec<Badge>) -> Vec<Badge> {
    badges.sort_by(|left, right| {
        right
            .tier
            .cmp(&left.tier)
            .then(left.earned_at.cmp(&right.earned_at))
    });
    badges
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BadgeEvaluator;

impl BadgeEvaluator {
    pub fn scan<S>(&self, store: &S, now: DateTime<Utc>) -> Result<Vec<Badge>>
    where
        S: ProgressStore + BadgeStore + ?Sized,
    {
        let progress = store.load_progress();
        let mut earned = store.load_badges();
        let minted = evaluate(&progress, &earned, now);

        if minted.is_empty() {
            return Ok(minted);
        }

        earned.extend(minted.iter().cloned());
        store.save_badges(&earned)?;

        minted.iter().for_each(|badge| {
            info!(badge_id = %badge.id, tier = %badge.tier, "badge earned");
        });

        Ok(minted)
    }
}
