use crate::badges::{Badge, display_order};
use crate::catalog::{Task, TaskCategory};
use crate::progression::UserProgress;
use crate::verification::HistoryEntry;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const RECENT_VERDICTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub generated_at: String,
    pub coins: u32,
    pub lifetime_coins_earned: u64,
    pub streak: u32,
    pub longest_streak: u32,
    pub tasks_done: usize,
    pub tasks_total: usize,
    pub coins_open: u32,
    pub open_by_category: BTreeMap<String, usize>,
    /// Seven days ending today, oldest first.
    pub week: Vec<(String, bool)>,
    pub recent_verified: usize,
    pub recent_total: usize,
    pub recent_average_score: u32,
    pub focus_minutes: u32,
    pub badges: Vec<String>,
    pub notes: Vec<String>,
}

pub fn build_day_summary(
    date: NaiveDate,
    progress: &UserProgress,
    tasks: &[Task],
    history: &[HistoryEntry],
    badges: &[Badge],
    now: DateTime<Utc>,
) -> DaySummary {
    let tasks_done = tasks.iter().filter(|task| task.completed).count();
    let open = tasks.iter().filter(|task| !task.completed);
    let coins_open = open.clone().map(|task| task.coins).sum::<u32>();
    let open_by_category = open.fold(BTreeMap::new(), |mut acc, task| {
        *acc.entry(category_label(task.category).to_string())
            .or_insert(0_usize) += 1;
        acc
    });

    let week = (0..7)
        .rev()
        .map(|offset| date - Duration::days(offset))
        .map(|day| {
            (
                day.format("%a").to_string(),
                progress.activity_history.contains(&day),
            )
        })
        .collect::<Vec<_>>();

    let recent = history.iter().take(RECENT_VERDICTS).collect::<Vec<_>>();
    let recent_verified = recent.iter().filter(|entry| entry.verified).count();
    let recent_average_score = if recent.is_empty() {
        0
    } else {
        recent.iter().map(|entry| entry.score).sum::<u32>() / recent.len() as u32
    };

    let badges = display_order(badges.to_vec())
        .into_iter()
        .map(|badge| format!("{} ({})", badge.name, badge.tier))
        .collect::<Vec<_>>();

    DaySummary {
        date: date.format("%Y-%m-%d").to_string(),
        generated_at: now.to_rfc3339(),
        coins: progress.coins,
        lifetime_coins_earned: progress.lifetime_coins_earned,
        streak: progress.streak,
        longest_streak: progress.longest_streak,
        tasks_done,
        tasks_total: tasks.len(),
        coins_open,
        open_by_category,
        week,
        recent_verified,
        recent_total: recent.len(),
        recent_average_score,
        focus_minutes: progress.total_focus_minutes,
        badges,
        notes: notes(date, progress, history, now),
    }
}

pub fn render_markdown(summary: &DaySummary) -> String {
    let week_row = summary
        .week
        .iter()
        .map(|(day, active)| format!("{day} {}", if *active { "●" } else { "○" }))
        .collect::<Vec<_>>()
        .join("  ");

    let open_rows = if summary.open_by_category.is_empty() {
        "- Nothing left today".to_string()
    } else {
        summary
            .open_by_category
            .iter()
            .map(|(category, count)| format!("- {category}: {count}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let badge_rows = if summary.badges.is_empty() {
        "- None yet".to_string()
    } else {
        summary
            .badges
            .iter()
            .map(|badge| format!("- {badge}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let note_rows = if summary.notes.is_empty() {
        "- All clear".to_string()
    } else {
        summary
            .notes
            .iter()
            .map(|note| format!("- {note}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# ShineUp - {}\n\n## Summary\n- Coins: {} (lifetime {})\n- Streak: {} days (longest {})\n- Tasks: {}/{} done, {} coins still open\n- Focus time: {}\n- Recent verifications: {}/{} passed, average score {}\n\n## This Week\n{}\n\n## Open Tasks\n{}\n\n## Badges\n{}\n\n## Notes\n{}\n",
        summary.date,
        summary.coins,
        summary.lifetime_coins_earned,
        summary.streak,
        summary.longest_streak,
        summary.tasks_done,
        summary.tasks_total,
        summary.coins_open,
        format_minutes(summary.focus_minutes),
        summary.recent_verified,
        summary.recent_total,
        summary.recent_average_score,
        week_row,
        open_rows,
        badge_rows,
        note_rows
    )
}

fn notes(
    date: NaiveDate,
    progress: &UserProgress,
    history: &[HistoryEntry],
    now: DateTime<Utc>,
) -> Vec<String> {
    let restriction = progress
        .restriction_end
        .filter(|end| progress.restricted && *end > now)
        .map(|end| {
            format!(
                "Verification restricted until {}",
                end.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )
        });

    let strikes = (!progress.restricted && progress.strikes > 0)
        .then(|| format!("{} strike(s) recorded; 3 restrict verification for 24h", progress.strikes));

    let streak_at_risk = (progress.streak > 0 && progress.last_active_date != Some(date))
        .then(|| "Check in today to keep your streak".to_string());

    let last_failed = history
        .first()
        .filter(|entry| !entry.verified)
        .map(|entry| {
            format!(
                "Last verification failed (score {}): {}",
                entry.score,
                entry.penalties.join(", ")
            )
        });

    [restriction, strikes, streak_at_risk, last_failed]
        .into_iter()
        .flatten()
        .collect()
}

fn category_label(category: TaskCategory) -> &'static str {
    match category {
        TaskCategory::Fitness => "Fitness",
        TaskCategory::Mindfulness => "Mindfulness",
        TaskCategory::Nutrition => "Nutrition",
        TaskCategory::Productivity => "Productivity",
        TaskCategory::Team => "Team",
    }
}

fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let remain = minutes % 60;

    if hours > 0 {
        format!("{hours}h {remain}m")
    } else {
        format!("{remain}m")
    }
}

#[cfg(test)]
mod tests {
    use super::{build_day_summary, format_minutes, render_markdown};
    use crate::catalog::daily_task_set;
    use crate::progression::UserProgress;
    use crate::verification::HistoryEntry;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date")
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn summarizes_tasks_week_and_history() {
        let mut tasks = daily_task_set(today(), 4, false);
        tasks[0].completed = true;
        let progress = UserProgress {
            coins: 30,
            streak: 2,
            longest_streak: 5,
            last_active_date: Some(today()),
            activity_history: vec![today() - Duration::days(1), today()],
            ..UserProgress::default()
        };
        let history = vec![
            HistoryEntry {
                task_id: "task_1".to_string(),
                completed_at: now(),
                duration_sec: 30,
                verified: false,
                score: 40,
                penalties: vec!["completed too quickly".to_string()],
            },
            HistoryEntry {
                task_id: "task_0".to_string(),
                completed_at: now() - Duration::hours(1),
                duration_sec: 900,
                verified: true,
                score: 100,
                penalties: Vec::new(),
            },
        ];

        let summary = build_day_summary(today(), &progress, &tasks, &history, &[], now());
        assert_eq!(summary.tasks_done, 1);
        assert_eq!(summary.tasks_total, 4);
        assert_eq!(summary.open_by_category.values().sum::<usize>(), 3);
        assert_eq!(summary.week.len(), 7);
        assert_eq!(
            summary.week.iter().filter(|(_, active)| *active).count(),
            2
        );
        assert!(summary.week.last().is_some_and(|(_, active)| *active));
        assert_eq!(summary.recent_verified, 1);
        assert_eq!(summary.recent_average_score, 70);
        assert_eq!(summary.notes.len(), 1);

        let markdown = render_markdown(&summary);
        assert!(markdown.contains("# ShineUp - 2026-03-10"));
        assert!(markdown.contains("Tasks: 1/4 done"));
        assert!(markdown.contains("Last verification failed (score 40)"));
    }

    #[test]
    fn restriction_and_missed_check_in_are_noted() {
        let progress = UserProgress {
            streak: 3,
            strikes: 3,
            restricted: true,
            restriction_end: Some(now() + Duration::hours(4)),
            last_active_date: Some(today() - Duration::days(1)),
            ..UserProgress::default()
        };

        let summary = build_day_summary(today(), &progress, &[], &[], &[], now());
        assert_eq!(summary.notes.len(), 2);
        assert!(summary.notes[0].starts_with("Verification restricted until"));
        assert!(render_markdown(&summary).contains("- Nothing left today"));
    }

    #[test]
    fn minutes_format() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(125), "2h 5m");
    }
}
