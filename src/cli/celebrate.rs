use crate::tracker::{ProgressEvent, ProgressListener};
use tracing::info;

/// Prints progress events as they happen.
#[derive(Debug, Default)]
pub struct ConsoleCelebrations;

impl ProgressListener for ConsoleCelebrations {
    fn on_event(&mut self, event: &ProgressEvent) {
        println!("{}", describe(event));
        if let ProgressEvent::BadgeEarned(badge) = event {
            info!(badge_id = %badge.id, "celebration shown");
        }
    }
}

pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::TaskCredited {
            task_id,
            coins,
            balance,
        } => format!("+{coins} coins for {task_id} (balance {balance})"),
        ProgressEvent::AllTasksComplete { date } => {
            format!("All tasks complete for {date}!")
        }
        ProgressEvent::PenaltiesApplied {
            penalties,
            coins_deducted,
            strikes,
            restricted,
        } => {
            let mut line = format!(
                "Verification failed: -{coins_deducted} coins, strike {strikes}/3 ({})",
                penalties.join(", ")
            );
            if *restricted {
                line.push_str(". Verification is restricted for 24 hours.");
            }
            line
        }
        ProgressEvent::StreakUpdated { streak, longest } => {
            format!("Streak: {streak} day(s) (longest {longest})")
        }
        ProgressEvent::Comeback { days_away } => {
            format!("Welcome back after {days_away} days. Today's tasks are lighter.")
        }
        ProgressEvent::FocusLogged { minutes, total } => {
            format!("Logged {minutes} focus minute(s), {total} in total")
        }
        ProgressEvent::BadgeEarned(badge) => {
            format!("Badge earned: {} [{}] - {}", badge.name, badge.tier, badge.description)
        }
    }
}
