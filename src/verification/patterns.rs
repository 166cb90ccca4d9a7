use crate::verification::HistoryEntry;
use chrono::{DateTime, Duration, Local, Utc};
use std::collections::HashSet;

pub const FLAG_TOO_QUICK: &str = "completed too quickly";
pub const FLAG_RAPID: &str = "multiple rapid task completions";
pub const FLAG_IDENTICAL: &str = "identical completion times detected";
pub const FLAG_HIGH_DAILY: &str = "unusually high daily task completion";

const RAPID_WINDOW_MINUTES: i64 = 5;
const RAPID_LIMIT: usize = 3;
const IDENTICAL_SAMPLE: usize = 5;
const IDENTICAL_MIN_SAMPLES: usize = 3;
const DAILY_LIMIT: usize = 20;

/// Flags raised by the current state of an attempt and the completion history.
///
/// `history` is newest first, the order the history store keeps it in.
pub fn detect(
    history: &[HistoryEntry],
    started_at: DateTime<Utc>,
    min_duration: u64,
    now: DateTime<Utc>,
) -> Vec<&'static str> {
    let elapsed = (now - started_at).num_milliseconds() as f64 / 1000.0;
    let too_quick = (elapsed < min_duration as f64 * 0.3).then_some(FLAG_TOO_QUICK);

    let window_start = now - Duration::minutes(RAPID_WINDOW_MINUTES);
    let rapid = (history
        .iter()
        .filter(|entry| entry.completed_at > window_start && entry.completed_at <= now)
        .count()
        > RAPID_LIMIT)
        .then_some(FLAG_RAPID);

    let recent_durations = history
        .iter()
        .take(IDENTICAL_SAMPLE)
        .map(|entry| entry.duration_sec)
        .collect::<Vec<_>>();
    let identical = (recent_durations.len() >= IDENTICAL_MIN_SAMPLES
        && recent_durations.iter().collect::<HashSet<_>>().len() == 1)
        .then_some(FLAG_IDENTICAL);

    let today = now.with_timezone(&Local).date_naive();
    let high_daily = (history
        .iter()
        .filter(|entry| entry.completed_at.with_timezone(&Local).date_naive() == today)
        .count()
        > DAILY_LIMIT)
        .then_some(FLAG_HIGH_DAILY);

    [too_quick, rapid, identical, high_daily]
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{FLAG_HIGH_DAILY, FLAG_IDENTICAL, FLAG_RAPID, FLAG_TOO_QUICK, detect};
    use crate::verification::HistoryEntry;
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};

    fn noon() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .single()
            .expect("unambiguous local noon")
            .with_timezone(&Utc)
    }

    fn entry(completed_at: DateTime<Utc>, duration_sec: u64) -> HistoryEntry {
        HistoryEntry {
            task_id: "task_0".to_string(),
            completed_at,
            duration_sec,
            verified: true,
            score: 100,
            penalties: Vec::new(),
        }
    }

    #[test]
    fn quiet_history_raises_nothing() {
        let now = noon();
        let history = vec![
            entry(now - Duration::hours(2), 400),
            entry(now - Duration::hours(3), 320),
        ];
        assert!(detect(&history, now - Duration::seconds(200), 300, now).is_empty());
    }

    #[test]
    fn early_warning_below_thirty_percent() {
        let now = noon();
        assert_eq!(
            detect(&[], now - Duration::seconds(89), 300, now),
            vec![FLAG_TOO_QUICK]
        );
        assert!(detect(&[], now - Duration::seconds(90), 300, now).is_empty());
    }

    #[test]
    fn more_than_three_recent_completions() {
        let now = noon();
        let three = (1..=3)
            .map(|minute| entry(now - Duration::minutes(minute), 100 + minute as u64))
            .collect::<Vec<_>>();
        assert!(detect(&three, now - Duration::seconds(600), 300, now).is_empty());

        let four = (1..=4)
            .map(|minute| entry(now - Duration::minutes(minute), 100 + minute as u64))
            .collect::<Vec<_>>();
        assert_eq!(
            detect(&four, now - Duration::seconds(600), 300, now),
            vec![FLAG_RAPID]
        );
    }

    #[test]
    fn identical_durations_need_three_samples() {
        let now = noon();
        let two = vec![
            entry(now - Duration::hours(1), 300),
            entry(now - Duration::hours(2), 300),
        ];
        assert!(detect(&two, now - Duration::seconds(600), 300, now).is_empty());

        let mut three = two.clone();
        three.push(entry(now - Duration::hours(3), 300));
        assert_eq!(
            detect(&three, now - Duration::seconds(600), 300, now),
            vec![FLAG_IDENTICAL]
        );

        // Only the five newest entries are compared.
        let mut varied = three.clone();
        varied.extend([
            entry(now - Duration::hours(4), 300),
            entry(now - Duration::hours(5), 300),
            entry(now - Duration::hours(6), 999),
        ]);
        assert_eq!(
            detect(&varied, now - Duration::seconds(600), 300, now),
            vec![FLAG_IDENTICAL]
        );
    }

    #[test]
    fn high_daily_volume() {
        let now = noon();
        let history = (0..21)
            .map(|index| entry(now - Duration::minutes(10 + index * 10), 200 + index as u64))
            .collect::<Vec<_>>();
        assert_eq!(
            detect(&history, now - Duration::seconds(600), 300, now),
            vec![FLAG_HIGH_DAILY]
        );
        assert!(detect(&history[..20], now - Duration::seconds(600), 300, now).is_empty());
    }
}
