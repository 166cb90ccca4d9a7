use chrono::{Datelike, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

const COMEBACK_COINS: u32 = 8;
const COMEBACK_SCALE: f64 = 0.6;

static NUMBER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d{3})*").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Fitness,
    Mindfulness,
    Nutrition,
    Productivity,
    Team,
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fitness => "fitness",
            Self::Mindfulness => "mindfulness",
            Self::Nutrition => "nutrition",
            Self::Productivity => "productivity",
            Self::Team => "team",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    pub coins: u32,
    pub completed: bool,
}

impl Task {
    /// Gated tasks go through the verification engine before they are credited.
    pub fn requires_verification(&self) -> bool {
        self.category == TaskCategory::Fitness
            || self.difficulty == Difficulty::Hard
            || self.coins >= 9
    }

    /// Text scanned for duration hints such as "45-minute".
    pub fn hint_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    pub coins: u32,
}

const fn template(
    title: &'static str,
    description: &'static str,
    category: TaskCategory,
    difficulty: Difficulty,
    coins: u32,
) -> TaskTemplate {
    TaskTemplate {
        title,
        description,
        category,
        difficulty,
        coins,
    }
}

use Difficulty::{Easy, Hard};
use TaskCategory::{Fitness, Mindfulness, Nutrition, Productivity, Team};

#[rustfmt::skip]
static TEMPLATES: [TaskTemplate; 22] = [
    template("Healthy Breakfast", "Start your day with a nutritious breakfast including protein and fiber", Nutrition, Easy, 8),
    template("5 Servings of Fruits & Veggies", "Consume at least 5 servings of fruits and vegetables today", Nutrition, Hard, 9),
    template("No Processed Foods", "Avoid processed and packaged foods for the entire day", Nutrition, Hard, 9),
    template("Healthy Snack Choice", "Choose nuts, fruits, or yogurt instead of junk food for snacks", Nutrition, Easy, 8),
    template("Cook at Home", "Prepare at least one healthy meal at home today", Nutrition, Easy, 8),
    template("Team Step Challenge", "Contribute 10,000 steps to your team's daily step goal", Team, Hard, 12),
    template("Team Motivation Post", "Share an encouraging message with your team members", Team, Easy, 10),
    template("Help a Teammate", "Support a team member by commenting on their progress", Team, Easy, 10),
    template("Team Workout Session", "Complete a workout and log it for your team's fitness goal", Team, Hard, 12),
    template("Team Mindfulness", "Join or organize a group meditation session with teammates", Team, Easy, 10),
    template("Morning Stretch", "Complete a 10-minute morning stretching routine", Fitness, Easy, 8),
    template("Hydration Goal", "Drink 8 glasses of water throughout the day", Nutrition, Easy, 8),
    template("Meditation Session", "Complete a 15-minute meditation session", Mindfulness, Easy, 8),
    template("Focus Deep Work", "Complete 2 hours of focused work without distractions", Productivity, Hard, 9),
    template("Workout Challenge", "Complete a 45-minute high-intensity workout", Fitness, Hard, 9),
    template("Mindful Eating", "Practice mindful eating for all three meals today", Nutrition, Hard, 9),
    template("Gratitude Journal", "Write down 5 things you're grateful for today", Mindfulness, Easy, 8),
    template("Digital Detox", "Stay off social media for 4 consecutive hours", Productivity, Hard, 9),
    template("Nature Walk", "Take a 30-minute walk outdoors in nature", Fitness, Easy, 8),
    template("Meal Prep Sunday", "Prepare healthy meals for the upcoming week", Nutrition, Hard, 9),
    template("Sleep Hygiene", "Go to bed at a consistent time and get 7-8 hours of sleep", Mindfulness, Easy, 8),
    template("Learn Something New", "Spend 30 minutes learning a new skill or reading", Productivity, Easy, 8),
];

pub fn templates() -> &'static [TaskTemplate] {
    &TEMPLATES
}

/// Builds the task set for `date`. The same date always yields the same set.
pub fn daily_task_set(date: NaiveDate, count: usize, comeback: bool) -> Vec<Task> {
    let mut shuffled = templates().to_vec();
    let mut rng = StdRng::seed_from_u64(day_seed(date));
    shuffled.shuffle(&mut rng);

    shuffled
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(index, template)| {
            let task = Task {
                id: format!("task_{index}"),
                title: template.title.to_string(),
                description: template.description.to_string(),
                category: template.category,
                difficulty: template.difficulty,
                coins: template.coins,
                completed: false,
            };

            if comeback {
                gentle(task)
            } else {
                task
            }
        })
        .collect()
}

/// Comeback mode softens hard tasks so a returning user can rebuild momentum.
fn gentle(task: Task) -> Task {
    if task.difficulty != Difficulty::Hard {
        return task;
    }

    Task {
        difficulty: Difficulty::Easy,
        coins: COMEBACK_COINS,
        description: scale_numbers(&task.description, COMEBACK_SCALE),
        ..task
    }
}

fn scale_numbers(text: &str, factor: f64) -> String {
    let Some(pattern) = NUMBER_PATTERN.as_ref() else {
        return text.to_string();
    };

    pattern
        .replace_all(text, |captures: &Captures<'_>| {
            let raw = captures[0].replace(',', "");
            raw.parse::<u64>()
                .map(|value| ((value as f64 * factor).floor() as u64).max(1).to_string())
                .unwrap_or_else(|_| captures[0].to_string())
        })
        .into_owned()
}

fn day_seed(date: NaiveDate) -> u64 {
    u64::try_from(date.num_days_from_ce()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{Difficulty, TaskCategory, daily_task_set, scale_numbers, templates};
    use crate::verification::policy::requires_proof;
    use chrono::NaiveDate;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn same_day_yields_same_set() {
        let first = daily_task_set(date("2026-03-10"), 5, false);
        let second = daily_task_set(date("2026-03-10"), 5, false);

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|task| !task.completed));
        assert_eq!(first[0].id, "task_0");
        assert_eq!(first[4].id, "task_4");
    }

    #[test]
    fn comeback_mode_has_no_hard_tasks() {
        let tasks = daily_task_set(date("2026-03-10"), templates().len(), true);

        assert!(tasks.iter().all(|task| task.difficulty == Difficulty::Easy));
        let step_challenge = tasks
            .iter()
            .find(|task| task.title == "Team Step Challenge")
            .expect("full catalog includes step challenge");
        assert_eq!(step_challenge.coins, 8);
        assert!(step_challenge.description.contains("6000 steps"));
    }

    #[test]
    fn scaling_never_drops_below_one() {
        assert_eq!(scale_numbers("Write down 1 thing", 0.6), "Write down 1 thing");
        assert_eq!(scale_numbers("Complete a 45-minute run", 0.6), "Complete a 27-minute run");
    }

    #[test]
    fn gating_rules() {
        let tasks = daily_task_set(date("2026-03-10"), templates().len(), false);
        let by_title = |title: &str| {
            tasks
                .iter()
                .find(|task| task.title == title)
                .expect("task present")
                .clone()
        };

        assert!(by_title("Morning Stretch").requires_verification());
        assert!(by_title("Digital Detox").requires_verification());
        assert!(by_title("Team Motivation Post").requires_verification());
        assert!(!by_title("Healthy Breakfast").requires_verification());
        assert_eq!(by_title("Nature Walk").category, TaskCategory::Fitness);
    }

    #[test]
    fn catalog_titles_pass_the_proof_gate_only_when_lowercased() {
        let gated = templates()
            .iter()
            .filter(|template| requires_proof(template.title))
            .map(|template| template.title)
            .collect::<Vec<_>>();
        assert!(gated.is_empty(), "unexpected proof gate on {gated:?}");

        let lowered = templates()
            .iter()
            .filter(|template| requires_proof(&template.title.to_lowercase()))
            .map(|template| template.title)
            .collect::<Vec<_>>();
        assert_eq!(
            lowered,
            vec![
                "Cook at Home",
                "Team Workout Session",
                "Meditation Session",
                "Workout Challenge",
                "Gratitude Journal",
                "Nature Walk",
                "Meal Prep Sunday",
                "Learn Something New",
            ]
        );
    }
}
