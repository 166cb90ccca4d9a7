use crate::catalog::TaskCategory;

const PROOF_KEYWORDS: [&str; 8] = [
    "workout",
    "exercise",
    "meal prep",
    "cook at home",
    "nature walk",
    "meditation",
    "gratitude journal",
    "learn something new",
];

// Checked in order, first hit wins.
const DURATION_HINTS: [(&[&str], u64); 4] = [
    (&["45-minute", "45 minute"], 2700),
    (&["30-minute", "30 minute"], 1800),
    (&["15-minute", "15 minute"], 900),
    (&["2 hours", "2-hour"], 7200),
];

/// Minimum plausible seconds for a task, before any hint in `text` overrides it.
pub fn category_minimum(category: TaskCategory) -> u64 {
    match category {
        TaskCategory::Fitness => 600,
        TaskCategory::Mindfulness => 300,
        TaskCategory::Nutrition => 120,
        TaskCategory::Productivity => 900,
        TaskCategory::Team => 180,
    }
}

pub fn minimum_duration(category: TaskCategory, text: &str) -> u64 {
    DURATION_HINTS
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| text.contains(needle)))
        .map(|(_, seconds)| *seconds)
        .unwrap_or_else(|| category_minimum(category))
}

/// Case-sensitive, like the duration hints: "Meditation Session" needs no
/// proof, "guided meditation" does.
pub fn requires_proof(title: &str) -> bool {
    PROOF_KEYWORDS.iter().any(|keyword| title.contains(keyword))
}

pub fn is_outdoor(title: &str) -> bool {
    let lowered = title.to_lowercase();
    lowered.contains("nature") || lowered.contains("walk")
}
