//! Fitness-sample provider. Optional: when it cannot answer, a synthetic
//! sample marked as such is used instead so verification never blocks on it.

pub mod google_fit;

pub use google_fit::GoogleFitClient;

use anyhow::Result;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitnessSample {
    pub steps: u64,
    pub calories: f64,
    pub active_minutes: u64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessReading {
    pub sample: FitnessSample,
    pub synthetic: bool,
}

pub trait FitnessProvider {
    fn fetch_today_sample(&self, date: NaiveDate) -> Result<FitnessSample>;
}

/// Used when the provider is switched off in config.
#[derive(Debug, Default)]
pub struct DisabledProvider;

impl FitnessProvider for DisabledProvider {
    fn fetch_today_sample(&self, _date: NaiveDate) -> Result<FitnessSample> {
        anyhow::bail!("fitness provider disabled")
    }
}

pub fn fetch_or_synthetic(provider: &dyn FitnessProvider, date: NaiveDate) -> FitnessReading {
    match provider.fetch_today_sample(date) {
        Ok(sample) => FitnessReading {
            sample,
            synthetic: false,
        },
        Err(error) => {
            warn!(error = %error, "fitness provider unavailable, using synthetic sample");
            FitnessReading {
                sample: synthetic_sample(&mut rand::thread_rng()),
                synthetic: true,
            }
        }
    }
}

pub fn synthetic_sample(rng: &mut impl Rng) -> FitnessSample {
    FitnessSample {
        steps: rng.gen_range(3000..8000),
        calories: f64::from(rng.gen_range(200_u32..500)),
        active_minutes: rng.gen_range(30..90),
        distance: f64::from(rng.gen_range(2_u32..5)),
    }
}

/// Advisory check of a fitness task title against the day's activity.
/// Shown next to the verdict, never folded into the score.
pub fn corroborates(title: &str, sample: &FitnessSample) -> bool {
    match title.trim().to_lowercase().as_str() {
        "morning stretch" => sample.active_minutes >= 10,
        "workout challenge" => sample.calories >= 200.0 && sample.active_minutes >= 30,
        "daily steps" => sample.steps >= 8000,
        "cardio session" => sample.calories >= 150.0 && sample.active_minutes >= 20,
        _ => sample.active_minutes >= 5 || sample.calories >= 50.0,
    }
}
