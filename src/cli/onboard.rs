use crate::config::{Config, parse_location};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to ShineUp.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let mut config = Config::load().unwrap_or_default();

    println!("\n[1/4] Daily tasks");
    let daily_task_count: usize = Input::with_theme(&theme)
        .with_prompt("  How many tasks per day? (1-10)")
        .default(config.daily_task_count)
        .validate_with(|input: &usize| -> std::result::Result<(), &str> {
            if (1..=10).contains(input) {
                Ok(())
            } else {
                Err("Pick a number between 1 and 10")
            }
        })
        .interact_text()
        .context("Failed to read daily task count")?;
    config.daily_task_count = daily_task_count;
    config.comeback_task_count = config.comeback_task_count.min(daily_task_count);
    println!("  ✓ {daily_task_count} tasks per day");

    println!("\n[2/4] Location for outdoor tasks");
    println!("  Outdoor tasks sample your location. Without one they are flagged.");
    let location: String = Input::with_theme(&theme)
        .with_prompt("  Location as lat,lng (leave empty to skip)")
        .allow_empty(true)
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() || parse_location(input).is_ok() {
                Ok(())
            } else {
                Err("Use lat,lng (example: 37.5665,126.9780)")
            }
        })
        .interact_text()
        .context("Failed to read location")?;
    config.location = if location.trim().is_empty() {
        None
    } else {
        Some(parse_location(&location)?)
    };
    match config.location {
        Some(point) => println!("  ✓ Location set: {}, {}", point.lat, point.lng),
        None => println!("  ! No location; outdoor tasks will be flagged"),
    }

    println!("\n[3/4] Fitness data");
    config.fitness_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Read steps and activity from Google Fit?")
        .default(config.fitness_enabled)
        .interact()
        .context("Failed to read fitness choice")?;

    if config.fitness_enabled && config.resolve_fitness_token().is_none() {
        let token = Password::with_theme(&theme)
            .with_prompt("  Access token (leave empty to use sample data)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read access token")?;
        config.fitness_access_token = (!token.trim().is_empty()).then(|| token.trim().to_string());
    }
    if config.fitness_enabled && config.resolve_fitness_token().is_none() {
        println!("  ! No token; fitness readings will use sample data");
    } else {
        println!("  ✓ Fitness settings saved");
    }

    println!("\n[4/4] Local storage");
    config.ensure_bootstrap_files()?;
    Database::open(&config.db_path)?;
    config.save()?;
    println!("  ✓ Database ready: {}", config.db_path.display());

    println!("\nSetup complete. Run `shineup checkin` to get today's tasks.");

    Ok(config)
}
