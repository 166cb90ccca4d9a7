mod badges;
mod catalog;
mod cli;
mod collector;
mod config;
mod db;
mod fitness;
mod progression;
mod session;
mod summary;
mod tracker;
mod verification;

use crate::badges::{definitions, display_order};
use crate::cli::celebrate::ConsoleCelebrations;
use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::collector::{ConfiguredLocation, IioMotionSensor, MotionSampler, NoMotionSensor};
use crate::config::Config;
use crate::db::{Database, HistoryStore, TaskStore};
use crate::fitness::{DisabledProvider, FitnessProvider, GoogleFitClient};
use crate::session::{ProofInput, SessionOutcome, SessionSensors, SessionSettings};
use crate::tracker::{TaskCounts, Tracker};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor(),
        Commands::Status { json } => handle_status(json),
        Commands::Tasks { date } => handle_tasks(date),
        Commands::Checkin => handle_checkin(),
        Commands::Complete { task_id } => handle_complete(&task_id),
        Commands::Verify {
            task_id,
            proof,
            photo,
        } => handle_verify(&task_id, ProofInput { text: proof, photo }).await,
        Commands::Focus { minutes } => handle_focus(minutes).await,
        Commands::Spend { coins } => handle_spend(coins),
        Commands::Badges => handle_badges(),
        Commands::Fitness { date } => handle_fitness(date),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("token") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(database) => {
            println!("[OK] SQLite reachable: {}", config.db_path.display());
            let today = Local::now().date_naive();
            println!("[OK] task sets stored: {} day(s)", database.task_dates().len());
            if database.load_tasks(today).is_some() {
                println!("[OK] today's tasks generated");
            } else {
                println!("[WARN] no tasks for today; run `shineup checkin`");
                issues.push("no tasks today".to_string());
            }
        }
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.location.is_some() {
        println!("[OK] location configured for outdoor tasks");
    } else {
        println!("[WARN] location not set; outdoor tasks will be flagged");
        issues.push("location missing".to_string());
    }

    if config.fitness_enabled {
        if config.resolve_fitness_token().is_some() {
            println!("[OK] fitness access token is configured");
        } else {
            println!("[WARN] fitness is enabled but no access token is set; sample data will be used");
            issues.push("fitness token missing".to_string());
        }
    } else {
        println!("[OK] fitness provider disabled");
    }

    match IioMotionSensor::detect() {
        Some(sensor) => println!("[OK] accelerometer found: {}", sensor.device().display()),
        None => {
            println!("[WARN] no accelerometer found; long fitness sessions will be penalized");
            issues.push("motion sensor unavailable".to_string());
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_status(json: bool) -> Result<()> {
    let config = load_config()?;
    let tracker = open_tracker(&config)?;
    let today = Local::now().date_naive();
    let tasks = tracker.store().load_tasks(today).unwrap_or_default();

    let summary = summary::build_day_summary(
        today,
        &tracker.progress(),
        &tasks,
        &tracker.store().load_history(),
        &tracker.earned_badges(),
        Utc::now(),
    );

    if json {
        let content =
            serde_json::to_string_pretty(&summary).context("Failed to serialize status")?;
        println!("{content}");
    } else {
        print!("{}", summary::render_markdown(&summary));
    }

    Ok(())
}

fn handle_tasks(date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let target_date = parse_optional_date(date)?;

    let Some(tasks) = database.load_tasks(target_date) else {
        println!("No tasks for {target_date}. Run `shineup checkin` first.");
        return Ok(());
    };

    println!("Tasks for {target_date}");
    tasks.iter().for_each(|task| {
        let mark = if task.completed { "x" } else { " " };
        let gate = if task.requires_verification() {
            " (verify)"
        } else {
            ""
        };
        println!(
            "[{mark}] {} {} - {} coins, {}{gate}",
            task.id, task.title, task.coins, task.category
        );
        println!("      {}", task.description);
    });

    Ok(())
}

fn handle_checkin() -> Result<()> {
    let config = load_config()?;
    let mut tracker = open_tracker(&config)?;
    let today = Local::now().date_naive();

    let tasks = tracker.check_in(
        today,
        TaskCounts {
            daily: config.daily_task_count,
            comeback: config.comeback_task_count,
        },
        Utc::now(),
    )?;

    let open = tasks.iter().filter(|task| !task.completed).count();
    println!("{open} of {} task(s) open today. Run `shineup tasks` to see them.", tasks.len());

    Ok(())
}

fn handle_complete(task_id: &str) -> Result<()> {
    let config = load_config()?;
    let mut tracker = open_tracker(&config)?;
    let today = Local::now().date_naive();

    let events = tracker.complete_unverified_task(today, task_id, Utc::now())?;
    if events.is_empty() {
        println!("Task {task_id} was already completed");
    }

    Ok(())
}

async fn handle_verify(task_id: &str, proof: ProofInput) -> Result<()> {
    let config = load_config()?;
    let mut tracker = open_tracker(&config)?;
    let today = Local::now().date_naive();
    let task = tracker.task(today, task_id)?;

    let mut location = ConfiguredLocation::new(config.location);
    let mut motion = motion_sensor();
    let outcome = session::run_verification_session(
        &mut tracker,
        today,
        task_id,
        proof,
        SessionSensors {
            location: &mut location,
            motion: motion.as_mut(),
        },
        SessionSettings::from_config(&config),
        BufReader::new(tokio::io::stdin()),
    )
    .await?;

    let verdict = match outcome {
        SessionOutcome::Finished { verdict, events } => {
            info!(task_id, events = events.len(), "session finished");
            verdict
        }
        SessionOutcome::Abandoned => {
            println!("Verification abandoned. {task_id} stays open.");
            return Ok(());
        }
    };

    println!(
        "Verdict: {} (score {}, {}s)",
        if verdict.verified { "verified" } else { "rejected" },
        verdict.score,
        verdict.duration_sec
    );
    verdict
        .penalties
        .iter()
        .for_each(|penalty| println!("- {penalty}"));

    if task.category == catalog::TaskCategory::Fitness {
        let provider = fitness_provider(&config);
        let reading = fitness::fetch_or_synthetic(provider.as_ref(), today);
        let agrees = fitness::corroborates(&task.title, &reading.sample);
        println!(
            "Fitness data {}: {} steps, {} active min{}",
            if agrees { "agrees" } else { "does not agree" },
            reading.sample.steps,
            reading.sample.active_minutes,
            if reading.synthetic { " (sample data)" } else { "" }
        );
    }

    Ok(())
}

async fn handle_focus(minutes: u32) -> Result<()> {
    let config = load_config()?;
    let mut tracker = open_tracker(&config)?;

    println!("Focus for {minutes} minute(s). Ctrl+C stops without credit.");
    if session::run_focus_timer(&mut tracker, minutes).await?.is_none() {
        println!("Focus session abandoned");
    }

    Ok(())
}

fn handle_spend(coins: u32) -> Result<()> {
    let config = load_config()?;
    let tracker = open_tracker(&config)?;

    let balance = tracker.ledger().spend_coins(coins)?;
    info!(coins, balance, "coins spent");
    println!("Spent {coins} coins. Balance: {balance}");

    Ok(())
}

fn handle_badges() -> Result<()> {
    let config = load_config()?;
    let tracker = open_tracker(&config)?;
    let progress = tracker.progress();
    let earned = display_order(tracker.earned_badges());

    println!("Earned ({})", earned.len());
    earned.iter().for_each(|badge| {
        println!(
            "- {} [{}] {} ({})",
            badge.name,
            badge.tier,
            badge.description,
            badge.earned_at.with_timezone(&Local).format("%Y-%m-%d")
        );
    });

    println!("Locked");
    definitions()
        .iter()
        .filter(|definition| earned.iter().all(|badge| badge.id != definition.id))
        .for_each(|definition| {
            let requirement = definition.requirement;
            println!(
                "- {} [{}] {}: {}/{}",
                definition.name,
                definition.tier,
                definition.description,
                requirement.current(&progress).min(requirement.threshold()),
                requirement.threshold()
            );
        });

    Ok(())
}

fn handle_fitness(date: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let target_date = parse_optional_date(date)?;
    let provider = fitness_provider(&config);
    let reading = fitness::fetch_or_synthetic(provider.as_ref(), target_date);

    println!(
        "Fitness for {target_date}{}",
        if reading.synthetic { " (sample data)" } else { "" }
    );
    println!("- steps: {}", reading.sample.steps);
    println!("- calories: {:.0}", reading.sample.calories);
    println!("- active minutes: {}", reading.sample.active_minutes);
    println!("- distance: {:.1}", reading.sample.distance);

    Ok(())
}

fn open_tracker(config: &Config) -> Result<Tracker<Database>> {
    let database = Database::open(&config.db_path)?;
    let mut tracker = Tracker::new(database);
    tracker.subscribe(Box::new(ConsoleCelebrations));
    Ok(tracker)
}

fn motion_sensor() -> Box<dyn MotionSampler> {
    match IioMotionSensor::detect() {
        Some(sensor) => Box::new(sensor),
        None => Box::new(NoMotionSensor),
    }
}

fn fitness_provider(config: &Config) -> Box<dyn FitnessProvider> {
    if config.fitness_enabled {
        Box::new(GoogleFitClient::from_config(config))
    } else {
        Box::new(DisabledProvider)
    }
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-03-10"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| "Config file not found. Run `shineup init` first.".to_string())
}
