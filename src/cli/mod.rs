pub mod celebrate;
pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "shineup",
    about = "ShineUp: daily wellness tasks with verified completion, streaks and badges"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-time setup
    Init,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
    Status {
        #[arg(long)]
        json: bool,
    },
    Tasks {
        #[arg(long)]
        date: Option<String>,
    },
    /// Record today's visit and generate today's tasks
    Checkin,
    /// Complete a task that needs no verification
    Complete { task_id: String },
    /// Run a verification session for a task
    Verify {
        task_id: String,
        #[arg(long)]
        proof: Option<String>,
        #[arg(long)]
        photo: Option<String>,
    },
    Focus {
        #[arg(long, default_value_t = 25)]
        minutes: u32,
    },
    Spend {
        coins: u32,
    },
    Badges,
    Fitness {
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
