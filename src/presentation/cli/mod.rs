pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pressflow")]
#[command(version = "0.1.0")]
#[command(about = "Production workflow scheduler for print shop operations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Start the scheduling API server")]
    Serve {
        #[arg(long, help = "Bind address (overrides PRESSFLOW_HOST)")]
        host: Option<String>,

        #[arg(long, help = "Port (overrides PRESSFLOW_PORT)")]
        port: Option<u16>,

        #[arg(short, long, value_name = "FILE", help = "SQLite database path")]
        database: Option<PathBuf>,
    },

    #[command(about = "Create the scheduler database schema")]
    InitDb {
        #[arg(short, long, value_name = "FILE", default_value = "pressflow.db")]
        database: PathBuf,

        #[arg(long, help = "Seed a demo calendar (Mon-Fri shifts, sample holidays)")]
        seed: bool,
    },

    #[command(about = "Schedule one job end to end")]
    Schedule {
        #[arg(short, long, help = "Job id to schedule")]
        job_id: String,

        #[arg(short, long, value_name = "FILE", default_value = "pressflow.db")]
        database: PathBuf,
    },

    #[command(about = "Recompute all schedules from a clean capacity baseline")]
    Recalculate {
        #[arg(long, value_delimiter = ',', help = "Restrict to these job ids")]
        job_ids: Vec<String>,

        #[arg(short, long, value_name = "FILE", default_value = "pressflow.db")]
        database: PathBuf,
    },

    #[command(about = "Recompute tentative due dates for proof-waiting jobs")]
    TentativeDueDates {
        #[arg(short, long, value_name = "FILE", default_value = "pressflow.db")]
        database: PathBuf,
    },
}
