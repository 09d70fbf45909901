use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use pressflow::presentation::cli::commands::{
    InitDbCommand, RecalculateCommand, ScheduleCommand, TentativeDueDatesCommand,
};
use pressflow::presentation::cli::{Cli, Commands};
use pressflow::web::{start_web_server, WebConfig};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("pressflow=debug,info")
    } else {
        EnvFilter::new("pressflow=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            database,
        } => {
            let mut config = WebConfig::from_env();
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(database) = database {
                config.database_path = database.to_string_lossy().into_owned();
            }
            actix_web::rt::System::new().block_on(start_web_server(config))?;
        }
        Commands::InitDb { database, seed } => {
            InitDbCommand::execute(&database, seed)?;
        }
        Commands::Schedule { job_id, database } => {
            ScheduleCommand::execute(&database, &job_id)?;
        }
        Commands::Recalculate { job_ids, database } => {
            RecalculateCommand::execute(&database, &job_ids)?;
        }
        Commands::TentativeDueDates { database } => {
            TentativeDueDatesCommand::execute(&database)?;
        }
    }

    Ok(())
}
