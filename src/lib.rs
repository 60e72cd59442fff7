pub mod cache;
mod cli;
pub mod controller;
pub mod display;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod link;
pub mod normalizer;
pub mod state;
pub mod types;
pub mod util;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

/// CLI entry point. Returns the process exit code.
pub fn run() -> i32 {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match state::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    if let Commands::Config = cli.command {
        return exit_code(cli::show_config(&config));
    }

    // Single-threaded: one activation, at most one request in flight.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return 1;
        }
    };

    let mut state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Show {
                params,
                user_id,
                query,
                link,
                json,
            } => {
                let identity = cli::resolve_identity(user_id.as_deref(), query.as_deref(), &params);
                cli::show(&mut state, identity, link, json).await
            }
            Commands::Link {
                user_id,
                public_token,
                json,
            } => cli::link(&mut state, &user_id, &public_token, json).await,
            Commands::Config => Ok(()),
        }
    });

    exit_code(result)
}

fn exit_code(result: Result<(), String>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}
