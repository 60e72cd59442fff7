use clap::{Parser, Subcommand};

use crate::controller::DisplayState;
use crate::display::render_text;
use crate::identity::{identity_from_args, identity_from_pairs, identity_from_query};
use crate::state::{config_path, AppState};
use crate::types::Config;

#[derive(Parser)]
#[command(name = "subtrack", version, about = "See your recurring charges")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show recurring charges, linking a bank first if needed
    Show {
        /// Host parameters such as `userId=u1`
        params: Vec<String>,
        #[arg(long = "user-id")]
        user_id: Option<String>,
        /// Query string such as `?userId=u1`
        #[arg(long)]
        query: Option<String>,
        /// Open the bank-link page when no data is available yet
        #[arg(long)]
        link: bool,
        #[arg(long)]
        json: bool,
    },
    /// Exchange a one-time credential from a completed link flow
    Link {
        #[arg(long = "user-id")]
        user_id: String,
        #[arg(long = "public-token")]
        public_token: String,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Identity from `--user-id`, then `--query`, then positional params.
pub fn resolve_identity(
    user_id: Option<&str>,
    query: Option<&str>,
    params: &[String],
) -> Option<String> {
    user_id
        .and_then(|id| identity_from_pairs([("userId", id)]))
        .or_else(|| query.and_then(identity_from_query))
        .or_else(|| identity_from_args(params))
}

pub async fn show(
    state: &mut AppState,
    identity: Option<String>,
    link: bool,
    json: bool,
) -> Result<(), String> {
    let mut view = state.controller.activate(identity.as_deref()).await;

    if link && matches!(view, DisplayState::NeedsLink(_)) {
        let launcher = state.link_launcher();
        view = state.controller.complete_link(&launcher).await;
    }

    print_view(&view, state.controller.notice(), json)
}

pub async fn link(
    state: &mut AppState,
    user_id: &str,
    public_token: &str,
    json: bool,
) -> Result<(), String> {
    if !state.controller.set_identity(user_id.trim()) {
        return Err("--user-id must not be blank".to_string());
    }
    let view = state.controller.submit_credential(public_token).await;
    print_view(&view, state.controller.notice(), json)
}

pub fn show_config(config: &Config) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("# {}", config_path().display());
    println!("{}", json);
    Ok(())
}

fn print_view(view: &DisplayState, notice: Option<&str>, json: bool) -> Result<(), String> {
    if json {
        let out = serde_json::to_string_pretty(view)
            .map_err(|e| format!("Failed to serialize view: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", render_text(view));
    // A stale list outranks the message; still tell the user.
    if let (DisplayState::Ready(_), Some(notice)) = (view, notice) {
        eprintln!("{}", notice);
    }
    if let DisplayState::NeedsLink(_) = view {
        eprintln!("Run again with --link to connect your bank.");
    }
    Ok(())
}
