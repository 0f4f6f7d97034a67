mod config;
mod interactive;
mod path_utils;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use ghmacros_protocol::ErrorCode;
use ghmacros_protocol::UsageTrigger;
use ghmacros_search::HttpCatalog;
use ghmacros_search::JsonFileStore;
use ghmacros_search::MacroCatalog;
use ghmacros_search::expansion::expand_pattern;
use ghmacros_search::expansion::pattern_name_before_cursor;
use ghmacros_search::validate::Validation;
use ghmacros_search::validate::is_github_media_link;
use ghmacros_search::validate::validate_new_macro;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigKey;
use crate::config::ConfigStore;
use crate::config::MacrosConfig;
use crate::path_utils::display_with_tilde;
use crate::path_utils::expand_tilde;

#[derive(Parser, Debug)]
#[command(version, about = "Search and insert github-macros from the terminal")]
struct Cli {
    /// Catalog endpoint; overrides `endpoint` in config.toml.
    #[arg(long, env = "GHMACROS_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Directory holding config.toml and state.json.
    #[arg(long, env = "GHMACROS_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Search the catalog and print one page of results.
    Search {
        text: String,
        /// 0-based page index.
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Print one page of suggestions.
    Suggest {
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Look up a macro by exact name.
    Get { name: String },
    /// Replace every `$name$` pattern in TEXT with macro markup.
    Expand { text: String },
    /// Add a new macro to the catalog.
    Add { name: String, url: String },
    /// Report a macro whose image no longer loads.
    Report { name: String },
    /// Set a value in config.toml.
    Config { key: ConfigKey, value: String },
    /// Search interactively; type `:help` once started.
    Interactive,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state_dir = match &cli.state_dir {
        Some(dir) => expand_tilde(dir),
        None => {
            let Some(home) = dirs::home_dir() else {
                anyhow::bail!("cannot determine home directory; pass --state-dir");
            };
            config::default_state_dir(&home)
        }
    };
    let config_store = ConfigStore::new(state_dir.join("config.toml"));

    if let CliCommand::Config { key, value } = &cli.command {
        config_store.set(*key, value)?;
        println!(
            "{} = {value} ({})",
            key.as_str(),
            display_with_tilde(config_store.path())
        );
        return Ok(());
    }

    let mut config = config_store.load()?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    let catalog = HttpCatalog::new(&config.endpoint)
        .with_context(|| format!("invalid endpoint {}", config.endpoint))?;

    match cli.command {
        CliCommand::Search { text, page } => print_page(&catalog, &text, page).await,
        CliCommand::Suggest { page } => print_page(&catalog, "", page).await,
        CliCommand::Get { name } => {
            let items = catalog.get(&name).await?;
            if items.is_empty() {
                println!("no macro named {name:?}");
            } else {
                println!("{}", render::format_items(&items));
            }
            Ok(())
        }
        CliCommand::Expand { text } => {
            println!("{}", expand_all(&catalog, text).await?);
            Ok(())
        }
        CliCommand::Add { name, url } => add_macro(&catalog, &name, &url).await,
        CliCommand::Report { name } => {
            catalog.report_broken(&name).await?;
            println!("reported {name}");
            Ok(())
        }
        CliCommand::Config { .. } => Ok(()),
        CliCommand::Interactive => run_interactive(catalog, &state_dir, &config).await,
    }
}

async fn print_page(catalog: &HttpCatalog, text: &str, page: u32) -> anyhow::Result<()> {
    let fetched = catalog.search(text, page).await?;
    println!("{}", render::format_page(text, page, &fetched));
    Ok(())
}

/// Expand `$name$` patterns left to right, looking each name up once.
async fn expand_all(catalog: &impl MacroCatalog, mut text: String) -> anyhow::Result<String> {
    let mut tried = std::collections::HashSet::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('$') {
        let cursor = search_from + offset + 1;
        search_from = cursor;
        let Some(name) = pattern_name_before_cursor(&text, cursor).map(str::to_string) else {
            continue;
        };
        if !tried.insert(name.clone()) {
            continue;
        }
        let Some(item) = catalog.get(&name).await?.into_iter().next() else {
            tracing::warn!("no macro named {name:?}");
            continue;
        };
        let edit = expand_pattern(&text, cursor, &name, &item.url);
        text = edit.text;
        search_from = edit.cursor;
        if let Err(err) = catalog.report_usage(&name, UsageTrigger::Direct).await {
            tracing::debug!("usage report for {name:?} failed: {err}");
        }
    }
    Ok(text)
}

async fn add_macro(catalog: &impl MacroCatalog, name: &str, url: &str) -> anyhow::Result<()> {
    let message = submit_macro(catalog, name, url).await?;
    println!("{message}");
    Ok(())
}

/// Validate and submit a new macro; returns the confirmation line.
///
/// Images hosted elsewhere are not re-uploaded to GitHub first, so
/// `github_url` is always left empty and the server fetches `url` itself.
async fn submit_macro(catalog: &impl MacroCatalog, name: &str, url: &str) -> anyhow::Result<String> {
    if let Validation::Invalid(reason) = validate_new_macro(name, url) {
        anyhow::bail!("{}", reason.user_message());
    }
    if !is_github_media_link(url) {
        tracing::debug!("{url} is not on GitHub's media host; the server may reject it");
    }
    let response = catalog.add(name, url, None).await?;
    if response.code != ErrorCode::Success {
        anyhow::bail!("{}", response.code.user_message());
    }
    Ok(match response.data {
        Some(item) => format!("added {}: {}", item.name, item.markup()),
        None => format!("added {name}"),
    })
}

async fn run_interactive(
    catalog: HttpCatalog,
    state_dir: &std::path::Path,
    config: &MacrosConfig,
) -> anyhow::Result<()> {
    let store = JsonFileStore::in_dir(state_dir);
    let (session, events) = interactive::Session::start(Arc::new(catalog), store, config);
    interactive::run(session, events, tokio::io::stdin(), tokio::io::stdout()).await
}
