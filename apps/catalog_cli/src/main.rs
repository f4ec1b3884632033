use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    config::DEFAULT_SETTINGS_FILE, load_settings, ClientSettings, DetailLoader,
    HttpCatalogSource, ItemProfile, ListController, ListSnapshot, PageLoad,
};
use futures::StreamExt;
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(about = "Browse, search and inspect the public catalog")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    page_size: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
struct LoadArgs {
    /// Pages to load; stops early at the end of the catalog.
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Retries for a page that failed to load.
    #[arg(long, default_value_t = 2)]
    retries: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    Browse {
        #[command(flatten)]
        load: LoadArgs,
    },
    Search {
        query: String,
        #[command(flatten)]
        load: LoadArgs,
    },
    Show {
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    let source = Arc::new(HttpCatalogSource::new(&settings.api_base_url)?);

    match cli.command {
        Command::Browse { load } => {
            let controller = ListController::new(source, &settings);
            load_pages(&controller, load).await;
            print_items(&controller.snapshot());
        }
        Command::Search { query, load } => {
            let controller = ListController::new(source, &settings);
            load_pages(&controller, load).await;
            controller.search(&query);
            let snapshot = controller.snapshot();
            if snapshot.is_empty_search_result() {
                println!("no matches for '{query}'");
            } else {
                print_items(&snapshot);
            }
        }
        Command::Show { name } => {
            let loader = DetailLoader::new(source, &settings);
            let profile = loader
                .load(&name)
                .await
                .with_context(|| format!("could not show '{name}'"))?;
            print_profile(&profile);
        }
    }

    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = load_settings(&cli.config)
        .with_context(|| format!("failed to load settings from '{}'", cli.config.display()))?;
    if let Some(url) = &cli.api_base_url {
        settings.api_base_url = url.clone();
    }
    if let Some(page_size) = cli.page_size {
        settings.page_size = page_size;
    }
    Ok(settings.normalized()?)
}

async fn load_pages(controller: &ListController, load: LoadArgs) {
    let (done, finished) = oneshot::channel();
    let follower = follow_snapshots(controller, finished);
    let mut loaded = 0;
    let mut failures = 0;

    while loaded < load.pages {
        match controller.load_next_page().await {
            Ok(PageLoad::Appended { .. }) => {
                loaded += 1;
                failures = 0;
            }
            Ok(PageLoad::Skipped) => break,
            Err(error) => {
                failures += 1;
                if failures > load.retries {
                    warn!(%error, attempts = failures, "giving up on page");
                    break;
                }
                warn!(%error, attempt = failures, "retrying page");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    let _ = done.send(controller.snapshot());
    if let Err(error) = follower.await {
        warn!(%error, "snapshot follower failed");
    }
}

/// Logs every published snapshot until `finished` delivers the final one,
/// which is logged too unless it was already seen. Returns the last snapshot
/// logged.
fn follow_snapshots(
    controller: &ListController,
    mut finished: oneshot::Receiver<ListSnapshot>,
) -> JoinHandle<Option<ListSnapshot>> {
    let mut updates = WatchStream::new(controller.subscribe());
    tokio::spawn(async move {
        let mut last: Option<ListSnapshot> = None;
        loop {
            tokio::select! {
                update = updates.next() => match update {
                    Some(snapshot) => {
                        log_snapshot(&snapshot);
                        last = Some(snapshot);
                    }
                    None => break,
                },
                final_snapshot = &mut finished => {
                    if let Ok(snapshot) = final_snapshot {
                        if last.as_ref() != Some(&snapshot) {
                            log_snapshot(&snapshot);
                            last = Some(snapshot);
                        }
                    }
                    break;
                }
            }
        }
        last
    })
}

fn log_snapshot(snapshot: &ListSnapshot) {
    debug!(
        items = snapshot.items.len(),
        loading = snapshot.is_loading,
        end_reached = snapshot.end_reached,
        searching = snapshot.is_search_active,
        error = snapshot.load_error_message(),
        "list updated"
    );
}

fn print_items(snapshot: &ListSnapshot) {
    for item in &snapshot.items {
        println!(
            "#{:03} {:<16} {}",
            item.id.0, item.display_name, item.image_url
        );
    }

    let suffix = if snapshot.end_reached {
        " (end of catalog)"
    } else {
        ""
    };
    println!("{} items{suffix}", snapshot.items.len());
    if !snapshot.load_error_message().is_empty() {
        eprintln!("last load failed: {}", snapshot.load_error_message());
    }
}

fn print_profile(profile: &ItemProfile) {
    println!("{} {}", profile.display_number, profile.display_name);
    println!("image:   {}", profile.image_url);
    println!("types:   {}", profile.types.join(", "));
    println!(
        "size:    {:.1} m, {:.1} kg",
        profile.height_m, profile.weight_kg
    );
    if let Some(exp) = profile.base_experience {
        println!("base xp: {exp}");
    }

    let abilities: Vec<String> = profile
        .abilities
        .iter()
        .map(|a| {
            if a.is_hidden {
                format!("{} (hidden)", a.name)
            } else {
                a.name.clone()
            }
        })
        .collect();
    println!("abilities: {}", abilities.join(", "));

    for stat in &profile.stats {
        let label = if stat.abbreviation.is_empty() {
            stat.name.as_str()
        } else {
            stat.abbreviation
        };
        let bar = "#".repeat((stat.fill_ratio * 20.0).round() as usize);
        println!("{label:>6} {:>3} {bar}", stat.base_value);
    }

    println!();
    println!("{}", profile.flavor_text);
}
