//! Hivemind CLI
//!
//! Local entry point for the scrape jobs, vector maintenance and the
//! recommender, all backed by the snapshot store in `--storage-dir`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hivemind::{
    browser::BrowserManager,
    embedding::{EmbeddingService, build_encoder},
    error::{AppError, Result},
    models::Config,
    pipeline::{self, ScrapeOrchestrator},
    services::{
        InterestService, RecommendationEngine, RegistryScraper, ResearchAreaCatalog,
        VectorMaintenanceService,
    },
    storage::{DirectoryStore, LocalStore},
    utils::cancel::CancelSignal,
};
use uuid::Uuid;

/// Hivemind - academic directory scraper and scholar recommender
#[derive(Parser, Debug)]
#[command(
    name = "hivemind",
    version,
    about = "YÖK Akademik directory scraper and scholar recommender"
)]
struct Cli {
    /// Path to storage directory holding config.toml and the snapshot
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape the university list
    Universities,

    /// Scrape department lists of stored universities
    Departments,

    /// Scrape scholar rosters of stored departments
    Scholars {
        /// Embed new or changed scholars while scraping
        #[arg(long)]
        sync_vectors: bool,
    },

    /// Run full pipeline: universities → departments → scholars → vectors
    Pipeline {
        /// Skip the closing vector resync
        #[arg(long)]
        skip_vectors: bool,
    },

    /// Embed scholar profile vectors in batches
    Vectors {
        /// Re-embed every scholar, not only those without a vector
        #[arg(long)]
        force: bool,

        /// Scholars per batch (default: vectors.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Re-embed a single scholar
    Resync { scholar_id: Uuid },

    /// Manage users and their research interests
    Users {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Recalculate a user's recommendations
    Recommend {
        user_id: Uuid,

        /// Number of nearest scholars (default: recommendations.top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List a user's active recommendations
    Recommendations {
        user_id: Uuid,

        #[arg(long, default_value_t = 0)]
        skip: usize,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Dismiss a recommendation
    Dismiss { rec_id: Uuid, user_id: Uuid },

    /// Regenerate every user's vector and recommendations
    RefreshUsers,

    /// List research areas
    Areas {
        /// Case-insensitive filter
        #[arg(long)]
        search: Option<String>,

        /// Show the N most common areas instead
        #[arg(long)]
        top: Option<usize>,
    },

    /// Validate configuration
    Validate,

    /// Show current snapshot info
    Info,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a user
    Create {
        email: String,

        #[arg(long)]
        name: Option<String>,

        /// Initial research interests
        #[arg(long = "interest")]
        interests: Vec<String>,
    },

    /// Change a user's research interests
    Interests {
        #[command(subcommand)]
        command: InterestCommand,
    },
}

#[derive(Subcommand, Debug)]
enum InterestCommand {
    /// Replace the whole list
    Set {
        user_id: Uuid,
        interests: Vec<String>,
    },
    /// Append one interest
    Add { user_id: Uuid, interest: String },
    /// Remove one interest
    Remove { user_id: Uuid, interest: String },
}

/// Which scrape step a browser session runs.
#[derive(Debug, Clone, Copy)]
enum ScrapeStep {
    Universities,
    Departments,
    Scholars { sync_vectors: bool },
    Pipeline { vectors: bool },
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel running jobs on Ctrl-C.
fn install_ctrl_c(cancel: CancelSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received; stopping at the next boundary");
            cancel.cancel();
        }
    });
}

fn embeddings(config: &Config) -> Result<EmbeddingService> {
    Ok(EmbeddingService::new(build_encoder(&config.embedding)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a scrape step inside one browser session; the browser is stopped
/// whatever the outcome.
async fn run_scrape(
    config: Arc<Config>,
    store: Arc<dyn DirectoryStore>,
    cancel: CancelSignal,
    step: ScrapeStep,
) -> Result<()> {
    let vectors = match step {
        ScrapeStep::Scholars { sync_vectors: true } | ScrapeStep::Pipeline { vectors: true } => {
            Some(Arc::new(VectorMaintenanceService::new(
                Arc::clone(&store),
                embeddings(&config)?,
            )))
        }
        _ => None,
    };

    let browser = Arc::new(BrowserManager::new(config.scraper.clone()));
    browser.start().await?;

    let result = async {
        let scraper = RegistryScraper::new(Arc::clone(&config), browser.clone())?;
        let mut orchestrator =
            ScrapeOrchestrator::new(Arc::new(scraper), Arc::clone(&store)).with_cancel(cancel);
        if let (ScrapeStep::Scholars { .. }, Some(vectors)) = (step, &vectors) {
            orchestrator = orchestrator.with_vectors(Arc::clone(vectors));
        }

        match step {
            ScrapeStep::Universities => print_json(&orchestrator.scrape_universities().await?),
            ScrapeStep::Departments => print_json(&orchestrator.scrape_departments().await?),
            ScrapeStep::Scholars { .. } => print_json(&orchestrator.scrape_scholars().await?),
            ScrapeStep::Pipeline { .. } => {
                let report = pipeline::run_pipeline(
                    &orchestrator,
                    vectors.as_deref(),
                    config.vectors.batch_size,
                )
                .await?;
                print_json(&report)
            }
        }
    }
    .await;

    browser.stop().await;
    result
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Hivemind starting...");
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK (scraper, selectors, embedding, vectors, recommendations)");
        return Ok(());
    }
    config.validate()?;

    let config = Arc::new(config);
    let local = Arc::new(LocalStore::open(&cli.storage_dir).await?);
    let store: Arc<dyn DirectoryStore> = local.clone();

    let cancel = CancelSignal::new();
    install_ctrl_c(cancel.clone());

    let catalog = || {
        Arc::new(ResearchAreaCatalog::new(
            Arc::clone(&store),
            config.cache.ttl(),
        ))
    };
    let engine = || -> Result<RecommendationEngine> {
        Ok(RecommendationEngine::new(
            Arc::clone(&store),
            embeddings(&config)?,
            config.recommendations.top_k,
        ))
    };

    match cli.command {
        Command::Universities => {
            run_scrape(config.clone(), store.clone(), cancel, ScrapeStep::Universities).await?
        }
        Command::Departments => {
            run_scrape(config.clone(), store.clone(), cancel, ScrapeStep::Departments).await?
        }
        Command::Scholars { sync_vectors } => {
            run_scrape(
                config.clone(),
                store.clone(),
                cancel,
                ScrapeStep::Scholars { sync_vectors },
            )
            .await?
        }
        Command::Pipeline { skip_vectors } => {
            run_scrape(
                config.clone(),
                store.clone(),
                cancel,
                ScrapeStep::Pipeline {
                    vectors: !skip_vectors,
                },
            )
            .await?
        }

        Command::Vectors { force, batch_size } => {
            let service = VectorMaintenanceService::new(store.clone(), embeddings(&config)?);
            let batch_size = batch_size.unwrap_or(config.vectors.batch_size);
            print_json(&service.resync_all(batch_size, force, &cancel).await?)?;
        }

        Command::Resync { scholar_id } => {
            let service = VectorMaintenanceService::new(store.clone(), embeddings(&config)?);
            match service.resync(scholar_id).await? {
                Some(vector) => log::info!("Scholar {scholar_id}: {} dimensions", vector.len()),
                None => log::info!("Scholar {scholar_id}: no vector written"),
            }
            store.flush().await?;
        }

        Command::Users { command } => {
            let interests = InterestService::new(
                store.clone(),
                catalog(),
                embeddings(&config)?,
                config.recommendations.max_interests,
            );
            let (user_id, user) = match command {
                UserCommand::Create {
                    email,
                    name,
                    interests: initial,
                } => {
                    let user = interests.create_user(&email, name, &initial).await?;
                    (user.id, Some(user))
                }
                UserCommand::Interests { command } => match command {
                    InterestCommand::Set { user_id, interests: list } => {
                        (user_id, interests.set_interests(user_id, &list).await?)
                    }
                    InterestCommand::Add { user_id, interest } => {
                        (user_id, interests.add_interest(user_id, &interest).await?)
                    }
                    InterestCommand::Remove { user_id, interest } => {
                        (user_id, interests.remove_interest(user_id, &interest).await?)
                    }
                },
            };
            let user = user.ok_or_else(|| AppError::not_found("user", user_id))?;
            print_json(&user)?;
        }

        Command::Recommend { user_id, top_k } => {
            let engine = engine()?;
            let outcome = engine
                .recalculate(user_id, top_k.unwrap_or(engine.top_k()))
                .await?;
            log::info!("Recalculation for {user_id}: {outcome:?}");
        }

        Command::Recommendations {
            user_id,
            skip,
            limit,
        } => {
            let views = engine()?.get_recommendations(user_id, skip, limit).await?;
            print_json(&views)?;
        }

        Command::Dismiss { rec_id, user_id } => {
            if engine()?.dismiss(rec_id, user_id).await? {
                log::info!("Recommendation {rec_id} dismissed");
            } else {
                log::warn!("Recommendation {rec_id} not found for user {user_id}");
            }
        }

        Command::RefreshUsers => {
            print_json(&engine()?.refresh_all_users(&cancel).await?)?;
        }

        Command::Areas { search, top } => {
            let catalog = catalog();
            match top {
                Some(limit) => print_json(&catalog.top_areas(limit).await?)?,
                None => print_json(&catalog.unique_areas(search.as_deref()).await?)?,
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            match local.snapshot_path() {
                Some(path) if path.exists() => log::info!("Snapshot: {}", path.display()),
                _ => log::info!("No snapshot found yet."),
            }

            let scholars = store.get_all_scholars().await?;
            let with_vector = scholars.iter().filter(|s| s.profile_vector.is_some()).count();
            log::info!("Universities: {}", store.get_all_universities().await?.len());
            log::info!("Departments: {}", store.get_all_departments().await?.len());
            log::info!("Scholars: {} ({with_vector} with vectors)", scholars.len());
            log::info!("Users: {}", store.get_all_users().await?.len());
            log::info!(
                "Embedding: {:?} backend, model {}",
                config.embedding.backend,
                config.embedding.model
            );
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}
