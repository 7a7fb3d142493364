use chrono::{Local, SecondsFormat, Utc};
use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;
use dreamlog::cache::{CacheFilters, ViewCache};
use dreamlog::domain::{Dream, DreamPatch, Mood, NewDream};
use dreamlog::events::EventBus;
use dreamlog::insights::{JournalStats, group_by_month, pick_random};
use dreamlog::store::{DreamRepository, DreamStore, ListOptions, SortOrder};

fn setup_logging(config: &Config) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dreamlog")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("dreamlog.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

struct App {
    store: DreamStore,
    cache: ViewCache,
}

impl App {
    fn open(config: &Config) -> Result<Self> {
        let store = DreamStore::open(&config.database.path)
            .context(format!("Failed to open dream database at {}", config.database.path.display()))?;
        let repo: Arc<dyn DreamRepository> = Arc::new(store.clone());
        let cache = ViewCache::with_page_size(repo, EventBus::new(), config.cache.page_size);
        Ok(Self { store, cache })
    }

    async fn all_dreams(&self) -> Result<Vec<Dream>> {
        let total = self.store.count_dreams(&ListOptions::new()).await?;
        let limit = u32::try_from(total).unwrap_or(u32::MAX).max(1);
        Ok(self.store.list_dreams(&ListOptions::new().limit(limit)).await?)
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Database: {}", config.database.path.display());
    }

    let app = App::open(config)?;

    match &cli.command {
        Commands::Add {
            description,
            title,
            date,
            mood,
            images,
            audio,
            favorite,
        } => {
            let date = date
                .clone()
                .unwrap_or_else(|| Local::now().to_rfc3339_opts(SecondsFormat::Secs, false));
            let mut dream = NewDream::new(description.clone(), date)
                .images(images.clone())
                .favorite(*favorite);
            if let Some(title) = title {
                dream = dream.title(title.clone());
            }
            if let Some(level) = mood {
                dream = dream.mood(Mood::try_from(*level)?);
            }
            if let Some(audio) = audio {
                dream = dream.audio_url(audio.clone());
            }
            handle_add_command(&app, dream).await
        }
        Commands::List {
            search,
            day,
            favorite,
            min_mood,
            max_mood,
            asc,
            page,
        } => {
            let mut filters = CacheFilters::new();
            if let Some(search) = search {
                filters = filters.search(search.clone());
            }
            if let Some(day) = day {
                filters = filters.date(*day);
            }
            if *favorite {
                filters = filters.favorite(true);
            }
            if min_mood.is_some() || max_mood.is_some() {
                let min = Mood::try_from(min_mood.unwrap_or(Mood::MIN_LEVEL))?;
                let max = Mood::try_from(max_mood.unwrap_or(Mood::MAX_LEVEL))?;
                filters = filters.mood_range(min, max);
            }
            if *asc {
                filters = filters.sort_order(SortOrder::Asc);
            }
            handle_list_command(&app, filters, *page).await
        }
        Commands::Show { id } => handle_show_command(&app, id).await,
        Commands::Edit {
            id,
            title,
            clear_title,
            description,
            date,
            mood,
            clear_mood,
            images,
            audio,
        } => {
            let mut patch = DreamPatch::new();
            if *clear_title {
                patch = patch.title(None);
            } else if let Some(title) = title {
                patch = patch.title(Some(title.clone()));
            }
            if let Some(description) = description {
                patch = patch.description(description.clone());
            }
            if let Some(date) = date {
                patch = patch.date(date.clone());
            }
            if *clear_mood {
                patch = patch.mood(None);
            } else if let Some(level) = mood {
                patch = patch.mood(Some(Mood::try_from(*level)?));
            }
            if let Some(images) = images {
                patch = patch.images(images.clone());
            }
            if let Some(audio) = audio {
                patch = patch.audio_url(Some(audio.clone()));
            }
            handle_edit_command(&app, id, patch).await
        }
        Commands::Favorite { id } => handle_favorite_command(&app, id).await,
        Commands::Delete { id } => handle_delete_command(&app, id).await,
        Commands::Dates => handle_dates_command(&app).await,
        Commands::Months => handle_months_command(&app).await,
        Commands::Stats => handle_stats_command(&app).await,
        Commands::Random => handle_random_command(&app).await,
    }
}

fn print_summary(dream: &Dream) {
    let day = dream.day().map(|d| d.to_string()).unwrap_or_else(|| dream.date.clone());
    let mood = dream.mood.map(|m| m.emoji()).unwrap_or(" ");
    let star = if dream.favorite { "★".yellow() } else { " ".normal() };
    println!(
        "{} {} {} {}  {}",
        day.cyan(),
        mood,
        star,
        dream.display_title(),
        dream.id.dimmed()
    );
}

fn print_detail(dream: &Dream) {
    println!("{} {}", "Dream:".green(), dream.id);
    if let Some(title) = &dream.title {
        println!("  Title: {}", title.bold());
    }
    println!("  Date: {}", dream.date);
    if let Some(mood) = dream.mood {
        println!("  Mood: {} ({})", mood, mood.description());
    }
    if dream.favorite {
        println!("  {}", "Favorite".yellow());
    }
    for image in &dream.images {
        println!("  Image: {}", image);
    }
    if let Some(audio) = &dream.audio_url {
        println!("  Audio: {}", audio);
    }
    println!("  Created: {}  Updated: {}", dream.created_at.dimmed(), dream.updated_at.dimmed());
    println!();
    println!("{}", dream.description);
}

async fn handle_add_command(app: &App, dream: NewDream) -> Result<()> {
    info!("Adding dream {}", dream.id);
    let created = app.cache.create_dream(dream).await.context("Failed to save dream")?;
    println!("{} {}", "Saved:".green(), created.id);
    Ok(())
}

async fn handle_list_command(app: &App, filters: CacheFilters, page: u32) -> Result<()> {
    info!("Listing dreams with {:?} (page {})", filters, page);
    let page = page.max(1);

    app.cache.refresh(filters).await;
    for _ in 1..page {
        if !app.cache.load_next_page().await {
            break;
        }
    }

    let snapshot = app.cache.snapshot();
    if let Some(e) = snapshot.error {
        return Err(eyre!("Failed to list dreams: {}", e));
    }

    let page_size = app.cache.page_size() as usize;
    let start = (page as usize - 1) * page_size;
    let shown: Vec<&Dream> = snapshot.items.iter().skip(start).collect();
    if shown.is_empty() {
        println!("{}", "No dreams found".yellow());
        return Ok(());
    }
    for dream in shown {
        print_summary(dream);
    }
    if snapshot.has_more {
        println!("{}", format!("More on page {}", snapshot.current_page + 1).dimmed());
    }
    Ok(())
}

async fn handle_show_command(app: &App, id: &str) -> Result<()> {
    info!("Showing dream {}", id);
    match app.store.get_dream_by_id(id).await? {
        Some(dream) => print_detail(&dream),
        None => println!("{} {}", "Not found:".red(), id),
    }
    Ok(())
}

async fn handle_edit_command(app: &App, id: &str, patch: DreamPatch) -> Result<()> {
    info!("Editing dream {}: {:?}", id, patch);
    if patch.is_empty() {
        println!("{}", "Nothing to change".yellow());
        return Ok(());
    }
    app.cache
        .update_dream(id, patch)
        .await
        .context(format!("Failed to update dream {}", id))?;
    println!("{} {}", "Updated:".green(), id);
    Ok(())
}

async fn handle_favorite_command(app: &App, id: &str) -> Result<()> {
    info!("Toggling favorite on {}", id);
    let favorite = app
        .cache
        .toggle_favorite(id)
        .await
        .context(format!("Failed to toggle favorite on {}", id))?;
    if favorite {
        println!("{} {}", "★ Favorited:".yellow(), id);
    } else {
        println!("{} {}", "Unfavorited:".normal(), id);
    }
    Ok(())
}

async fn handle_delete_command(app: &App, id: &str) -> Result<()> {
    info!("Deleting dream {}", id);
    app.cache
        .delete_dream(id)
        .await
        .context(format!("Failed to delete dream {}", id))?;
    println!("{} {}", "Deleted:".red(), id);
    Ok(())
}

async fn handle_dates_command(app: &App) -> Result<()> {
    info!("Listing dream dates");
    for date in app.store.list_all_dream_dates().await? {
        println!("{}", date);
    }
    Ok(())
}

async fn handle_months_command(app: &App) -> Result<()> {
    info!("Grouping dreams by month");
    let dreams = app.all_dreams().await?;
    for group in group_by_month(&dreams) {
        println!("{} ({})", group.label().green().bold(), group.dreams.len());
        for dream in &group.dreams {
            print_summary(dream);
        }
    }
    Ok(())
}

async fn handle_stats_command(app: &App) -> Result<()> {
    info!("Computing journal stats");
    let dreams = app.all_dreams().await?;
    let stats = JournalStats::compute(&dreams, Utc::now());

    println!("{} {}", "Dreams:".green(), stats.total);
    println!("{} {}", "Last 7 days:".green(), stats.last_week);
    match stats.average_mood {
        Some(mood) => println!("{} {}", "Average mood:".green(), mood),
        None => println!("{} -", "Average mood:".green()),
    }
    println!("{} {} day(s)", "Streak:".green(), stats.streak);
    if let Some(id) = stats.most_recent_id {
        println!("{} {}", "Most recent:".green(), id);
    }
    Ok(())
}

async fn handle_random_command(app: &App) -> Result<()> {
    info!("Picking a random dream");
    let dreams = app.all_dreams().await?;
    match pick_random(&dreams) {
        Some(dream) => print_detail(dream),
        None => println!("{}", "No dreams found".yellow()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
