mod host;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};

use hunt_core::{
    ErrorResilienceManager, GameConfig, GameOrchestrator, GameSettings, LocationSource, MapId,
    TickOutcome, TickReport, TreasureMap, format_distance, load_validated_maps,
};
use hunt_store::{CONFIG_FILE, DATABASE_FILE, MapCatalog, Store, default_base_dir, load_config};

use host::{ConsoleOutput, HostRecovery, SimulatedWalker, TrackLocationSource};

#[derive(Parser)]
#[command(name = "hunt", about = "Offline GPS treasure hunt")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Data directory (overrides HUNT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Map catalog JSON file (defaults to the built-in maps)
    #[arg(long, global = true)]
    maps: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available maps
    Maps,

    /// Replay a recorded GPS track on a map
    Play {
        map: String,

        /// JSON array of {latitude, longitude, accuracy?, heading?} or null
        #[arg(long)]
        track: PathBuf,
    },

    /// Let a simulated walker hunt on a map
    Walk {
        map: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 500)]
        steps: usize,
    },

    /// Show stored progress for a map
    Status { map: String },

    /// Show or update feedback settings
    Settings {
        /// Audio volume, clamped to [0, 1]
        #[arg(long)]
        volume: Option<f64>,

        #[arg(long)]
        audio: Option<Toggle>,

        #[arg(long)]
        haptics: Option<Toggle>,
    },

    /// Delete all stored progress (settings are kept)
    Reset,

    /// Export progress to a JSON file
    Export { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir
        .clone()
        .or_else(|| std::env::var("HUNT_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(default_base_dir)
}

fn open_store(cli: &Cli) -> Result<Store> {
    let path = data_dir(cli).join(DATABASE_FILE);
    Store::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
}

fn open_config(cli: &Cli) -> Result<GameConfig> {
    let path = data_dir(cli).join(CONFIG_FILE);
    load_config(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn load_maps(cli: &Cli) -> Result<Vec<TreasureMap>> {
    let catalog = match &cli.maps {
        Some(path) => MapCatalog::from_file(path)
            .with_context(|| format!("failed to load maps from {}", path.display()))?,
        None => MapCatalog::builtin().context("built-in map catalog is corrupt")?,
    };
    load_validated_maps(&catalog).map_err(|e| anyhow!("{}: {}", e.title(), e.message()))
}

fn find_map(cli: &Cli, id: &str) -> Result<TreasureMap> {
    let id = MapId::new(id);
    load_maps(cli)?
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| anyhow!("no map with id '{id}' (see `hunt maps`)"))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Maps => cmd_maps(&cli),
        Commands::Play { map, track } => cmd_play(&cli, map, track).await,
        Commands::Walk { map, seed, steps } => cmd_walk(&cli, map, *seed, *steps).await,
        Commands::Status { map } => cmd_status(&cli, map),
        Commands::Settings {
            volume,
            audio,
            haptics,
        } => cmd_settings(&cli, *volume, *audio, *haptics),
        Commands::Reset => cmd_reset(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
    }
}

fn cmd_maps(cli: &Cli) -> Result<()> {
    for map in load_maps(cli)? {
        println!(
            "{:<16} {:<20} {:<7} {} treasures, {} pts",
            map.id.as_str(),
            map.name,
            map.difficulty.to_string(),
            map.treasures.len(),
            map.total_points()
        );
    }
    Ok(())
}

fn start_game(cli: &Cli, map: TreasureMap) -> Result<GameOrchestrator> {
    let config = open_config(cli)?;
    let store = open_store(cli)?;
    let resilience =
        ErrorResilienceManager::new(config.resilience.clone(), Arc::new(HostRecovery::default()));
    Ok(GameOrchestrator::start(
        map,
        Box::new(store),
        Box::new(ConsoleOutput::default()),
        resilience,
        config,
    ))
}

async fn cmd_play(cli: &Cli, map_id: &str, track: &Path) -> Result<()> {
    let map = find_map(cli, map_id)?;
    let mut source = TrackLocationSource::from_file(track)?;
    let ticks = source.remaining();
    let mut game = start_game(cli, map)?;
    run(&mut game, &mut source, ticks).await
}

async fn cmd_walk(cli: &Cli, map_id: &str, seed: u64, steps: usize) -> Result<()> {
    let map = find_map(cli, map_id)?;
    let mut walker = SimulatedWalker::new(map.clone(), seed);
    let mut game = start_game(cli, map)?;
    run(&mut game, &mut walker, steps).await
}

async fn run(
    game: &mut GameOrchestrator,
    source: &mut dyn LocationSource,
    ticks: usize,
) -> Result<()> {
    for tick in 1..=ticks {
        let report = game.tick_from(source);
        print_tick(tick, &report);
        for recovery in game.settle_recoveries().await {
            if !recovery.discarded && !recovery.succeeded() {
                tracing::warn!(code = %recovery.code, "recovery failed");
            }
        }
        if matches!(report.outcome, TickOutcome::Completed | TickOutcome::Inactive) {
            break;
        }
    }

    let progress = game.progress();
    if progress.is_complete {
        for e in game.end_session() {
            eprintln!("warning: {}", e.message());
        }
        println!("map complete!");
    }
    println!(
        "score: {}/{} pts, {}/{} treasures ({:.0}%)",
        progress.points,
        progress.total_points,
        progress.discovered,
        progress.total,
        progress.completion_percentage
    );
    Ok(())
}

fn print_tick(tick: usize, report: &TickReport) {
    if let Some(found) = &report.discovery {
        println!(
            "tick {tick}: found {} +{} (total {})",
            found.name, found.points, found.total_points
        );
    }
    match (&report.guidance, report.outcome) {
        (Some(g), _) => println!(
            "tick {tick}: {} {} {} ({}){}",
            g.treasure_name,
            format_distance(g.distance_m),
            g.compass,
            g.intensity.label(),
            if report.used_fallback { " [last known]" } else { "" }
        ),
        (None, TickOutcome::NoFix) => println!("tick {tick}: no fix"),
        _ => {}
    }
    for e in &report.errors {
        tracing::info!(tick, "{}: {}", e.title(), e.recovery_suggestion());
    }
}

fn cmd_status(cli: &Cli, map_id: &str) -> Result<()> {
    let map = find_map(cli, map_id)?;
    let store = open_store(cli)?;
    let Some(session) = store
        .load_session(&map.id)
        .context("failed to load session")?
    else {
        println!("{}: not started", map.name);
        return Ok(());
    };

    let ids = map.treasure_ids();
    println!("map:        {}", map.name);
    println!("session:    {}", session.id);
    println!(
        "state:      {}",
        if session.is_active { "active" } else { "ended" }
    );
    println!(
        "points:     {}/{}",
        session.total_points(),
        map.total_points()
    );
    println!(
        "found:      {}/{} ({:.0}%)",
        session.discovered_count(),
        ids.len(),
        session.completion_percentage(&ids)
    );
    for treasure in &map.treasures {
        let mark = if session.is_discovered(&treasure.id) { "x" } else { " " };
        println!("  [{mark}] {} ({} pts)", treasure.name, treasure.points);
    }
    Ok(())
}

fn cmd_settings(
    cli: &Cli,
    volume: Option<f64>,
    audio: Option<Toggle>,
    haptics: Option<Toggle>,
) -> Result<()> {
    let store = open_store(cli)?;
    let current = match store.load_settings().context("failed to load settings")? {
        Some(s) => s,
        None => open_config(cli)?.settings,
    };

    let mut updated: GameSettings = current;
    if let Some(v) = volume {
        updated = updated.with_audio_volume(v);
    }
    if let Some(t) = audio {
        updated = updated.with_audio_enabled(t.enabled());
    }
    if let Some(t) = haptics {
        updated = updated.with_haptics_enabled(t.enabled());
    }
    if updated != current {
        store
            .save_settings(&updated)
            .context("failed to save settings")?;
    }

    let on_off = |b: bool| if b { "on" } else { "off" };
    println!("audio:      {}", on_off(updated.audio_enabled()));
    println!("haptics:    {}", on_off(updated.haptics_enabled()));
    println!("volume:     {:.2}", updated.audio_volume());
    Ok(())
}

fn cmd_reset(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    store.clear_sessions().context("failed to clear progress")?;
    println!("progress cleared");
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let store = open_store(cli)?;
    store
        .export_json_file(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("exported to {}", path.display());
    Ok(())
}
