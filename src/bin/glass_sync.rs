// glass_sync - gallery catalog sync
// Reconciles data/photos.json with the images in public/photos

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use glass_catalog::{load_catalog, synchronize, SyncOptions};

#[derive(Parser)]
#[command(name = "glass_sync", version, about = "Sync the gallery catalog with the photos directory")]
struct Args {
    /// Project root that default paths are resolved against
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Image directory (default: <root>/public/photos)
    #[arg(long)]
    photos_dir: Option<PathBuf>,

    /// Catalog file (default: <root>/data/photos.json)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Parallel extraction jobs
    #[arg(long)]
    jobs: Option<usize>,

    /// Report changes without writing the catalog
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the catalog with the photos directory (default)
    Sync,
    /// Print catalog entries with their EXIF summary
    List,
}

impl Args {
    fn sync_options(&self) -> SyncOptions {
        let photos_dir = self
            .photos_dir
            .clone()
            .unwrap_or_else(|| self.root.join("public").join("photos"));
        let catalog_path = self
            .catalog
            .clone()
            .unwrap_or_else(|| self.root.join("data").join("photos.json"));

        SyncOptions {
            photos_dir,
            catalog_path,
            jobs: self.jobs,
            dry_run: self.dry_run,
        }
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level))
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        error!("Sync failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let options = args.sync_options();

    match args.command.as_ref().unwrap_or(&Command::Sync) {
        Command::Sync => {
            info!("📷 Photos: {}", options.photos_dir.display());
            info!("   Catalog: {}", options.catalog_path.display());

            let report = synchronize(&options)
                .with_context(|| format!("Failed to sync {}", options.catalog_path.display()))?;

            if report.is_noop() {
                info!("   ✓ Catalog up to date ({} entries)", report.total);
            } else {
                info!(
                    "   ✓ {} added, {} updated, {} total",
                    report.added.len(),
                    report.updated.len(),
                    report.total
                );
            }
        }
        Command::List => {
            let photos = load_catalog(&options.catalog_path)
                .with_context(|| format!("Failed to read {}", options.catalog_path.display()))?;

            for photo in &photos {
                let summary = photo
                    .exif
                    .as_ref()
                    .and_then(|e| e.summary())
                    .unwrap_or_default();
                println!("{}\t{}x{}\t{}", photo.id, photo.width, photo.height, summary);
            }
        }
    }

    Ok(())
}
