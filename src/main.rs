use clap::{Parser, Subcommand};
use renditions::config;
use renditions::storage::{FileSystemStorage, Storage};
use renditions::{BoundImage, Engine, Ppoi};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "renditions")]
#[command(about = "On-demand sized and filtered image renditions")]
#[command(long_about = "\
On-demand sized and filtered image renditions

Renditions are derived from images under a media root and written next to
them, under deterministic names:

  media/
  ├── config.toml                                  # Optional settings
  ├── photos/
  │   ├── cat.jpg                                  # Source
  │   └── __filtered__/
  │       └── cat__invert__.jpg                    # filters__invert__url
  └── __sized__/
      └── photos/
          ├── cat-crop-c0-5__0-5-400x400-70.jpg    # crop__400x400
          └── __filtered__/
              └── cat__invert__-thumbnail-90x90-70.jpg

Image keys:
  url                         the source itself
  crop__400x400               sized
  filters__invert__url        filtered
  filters__invert__crop__100x100
                              filtered, then sized

Set RUST_LOG=renditions=debug to trace creation and cache decisions.
Run 'renditions gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Media root holding sources and renditions
    #[arg(long, default_value = "media", global = true)]
    root: PathBuf,

    /// URL prefix that the media root is served under
    #[arg(long, default_value = "/media", global = true)]
    base_url: String,

    /// Config file (default: config.toml in the media root, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one image key to a URL, creating the rendition if needed
    Url {
        /// Source path relative to the media root
        path: String,
        /// Image key, e.g. crop__400x400
        key: String,
        /// Point of primary interest as XxY, e.g. 0.25x0.75
        #[arg(long)]
        ppoi: Option<Ppoi>,
        /// Compute the URL without creating anything
        #[arg(long)]
        no_create: bool,
    },
    /// Resolve a configured rendition key set to JSON
    UrlSet {
        /// Source path relative to the media root
        path: String,
        /// Name of a set under [rendition_key_sets]
        set: String,
        #[arg(long)]
        ppoi: Option<Ppoi>,
    },
    /// Delete renditions created from a source
    Delete {
        /// Source path relative to the media root
        path: String,
        #[command(flatten)]
        scope: DeleteScope,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Which rendition directories to clean. All of them when no flag is given.
#[derive(clap::Args)]
#[group(multiple = false)]
struct DeleteScope {
    #[arg(long)]
    sized: bool,
    #[arg(long)]
    filtered: bool,
    #[arg(long)]
    filtered_sized: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Url {
            path,
            key,
            ppoi,
            no_create,
        } => {
            let (engine, storage) = open(&cli)?;
            let mut image = bind(&engine, storage, path, *ppoi)?;
            if *no_create {
                image.set_create_on_demand(false);
            }
            println!("{}", image.url_for_key(key)?);
        }
        Command::UrlSet { path, set, ppoi } => {
            let (engine, storage) = open(&cli)?;
            let key_set = engine.settings().key_set(set)?;
            let mut image = bind(&engine, storage, path, *ppoi)?;
            let urls = image.build_url_set(key_set)?;
            println!("{}", serde_json::to_string_pretty(&urls)?);
        }
        Command::Delete { path, scope } => {
            let (engine, storage) = open(&cli)?;
            let mut image = bind(&engine, storage, path, None)?;
            let deleted = if scope.sized {
                image.delete_sized_images()?
            } else if scope.filtered {
                image.delete_filtered_images()?
            } else if scope.filtered_sized {
                image.delete_filtered_sized_images()?
            } else {
                image.delete_all_created_images()?
            };
            for location in &deleted {
                println!("{location}");
            }
            println!("Deleted {} rendition(s)", deleted.len());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config (explicit file, or the media root's `config.toml`) and
/// open the media root. The manifest cache, if selected, lives in the root.
fn open(cli: &Cli) -> Result<(Arc<Engine>, Arc<dyn Storage>), Box<dyn std::error::Error>> {
    let rendition_config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.root)?,
    };
    let engine = Arc::new(Engine::from_config(&rendition_config, &[], &cli.root)?);
    let storage: Arc<dyn Storage> = Arc::new(FileSystemStorage::new(
        cli.root.clone(),
        cli.base_url.clone(),
    ));
    Ok((engine, storage))
}

fn bind(
    engine: &Arc<Engine>,
    storage: Arc<dyn Storage>,
    path: &str,
    ppoi: Option<Ppoi>,
) -> Result<BoundImage, renditions::RenditionError> {
    let mut image = engine.bind(storage, Some(path))?;
    if let Some(ppoi) = ppoi {
        image.set_ppoi(ppoi);
    }
    Ok(image)
}
