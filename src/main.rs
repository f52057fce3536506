use clap::{Parser, Subcommand};
use docblog::config::{self, DocblogConfig};
use docblog::grid::JsonGridService;
use docblog::index::IndexStore;
use docblog::output;
use docblog::pipeline::{self, PipelineSettings};
use docblog::source::LocalFolderSource;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docblog")]
#[command(about = "Turn a folder of documents into static-site posts")]
#[command(long_about = "\
Turn a folder of documents into static-site posts

The folder holds one zip export per document. Each export is unpacked, its
markup rewritten to sit inside a site theme, and written as a post with a
frontmatter header; its images are copied next to the posts.

Folder structure:

  drafts/
  ├── 1a2b3c.zip                 # Export archive (markup + images/)
  ├── 1a2b3c.txt                 # Optional display name
  ├── 4d5e6f.zip
  └── index.grid.json            # Metadata index, created on first build

Output:

  posts/2024-03-01-Hello.html    # Frontmatter + rewritten markup
  assets/1a2b3c-image1.png       # {document id}-{file name}

The index has one row per document: Id, Name, Date, Last modified,
Published, Description. Edit it to override titles, dates and descriptions,
or set Published to FALSE to hide a post. Every build merges the edits with
the folder listing and writes the index back.

Logging goes to stderr; set RUST_LOG=docblog=debug for detail.

Run 'docblog gen-config' to generate a documented docblog.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Folder holding the exports and the index (overrides folder_id)
    #[arg(long, global = true)]
    folder: Option<String>,

    /// Directory for posts (overrides output.posts)
    #[arg(long, global = true)]
    posts_output: Option<String>,

    /// Directory for assets (overrides output.assets)
    #[arg(long, global = true)]
    assets_output: Option<String>,

    /// Prefix of image URLs inside posts (overrides output.assets_prefix)
    #[arg(long, global = true)]
    assets_prefix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite every published document and update the index
    Build,
    /// Rewrite one markup file and print it to stdout
    Rewrite {
        /// Markup file; its stem is used as the document id
        file: PathBuf,
        /// Prepend a frontmatter header
        #[arg(long)]
        with_frontmatter: bool,
    },
    /// Read the index and report malformed rows without writing anything
    Check,
    /// Print a stock docblog.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let describer = pipeline::description_supplier(&config);

    match &cli.command {
        Command::Build => {
            init_thread_pool(&config.processing);
            let settings = PipelineSettings::from_config(&config)?;
            let source = LocalFolderSource::new(config.source.page_size);
            let grid = JsonGridService::new();

            println!("==> Building {}", settings.folder_id);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for (i, outcome) in rx.into_iter().enumerate() {
                    output::print_document_outcome(i + 1, &outcome);
                }
            });
            let result = pipeline::run(&source, &grid, describer.as_deref(), &settings, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            let summary = result?;
            output::print_run_summary(&summary);
            println!(
                "==> Build complete: {}",
                settings.posts_dir.display()
            );
        }
        Command::Rewrite {
            file,
            with_frontmatter,
        } => {
            init_thread_pool(&config.processing);
            let settings = PipelineSettings::offline(&config);
            let out =
                pipeline::rewrite_file(file, *with_frontmatter, describer.as_deref(), &settings)?;
            std::io::stdout().write_all(&out)?;
        }
        Command::Check => {
            let folder = config.require_folder()?;
            let settings = PipelineSettings::offline(&config);
            let grid = JsonGridService::new();
            println!("==> Checking index in {}", folder);
            let snapshot = match IndexStore::find(&grid, folder, &settings.index)? {
                Some(store) => Some(store.read_all()?),
                None => None,
            };
            output::print_index_check(snapshot.as_ref());
            if let Some(snapshot) = &snapshot
                && !snapshot.errors.is_empty()
            {
                return Err(format!("index has {} malformed rows", snapshot.errors.len()).into());
            }
            println!("==> Index is valid");
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Load the config file and apply command-line overrides on top.
fn load_config(cli: &Cli) -> Result<DocblogConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(folder) = &cli.folder {
        config.folder_id = folder.clone();
    }
    if let Some(posts) = &cli.posts_output {
        config.output.posts = posts.clone();
    }
    if let Some(assets) = &cli.assets_output {
        config.output.assets = assets.clone();
    }
    if let Some(prefix) = &cli.assets_prefix {
        config.output.assets_prefix = prefix.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Structured logs to stderr, filtered by `RUST_LOG` (default `docblog=info`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docblog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
