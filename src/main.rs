use clap::{Parser, Subcommand};
use respimg::resolver::HttpResolver;
use respimg::view::{ResponsiveView, ViewProps};
use respimg::{config, output, process, srcset};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "respimg")]
#[command(about = "Responsive image derivatives and srcset resolution")]
#[command(long_about = "\
Responsive image derivatives and srcset resolution

Every raster under the source directory becomes a WebP set plus a PNG set
(images with an alpha channel) or a JPEG set (everything else), one file per
configured width, and a metadata document telling clients which one exists:

  dist/assets/images/
  ├── webp/example-300.webp ... example-2000.webp
  ├── jpg/example-300.jpg ... example-2000.jpg
  ├── placeholder/example-20.webp
  └── metadata/example.json        {\"hasAlpha\":false,...}

An optional config.toml in the source directory overrides the defaults.
Run 'respimg gen-config' to print a documented one.

Set RUST_LOG=debug for diagnostics.")]
#[command(version)]
struct Cli {
    /// Source image directory (also holds config.toml)
    #[arg(long, default_value = "images", global = true)]
    source: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate derivatives and metadata for every source image
    Process {
        /// Artifact root
        #[arg(long, default_value = "dist/assets/images")]
        output: PathBuf,
        /// Disable the encode cache and re-encode every artifact
        #[arg(long)]
        no_cache: bool,
    },
    /// List discovered sources and validate config without encoding
    Check,
    /// Print the src and srcset the runtime would build for an image
    Srcset {
        /// Logical name
        name: String,
        /// Image has an alpha channel (PNG fallback)
        #[arg(long)]
        alpha: bool,
    },
    /// Resolve an image against a running server and print the rendered HTML
    Resolve {
        /// Logical name, optionally with an extension
        src: String,
        /// Server origin, e.g. http://localhost:8080
        #[arg(long)]
        origin: String,
        #[arg(long, default_value = "")]
        alt: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Process { output, no_cache } => {
            let asset_config = config::load_config(&cli.source)?;
            let process_config = process::ProcessConfig::from_asset_config(&asset_config);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result =
                process::process(&cli.source, &output, &process_config, !no_cache, Some(tx));
            printer.join().ok();
            let report = result?;
            output::print_batch_report(&report);
            if !report.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            config::load_config(&cli.source)?;
            let sources = process::discover_sources(&cli.source)?;
            output::print_check_output(&sources);
            println!("==> Config is valid");
        }
        Command::Srcset { name, alpha } => {
            let asset_config = config::load_config(&cli.source)?;
            let resolved = srcset::build_srcset(
                &asset_config.runtime.base_path,
                &name,
                &asset_config.size_catalog(),
                alpha,
            );
            output::print_srcset(&resolved);
        }
        Command::Resolve { src, origin, alt } => {
            let asset_config = config::load_config(&cli.source)?;
            let resolver = HttpResolver::from_runtime_config(&origin, &asset_config.runtime)?;
            let mut props = ViewProps::from_runtime_config(
                src,
                alt,
                &asset_config.runtime,
                asset_config.size_catalog(),
            );
            props.base_path = respimg::naming::join_url(&origin, &props.base_path);
            let mut view = ResponsiveView::new(props, resolver);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(view.load());

            println!("{}", view.render().into_string());
            if view.state().is_terminal() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}
