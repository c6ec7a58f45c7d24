//! CLI entry point for spacetraveling

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spacetraveling")]
#[command(version)]
#[command(about = "A static blog generator fed by the Prismic headless CMS", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch posts from the CMS and generate static files
    #[command(alias = "g")]
    Generate,

    /// Generate, then serve the site with on-demand post pages
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Disable config/asset watching and live reload
        #[arg(long)]
        r#static: bool,
    },

    /// List posts from the CMS
    List {
        /// Follow the cursor through every page
        #[arg(short, long)]
        all: bool,
    },

    /// Delete the public folder
    Clean,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "spacetraveling=debug,info"
    } else {
        "spacetraveling=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Generate => {
            let blog = spacetraveling::Blog::new(&base_dir)?;
            tracing::info!("Generating static files...");
            blog.generate().await?;
            println!("Generated successfully!");
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
        } => {
            let blog = spacetraveling::Blog::new(&base_dir)?;

            tracing::info!("Generating static files...");
            blog.generate().await?;

            tracing::info!("Starting server at http://{}:{}", ip, port);
            spacetraveling::server::start(&blog, &ip, port, !r#static, open).await?;
        }

        Commands::List { all } => {
            let blog = spacetraveling::Blog::new(&base_dir)?;
            spacetraveling::commands::list::run(&blog, all).await?;
        }

        Commands::Clean => {
            let blog = spacetraveling::Blog::new(&base_dir)?;
            tracing::info!("Cleaning public folder...");
            blog.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::Version => {
            println!("spacetraveling version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
