// Rubemacro — declarative HTTP macro runner for the Rube automation API
// License: Apache-2.0

use clap::{Parser, Subcommand};
use rubemacro::binder::SidTokenBinder;
use rubemacro::config::Config;
use rubemacro::executor::HttpExecutor;
use rubemacro::runner::MacroRunner;
use rubemacro::store;
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "rubemacro",
    about = "Rubemacro — declarative HTTP macro runner for the Rube automation API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the macro (seeds the default macro document if absent)
    Run {
        /// Macro document path (overrides config)
        #[arg(short, long)]
        macro_file: Option<String>,
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show status of configuration and macro document
    Status {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Run the image-generation side tool on stdin/stdout
    #[command(name = "image-tool")]
    ImageTool {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    rubemacro::logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { macro_file, config }) => {
            run_cmd(macro_file, config).await;
        }
        Some(Commands::Status { config }) => {
            status_cmd(config);
        }
        Some(Commands::ImageTool { config }) => {
            image_tool_cmd(config).await;
        }
        Some(Commands::Version) => {
            version_cmd();
        }
        None => {
            // Default: run the macro
            run_cmd(None, None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Run command
// ---------------------------------------------------------------------------

async fn run_cmd(macro_file: Option<String>, config_path: Option<String>) {
    let mut cfg = load_config(config_path.as_deref());
    if let Some(path) = macro_file {
        cfg.macros.path = path;
    }

    if let Err(e) = cfg.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let mac = match store::load_or_create(&PathBuf::from(&cfg.macros.path)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Macro document error ({}): {}", cfg.macros.path, e);
            std::process::exit(1);
        }
    };

    let executor = match HttpExecutor::new(cfg.api.timeout_secs) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut runner = MacroRunner::new(cfg.api.clone(), executor, Box::new(SidTokenBinder));

    match runner.run(&mac).await {
        Ok(report) => {
            for name in &report.completed {
                println!("[{}] ok", name);
            }
            println!("DONE");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Status command
// ---------------------------------------------------------------------------

fn status_cmd(config_path: Option<String>) {
    println!("Rubemacro Status\n");

    let cfg = load_config(config_path.as_deref());

    let config_file = Config::default_path().unwrap_or_default();
    if config_file.exists() {
        println!("  Config:    {}", config_file.display());
    } else {
        println!("  Config:    not found (defaults + environment)");
    }

    match cfg.validate() {
        Ok(()) => println!("  API:       {} (token configured)", cfg.api.base_url),
        Err(e) => println!("  API:       {}", e),
    }

    let macro_path = PathBuf::from(&cfg.macros.path);
    if macro_path.exists() {
        match store::load_or_create(&macro_path) {
            Ok(mac) => {
                println!("  Macro:     {} ({} steps)", macro_path.display(), mac.steps.len());
                for step in &mac.steps {
                    println!("             - {} -> {}", step.name, step.path);
                }
            }
            Err(e) => println!("  Macro:     {} (malformed: {})", macro_path.display(), e),
        }
    } else {
        println!(
            "  Macro:     {} (will be seeded with the default macro)",
            macro_path.display()
        );
    }

    println!("  Image:     {} -> {}", cfg.image.endpoint, cfg.image.outputs_dir);
}

// ---------------------------------------------------------------------------
// Image tool command
// ---------------------------------------------------------------------------

async fn image_tool_cmd(config_path: Option<String>) {
    let cfg = load_config(config_path.as_deref());

    if let Err(e) = rubemacro::imagegen::serve(cfg.image).await {
        eprintln!("Image tool error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn version_cmd() {
    println!("rubemacro v{}", rubemacro::VERSION);
}

fn load_config(path: Option<&str>) -> Config {
    let config_path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        Config::default_path().unwrap_or_else(|_| PathBuf::from("config.json"))
    };

    Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    })
}
