//! templar CLI
//!
//! Usage:
//!   templar render <FILE> [-c CONFIG] [-a key=value]...
//!   templar name <FILE>
//!   templar engines [-c CONFIG]
//!
//! Set `RUST_LOG=debug` to see registration and compilation logs.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use templar::{render_file, template_name, Template, TemplateConfig, Value};

#[derive(Parser)]
#[command(name = "templar")]
#[command(about = "Compile and render templates through pluggable engines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template file to stdout
    Render {
        /// Template file; its extension picks the engine
        file: PathBuf,

        /// Configuration file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Assign `@key`; the value is read as a TOML value, falling back to a string
        #[arg(short, long = "assign", value_name = "KEY=VALUE", value_parser = parse_assign)]
        assigns: Vec<(String, Value)>,
    },

    /// Print the method name generated for a template file
    Name {
        file: PathBuf,
    },

    /// List registered extensions and their engines
    Engines {
        /// Configuration file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            file,
            config,
            assigns,
        } => {
            let config = load_config(config.as_deref());
            let mut template = Template::from_config(&config);
            let assigns = config.assigns.clone().into_iter().chain(assigns);
            match render_file(&mut template, &file, assigns) {
                Ok(output) => print!("{}", output),
                Err(e) => {
                    eprint!("{}", e.report());
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        Command::Name { file } => println!("{}", template_name(&file)),
        Command::Engines { config } => {
            let config = load_config(config.as_deref());
            let template = Template::from_config(&config);
            for (extension, engine) in template.registry().iter() {
                println!("{} -> {}", extension, engine.name());
            }
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> TemplateConfig {
    match path {
        Some(path) => match TemplateConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => TemplateConfig::default(),
    }
}

fn parse_assign(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim().trim_start_matches('@');
    if key.is_empty() {
        return Err(format!("missing key in '{}'", raw));
    }

    #[derive(serde::Deserialize)]
    struct Wrapped {
        v: toml::Value,
    }
    let value = match toml::from_str::<Wrapped>(&format!("v = {}", value)) {
        Ok(wrapped) => Value::from(wrapped.v),
        Err(_) => Value::Str(value.to_string()),
    };
    Ok((key.to_string(), value))
}
