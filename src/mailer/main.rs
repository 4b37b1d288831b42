//! Command-line mailer.
//!
//! Lists schools, previews the addresses within a radius of one, and
//! writes the mailing list CSV.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use schoolmail::config::{Config, Overrides};
use schoolmail::service::{MailerService, EMPTY_MESSAGE};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "mailer")]
#[command(about = "Export the addresses within a radius of a school")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List school labels and the offered radii
    Schools,

    /// Show the addresses within a radius of a school
    Within {
        /// School label
        #[arg(short, long)]
        school: String,

        /// Radius in miles (defaults to the configured default)
        #[arg(short, long)]
        radius: Option<f64>,

        /// Print the map preview as GeoJSON instead of rows
        #[arg(long)]
        geojson: bool,
    },

    /// Write the mailing list CSV
    Export {
        /// School label
        #[arg(short, long)]
        school: String,

        /// Radius in miles (defaults to the configured default)
        #[arg(short, long)]
        radius: Option<f64>,

        /// Output directory; the file is named after the school and radius
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Write to stdout instead of a file
        #[arg(long)]
        stdout: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for CSV
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    config.apply(args.overrides);

    let service = MailerService::open(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Schools => {
            for label in service.labels() {
                writeln!(out, "{}", label)?;
            }
            let radii: Vec<String> = service
                .policy()
                .steps()
                .iter()
                .map(|r| r.to_string())
                .collect();
            info!("Offered radii (mi): {}", radii.join(", "));
        }

        Command::Within {
            school,
            radius,
            geojson,
        } => {
            let radius = radius.unwrap_or(service.policy().default);
            let selection = service.within(&school, radius)?;

            if geojson {
                let preview = selection.map_preview()?;
                serde_json::to_writer_pretty(&mut out, &preview)?;
                writeln!(out)?;
                return Ok(());
            }

            writeln!(out, "{}", selection.summary())?;
            if selection.is_empty() {
                writeln!(out, "{}", EMPTY_MESSAGE)?;
            }
            for row in selection.rows() {
                match row.distance {
                    Some(d) => writeln!(out, "{:.3} mi\t{}", d, row.address)?,
                    None => writeln!(out, "{}", row.address)?,
                }
            }
        }

        Command::Export {
            school,
            radius,
            out_dir,
            stdout,
        } => {
            let radius = radius.unwrap_or(service.policy().default);
            let selection = service.within(&school, radius)?;
            info!("{}", selection.summary());

            if selection.is_empty() {
                writeln!(out, "{}", EMPTY_MESSAGE)?;
                return Ok(());
            }

            if stdout {
                selection.write_csv(&mut out)?;
            } else {
                let path = out_dir.join(selection.filename());
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                selection.write_csv(&mut writer)?;
                writer.flush()?;
                writeln!(out, "{}", path.display())?;
            }
        }
    }

    Ok(())
}
