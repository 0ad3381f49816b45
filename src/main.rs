use anyhow::{Context, anyhow, ensure};
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use kvittoscan::config::Config;
use kvittoscan::{Vendor, batch, parse_pdf};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kvittoscan")]
#[command(about = "Extract structured JSON from Swedish grocery receipt PDFs")]
struct Cli {
    /// Optional TOML config file (timezone, batch defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a single receipt PDF and print its JSON to stdout
    Parse {
        pdf: PathBuf,
        /// Receipt layout; auto-detected from the text by default
        #[arg(long, value_enum, default_value_t = VendorArg::Auto)]
        vendor: VendorArg,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Walk a directory tree, parse every PDF, write one aggregated JSON file
    Batch {
        dir: PathBuf,
        /// Receipt layout; auto-detected per file by default
        #[arg(long, value_enum, default_value_t = VendorArg::Auto)]
        vendor: VendorArg,
        /// Rename each PDF to <datetime>_<store>_<nr>.pdf
        #[arg(long)]
        rename: bool,
        /// Directory for the aggregated JSON file (default: the input dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VendorArg {
    Auto,
    CoopV1,
    CoopV2,
    IcaKivra,
}

impl VendorArg {
    fn resolve(self) -> Option<Vendor> {
        match self {
            VendorArg::Auto => None,
            VendorArg::CoopV1 => Some(Vendor::CoopV1),
            VendorArg::CoopV2 => Some(Vendor::CoopV2),
            VendorArg::IcaKivra => Some(Vendor::IcaKivra),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // init tracing; JSON goes to stdout, logs stay on stderr
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .map_err(|e| anyhow!("failed to load config {}: {e}", path.display()))?,
        None => Config::load_or_default(".config/kvittoscan.toml"),
    };
    let tz = cfg
        .timezone
        .parse::<Tz>()
        .map_err(|e| anyhow!("bad timezone in config: {e}"))?;

    match cli.command {
        Command::Parse { pdf, vendor, pretty } => {
            ensure!(pdf.is_file(), "File not found: {}", pdf.display());

            let parsed = parse_pdf(&pdf, vendor.resolve(), tz)
                .with_context(|| format!("failed to parse {}", pdf.display()))?;
            for line in &parsed.unhandled {
                warn!(line = %line, "Unhandled item line");
            }

            let json = if pretty {
                serde_json::to_string_pretty(&parsed.visit)?
            } else {
                serde_json::to_string(&parsed.visit)?
            };
            println!("{json}");
        }
        Command::Batch { dir, vendor, rename, out } => {
            ensure!(dir.is_dir(), "Directory not found: {}", dir.display());

            let rename = rename || cfg.batch.rename;
            let outcome = batch::run(&dir, vendor.resolve(), rename, tz)
                .map_err(|e| anyhow!("batch run failed: {e}"))?;
            for line in &outcome.unhandled {
                warn!(line = %line, "Unhandled item line");
            }

            let out_dir = out.as_deref().unwrap_or(&dir);
            let path = batch::write_aggregate(&outcome, out_dir)
                .map_err(|e| anyhow!("failed to write aggregate: {e}"))?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
