//! CLI for cmetrics binary records.
//!
//! Translates files of concatenated MessagePack records into Prometheus,
//! text, Influx or JSON output, and summarizes their contents.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use cmetrics::msgpack::Records;
use cmetrics::{Context, DecodeConfig, PrometheusConfig, TextConfig};
use tracing_subscriber::EnvFilter;

/// cmetrics: translate and inspect binary metrics records.
#[derive(Parser)]
#[command(name = "cmetrics", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Decode every record in a file and print it in another format.
    Convert {
        /// Path to a file of concatenated binary records.
        input: PathBuf,

        /// Output format.
        #[arg(long, default_value = "prometheus")]
        format: OutputFormat,

        /// Omit timestamps (Prometheus and text formats).
        #[arg(long)]
        no_timestamps: bool,

        /// Maximum number of metrics accepted per record.
        #[arg(long)]
        max_metrics: Option<usize>,
    },

    /// Print a summary of every record in a file.
    Inspect {
        /// Path to a file of concatenated binary records.
        input: PathBuf,
    },

    /// Write a demonstration record to a file.
    Sample {
        /// Destination path.
        output: PathBuf,
    },
}

/// Output format for `convert`.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Prometheus text exposition format.
    Prometheus,
    /// Generic text with RFC3339 timestamps.
    Text,
    /// InfluxDB line protocol.
    Influx,
    /// Pretty-printed JSON.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    cmetrics::initialize();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            format,
            no_timestamps,
            max_metrics,
        } => cmd_convert(&input, format, !no_timestamps, max_metrics),
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Sample { output } => cmd_sample(&output),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `cmetrics convert <input>`.
fn cmd_convert(
    input: &Path,
    format: OutputFormat,
    timestamps: bool,
    max_metrics: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let buf = std::fs::read(input)?;

    let mut config = DecodeConfig::default();
    if let Some(max) = max_metrics {
        config = config.with_max_metrics(max);
    }

    for record in Records::with_config(&buf, config) {
        let ctx = record?;
        print!("{}", render(&ctx, format, timestamps)?);
    }
    Ok(())
}

/// Renders one decoded record in the requested format.
fn render(
    ctx: &Context,
    format: OutputFormat,
    timestamps: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let out = match format {
        OutputFormat::Prometheus => {
            ctx.to_prometheus(&PrometheusConfig::default().with_timestamps(timestamps))
        }
        OutputFormat::Text => ctx.to_text(&TextConfig::default().with_timestamps(timestamps)),
        OutputFormat::Influx => ctx.to_influx(),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(ctx)?;
            json.push('\n');
            json
        }
    };
    Ok(out)
}

/// Implements `cmetrics inspect <input>`.
fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let buf = std::fs::read(input)?;
    println!("File: {} ({} bytes)", input.display(), buf.len());

    let mut records = Records::new(&buf);
    let mut index = 0;
    loop {
        let start = records.cursor();
        let Some(record) = records.next() else {
            break;
        };
        let ctx = record?;
        println!();
        print!("{}", summarize(index, start, records.cursor(), &ctx));
        index += 1;
    }

    println!();
    println!("Records: {index}");
    Ok(())
}

/// Formats the summary block for one record.
fn summarize(index: usize, start: usize, end: usize, ctx: &Context) -> String {
    let mut out = format!("Record {index}: bytes {start}..{end}\n");

    if !ctx.static_labels().is_empty() {
        let pairs: Vec<_> = ctx
            .static_labels()
            .pairs()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        out.push_str(&format!("  Static labels: {}\n", pairs.join(", ")));
    }

    out.push_str(&format!("  Metrics: {}\n", ctx.metrics().len()));
    for metric in ctx.metrics() {
        let dims = if metric.dimension_keys().is_empty() {
            String::new()
        } else {
            format!(" [{}]", metric.dimension_keys().join(", "))
        };
        out.push_str(&format!(
            "    - {} ({}){dims}: {} series\n",
            metric.opts().fqname(),
            metric.kind(),
            metric.samples().len()
        ));
    }
    out
}

/// Implements `cmetrics sample <output>`.
fn cmd_sample(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = demo_context(cmetrics::time_now())?;
    let buf = ctx.to_msgpack()?;
    std::fs::write(output, &buf)?;
    println!("Wrote {} bytes to {}", buf.len(), output.display());
    Ok(())
}

/// Builds the demonstration context written by `sample`.
fn demo_context(ts: u64) -> cmetrics::Result<Context> {
    let mut ctx = Context::new();
    ctx.add_static_label("dev", "Calyptia");

    let load = ctx.create_counter(
        "kubernetes",
        "network",
        "load",
        "Network load",
        &["hostname", "app"],
    )?;
    ctx.increment(load, ts, &[])?;
    ctx.increment(load, ts, &["localhost", "cmetrics"])?;
    ctx.add(load, ts, 10.55, &["localhost", "test"])?;

    let free = ctx.create_gauge("node", "memory", "free_bytes", "Free memory", &[])?;
    ctx.set(free, ts, 1_073_741_824.0, &[])?;

    Ok(ctx)
}
