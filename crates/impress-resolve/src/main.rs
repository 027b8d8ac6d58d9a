//! Impress Resolve Binary
//!
//! Canonicalize a delimited list of names or keywords, or match it against
//! an authority list.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use impress_resolve::{
    load_entries, AuthorityIndex, ClusteringPolicy, EntityKind, ReportError, ResolveError,
    Resolver, ResolverConfig, SourceOptions,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Entity {
    Person,
    Subject,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Star,
    Transitive,
}

/// `--delimiter`: one ASCII character other than the quote or newline
fn parse_delimiter(s: &str) -> Result<u8, String> {
    if s == "tab" || s == "\\t" {
        return Ok(b'\t');
    }
    let mut chars = s.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(format!("delimiter must be a single character, got {:?}", s)),
    };
    if !c.is_ascii() {
        return Err(format!("delimiter must be an ASCII character, got {:?}", s));
    }
    if c == '"' || c == '\n' || c == '\r' {
        return Err(format!("{:?} cannot be used as a delimiter", c));
    }
    Ok(c as u8)
}

#[derive(Parser)]
#[command(name = "impress-resolve")]
#[command(about = "Fuzzy identity resolution for names and subject keywords")]
#[command(version)]
struct Cli {
    /// Input file: one `text[,frequency]` row per line
    input: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    entity: Option<Entity>,

    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Lower bound of the review band
    #[arg(long)]
    threshold: Option<f64>,

    /// Lower bound of the auto-merge band
    #[arg(long)]
    high_cutoff: Option<f64>,

    /// Recase ALL-CAPS and all-lowercase canonical forms
    #[arg(long)]
    orthography: bool,

    /// Match the input against this list of official forms instead
    #[arg(long)]
    authority: Option<PathBuf>,

    /// Write review-band pairs to this file
    #[arg(long)]
    flagged: Option<PathBuf>,

    /// Write cluster summaries to this file
    #[arg(long)]
    clusters: Option<PathBuf>,

    /// Field delimiter for input and CSV output (one ASCII character, or `tab`)
    #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Split `;`-separated keyword cells into separate terms
    #[arg(long)]
    split_terms: bool,
}

impl Cli {
    fn resolver_config(&self) -> Result<ResolverConfig, ResolveError> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_file(path)?,
            None => ResolverConfig::default(),
        };
        if let Some(entity) = self.entity {
            config.entity = match entity {
                Entity::Person => EntityKind::Person,
                Entity::Subject => EntityKind::Subject,
            };
        }
        if let Some(policy) = self.policy {
            config.clustering_policy = match policy {
                Policy::Star => ClusteringPolicy::Star,
                Policy::Transitive => ClusteringPolicy::Transitive,
            };
        }
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if let Some(cutoff) = self.high_cutoff {
            config.high_confidence_cutoff = cutoff;
        }
        if self.orthography {
            config.orthography = true;
        }
        config.validate()?;
        Ok(config)
    }

    fn output(&self) -> Result<Box<dyn Write>, ReportError> {
        Ok(match &self.output {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout().lock()),
        })
    }
}

fn run(cli: &Cli) -> Result<(), ResolveError> {
    let config = cli.resolver_config()?;
    let options = SourceOptions {
        delimiter: cli.delimiter,
        split_terms: cli.split_terms,
    };
    let entries = load_entries(&cli.input, options)?;

    if let Some(authority) = &cli.authority {
        let official = load_entries(authority, options)?;
        let index = AuthorityIndex::new(&config, official);
        let matches = index.resolve_terms(entries);
        let mut out = cli.output()?;
        match cli.format {
            Format::Json => {
                let json = serde_json::to_string_pretty(&matches).map_err(ReportError::from)?;
                writeln!(out, "{}", json).map_err(ReportError::from)?;
            }
            Format::Csv => {
                let mut wtr = csv::WriterBuilder::new()
                    .delimiter(cli.delimiter)
                    .from_writer(out);
                for m in &matches {
                    wtr.serialize(m).map_err(ReportError::from)?;
                }
                wtr.flush().map_err(ReportError::from)?;
            }
        }
        return Ok(());
    }

    let resolver = Resolver::new(config)?;
    let report = resolver.resolve(entries);
    info!(
        rows = report.rows.len(),
        clusters = report.clusters.len(),
        flagged = report.flagged.len(),
        "report ready"
    );

    let mut out = cli.output()?;
    match cli.format {
        Format::Json => {
            let json = report.to_json()?;
            writeln!(out, "{}", json).map_err(ReportError::from)?;
        }
        Format::Csv => report.write_csv(out, cli.delimiter)?,
    }

    if let Some(path) = &cli.flagged {
        let file = File::create(path).map_err(ReportError::from)?;
        report.write_flagged_csv(file, cli.delimiter)?;
    }
    if let Some(path) = &cli.clusters {
        let file = File::create(path).map_err(ReportError::from)?;
        report.write_clusters_csv(file, cli.delimiter)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "resolution aborted");
            ExitCode::FAILURE
        }
    }
}
