//! cfgr - configuration upgrade CLI tool
//!
//! Merges site customizations into a new configuration template and reports
//! every decision taken along the way.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path as FsPath, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config_reshuffle::merge::{ConflictLog, MergeStatistics, Merger, Source};
use config_reshuffle::rules::{RuleSet, SITE_SOURCE, TEMPLATE_SOURCE};
use config_reshuffle::transform::{BatchDecider, ResolutionStatus, ResolvedCandidate, Resolver};
use config_reshuffle::value::{self, Value};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cfgr")]
#[command(about = "Precedence-aware merge of configuration documents", version)]
struct Cli {
    /// Log decisions at debug level (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every path that differs between two documents
    Diff {
        /// The older document
        #[arg(long)]
        old: PathBuf,

        /// The newer document
        #[arg(long)]
        new: PathBuf,
    },

    /// Merge a site document into a new reference template
    Merge {
        /// The new template, authoritative for structure
        #[arg(long)]
        reference: PathBuf,

        /// The site document carrying customizations
        #[arg(long)]
        site: PathBuf,

        /// The template the site document was derived from
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Rule book (YAML, or JSON with a .json extension)
        #[arg(long, short = 'r')]
        rules: Option<PathBuf>,

        /// Output location. Use '-' for stdout
        #[arg(long, short = 'o', default_value = "-")]
        output: String,

        /// Write a JSON audit of events, candidates and statistics
        #[arg(long)]
        audit: Option<PathBuf>,

        /// Skip relocation detection after the merge
        #[arg(long)]
        no_transform: bool,
    },

    /// List relocation candidates in a merged document without applying them
    Detect {
        /// The merged document
        #[arg(long)]
        merged: PathBuf,

        /// The reference template
        #[arg(long)]
        reference: PathBuf,

        /// Rule book supplying transform options
        #[arg(long, short = 'r')]
        rules: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Audit<'a> {
    statistics: MergeStatistics,
    events: &'a ConflictLog,
    candidates: &'a [ResolvedCandidate],
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<ResolutionStatus>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Diff { old, new } => {
            let old = read_tree(&old)?;
            let new = read_tree(&new)?;
            let diff = config_reshuffle::diff(&old, &new);
            println!("{}", diff);
        }
        Commands::Merge {
            reference,
            site,
            baseline,
            rules,
            output,
            audit,
            no_transform,
        } => {
            let rules = read_rules(rules.as_deref())?;
            let reference = read_tree(&reference)?;
            let site = read_tree(&site)?;
            let baseline = baseline.as_deref().map(read_tree).transpose()?;
            merge(&rules, reference, site, baseline.as_ref(), &output, audit.as_deref(), no_transform)?;
        }
        Commands::Detect {
            merged,
            reference,
            rules,
        } => {
            let rules = read_rules(rules.as_deref())?;
            let merged = read_tree(&merged)?;
            let reference = read_tree(&reference)?;
            let candidates = Resolver::new(&reference, rules.transform()).detect(&merged);
            if candidates.is_empty() {
                println!("No relocation candidates");
            }
            for candidate in &candidates {
                println!("{}", candidate);
            }
        }
    }
    Ok(())
}

fn merge(
    rules: &RuleSet,
    reference: Value,
    site: Value,
    baseline: Option<&Value>,
    output: &str,
    audit: Option<&FsPath>,
    no_transform: bool,
) -> Result<(), Box<dyn Error>> {
    let mut merger = Merger::new(rules).reference(TEMPLATE_SOURCE);
    if let Some(baseline) = baseline {
        merger = merger.baseline(baseline);
    }
    let sources = [Source::template(TEMPLATE_SOURCE, reference), Source::site(SITE_SOURCE, site)];
    let result = merger.merge(&sources).map_err(|e| format!("Merge failed: {}", e))?;
    let reference = &sources[0].tree;

    let mut log = result.log;
    let (tree, candidates, resolution) = if no_transform {
        (result.tree, Vec::new(), None)
    } else {
        let resolution = Resolver::new(reference, rules.transform()).resolve(&result.tree, &mut BatchDecider);
        eprintln!("{}", resolution);
        log.append(resolution.log);
        (resolution.tree, resolution.candidates, Some(resolution.status))
    };

    let statistics = log.statistics();
    info!(events = statistics.total, review = statistics.manual_review, "merge finished");
    eprintln!("{}", statistics);

    let yaml = value::to_yaml(&tree).map_err(|e| format!("Failed to serialize result: {}", e))?;
    write_output(output, &yaml)?;

    if let Some(path) = audit {
        let audit = Audit {
            statistics,
            events: &log,
            candidates: &candidates,
            resolution,
        };
        let json = serde_json::to_string_pretty(&audit)?;
        fs::write(path, json).map_err(|e| format!("Failed to write audit file {:?}: {}", path, e))?;
    }
    Ok(())
}

fn read_tree(path: &FsPath) -> Result<Value, Box<dyn Error>> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read file {:?}: {}", path, e))?;
    let tree = value::from_yaml(&content).map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;
    Ok(tree)
}

fn read_rules(path: Option<&FsPath>) -> Result<RuleSet, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(RuleSet::default());
    };
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read rules file {:?}: {}", path, e))?;
    let rules = if path.extension().is_some_and(|ext| ext == "json") {
        RuleSet::from_json(&content)
    } else {
        RuleSet::from_yaml(&content)
    };
    Ok(rules.map_err(|e| format!("Invalid rules in {:?}: {}", path, e))?)
}

fn write_output(output: &str, content: &str) -> Result<(), Box<dyn Error>> {
    let mut out: Box<dyn Write> = if output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(output).map_err(|e| format!("Failed to create output file {:?}: {}", output, e))?)
    };
    write!(out, "{}", content)?;
    Ok(())
}
