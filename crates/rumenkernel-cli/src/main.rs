//! RumenKernels CLI tool.
//!
//! Splits logger spreadsheets, runs the per-animal-day analysis, samples fitted
//! curves and lists the kernel catalogue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use rumenkernel_core::{
    config::PipelineConfig,
    domain::Domain,
    logging::{LogConfig, LogLevel},
    registry::KernelRegistry,
};
use rumenkernel_io::{
    curve_table, diagnostics_table, load_narrow_sources, read_cosinor_path, read_wide_path,
    scrape_ids, ReportWriter, SourceSet, DEFAULT_PREFIX_LEN,
};
use rumenkernel_temporal::{
    consecutive_curves, AnimalDayPipeline, CurveLayout, Diagnostic, SkipReason,
};

#[derive(Parser)]
#[command(name = "rumenkernel")]
#[command(version, about = "Rumen temperature analysis CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a wide logger export into one narrow CSV per animal
    Split {
        /// Wide CSV with a DT column and one column per logger
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Run artifact correction, cosinor fitting and drink detection
    Process {
        /// Narrow CSV, directory of narrow CSVs, or a wide CSV with --wide
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Pipeline configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Animals processed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Treat the input as a wide export
        #[arg(long)]
        wide: bool,

        /// Skip the column-major JSON companions
        #[arg(long)]
        no_columnar: bool,
    },

    /// Sample fitted curves from a cosinor feature table
    Curves {
        /// Cosinor feature CSV
        input: PathBuf,

        /// Index of the first record after sorting by date
        #[arg(long, default_value = "0")]
        start: usize,

        /// Number of consecutive records
        #[arg(long, default_value = "3")]
        periods: usize,

        /// Points per curve
        #[arg(long, default_value = "240")]
        points: usize,

        /// Lay days end to end instead of overlaying them
        #[arg(long)]
        concatenate: bool,

        /// Pipeline configuration file; supplies the fitted period
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List result files with their animal-ID prefixes
    Ids {
        /// Directory to scan
        dir: PathBuf,

        /// Characters forming the animal id
        #[arg(long, default_value_t = DEFAULT_PREFIX_LEN)]
        prefix_len: usize,
    },

    /// List available kernels
    Kernels {
        /// Filter by domain (e.g., circadian, behaviour)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file to start from
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    LogConfig::default()
        .with_level(LogLevel::from_verbosity(cli.verbose))
        .with_structured(cli.json_logs)
        .init()?;

    match cli.command {
        Commands::Split { input, out } => {
            cmd_split(&input, &out)?;
        }

        Commands::Process {
            input,
            out,
            config,
            jobs,
            wide,
            no_columnar,
        } => {
            let config = load_config(config.as_deref())?;
            let jobs = jobs.unwrap_or_else(default_jobs).max(1);
            cmd_process(&input, &out, config, jobs, wide, !no_columnar).await?;
        }

        Commands::Curves {
            input,
            start,
            periods,
            points,
            concatenate,
            config,
            out,
        } => {
            let config = load_config(config.as_deref())?;
            let layout = if concatenate {
                CurveLayout::Concatenate
            } else {
                CurveLayout::Overlay
            };
            let window = CurveWindow {
                start,
                periods,
                points,
                period_hours: config.cosinor.period_hours,
                layout,
            };
            cmd_curves(&input, window, out.as_deref())?;
        }

        Commands::Ids { dir, prefix_len } => {
            cmd_ids(&dir, prefix_len)?;
        }

        Commands::Kernels { domain } => {
            cmd_kernels(domain)?;
        }

        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// File configuration if given, otherwise the environment; validated either way.
fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?
            .with_env_overrides(),
        None => PipelineConfig::from_env(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))
}

fn cmd_split(input: &Path, out: &Path) -> anyhow::Result<()> {
    let (series, stats) =
        read_wide_path(input).with_context(|| format!("reading {}", input.display()))?;
    ensure_dir(out)?;

    let written = ReportWriter::new(out).write_split(&series)?;
    for path in &written {
        println!("{}", path.display());
    }
    info!(
        animals = written.len(),
        skipped_rows = stats.skipped_rows,
        skipped_cells = stats.skipped_cells,
        "split complete"
    );
    Ok(())
}

/// Load every source. A wide export must read cleanly; narrow files that
/// fail individually come back as skipped reports.
fn load_sources(input: &Path, wide: bool) -> anyhow::Result<SourceSet> {
    if wide {
        let (series, _) =
            read_wide_path(input).with_context(|| format!("reading {}", input.display()))?;
        return Ok(SourceSet {
            series,
            skipped: Vec::new(),
        });
    }
    load_narrow_sources(input).with_context(|| format!("reading {}", input.display()))
}

async fn cmd_process(
    input: &Path,
    out: &Path,
    config: PipelineConfig,
    jobs: usize,
    wide: bool,
    columnar: bool,
) -> anyhow::Result<()> {
    let SourceSet {
        series,
        skipped: mut reports,
    } = load_sources(input, wide)?;
    if series.is_empty() && reports.is_empty() {
        bail!("no input series found in {}", input.display());
    }
    ensure_dir(out)?;

    info!(animals = series.len(), jobs, "processing started");

    let config = Arc::new(config);
    let writer = Arc::new(ReportWriter::new(out).with_columnar(columnar));
    let permits = Arc::new(Semaphore::new(jobs));
    let mut tasks = JoinSet::new();

    for s in series {
        let permit = permits.clone().acquire_owned().await?;
        let config = config.clone();
        let writer = writer.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let report = AnimalDayPipeline::compute(&s, &config);
            let written = writer.write_report(&report, &config.cosinor.percentiles);
            (report, written)
        });
    }

    let mut failed_tasks = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (mut report, written) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "analysis task failed");
                failed_tasks += 1;
                continue;
            }
        };
        match written {
            Ok(files) => info!(
                animal_id = %report.animal_id,
                days = report.days_seen,
                records = report.cosinor_records.len(),
                events = report.drink_events.len(),
                files = files.len(),
                "animal complete"
            ),
            Err(e) => {
                let diagnostic = Diagnostic::for_source(
                    report.animal_id.clone(),
                    SkipReason::OutputFailed {
                        cause: e.to_string(),
                    },
                );
                warn!("{diagnostic}");
                report.diagnostics.push(diagnostic);
            }
        }
        reports.push(report);
    }

    reports.sort_by(|a, b| a.animal_id.cmp(&b.animal_id));
    let diagnostics: Vec<Diagnostic> = reports
        .iter()
        .flat_map(|r| r.diagnostics.iter().cloned())
        .collect();
    diagnostics_table(&diagnostics).save_csv(out.join("diagnostics.csv"))?;

    println!(
        "Processed {} animals: {} cosinor records, {} drink events, {} diagnostics",
        reports.iter().filter(|r| r.days_seen > 0).count(),
        reports.iter().map(|r| r.cosinor_records.len()).sum::<usize>(),
        reports.iter().map(|r| r.drink_events.len()).sum::<usize>(),
        diagnostics.len()
    );
    if failed_tasks > 0 {
        println!("{failed_tasks} analysis tasks failed; see the log");
    }
    Ok(())
}

/// Which records `curves` samples and how.
struct CurveWindow {
    start: usize,
    periods: usize,
    points: usize,
    period_hours: f64,
    layout: CurveLayout,
}

fn cmd_curves(input: &Path, window: CurveWindow, out: Option<&Path>) -> anyhow::Result<()> {
    let records =
        read_cosinor_path(input).with_context(|| format!("reading {}", input.display()))?;
    let curves = consecutive_curves(
        &records,
        window.start,
        window.periods,
        window.points,
        window.period_hours,
        window.layout,
    );
    if curves.is_empty() {
        warn!(
            records = records.len(),
            start = window.start,
            "no records in the requested range"
        );
    }

    let table = curve_table(&curves);
    match out {
        Some(path) => table.save_csv(path)?,
        None => table.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_ids(dir: &Path, prefix_len: usize) -> anyhow::Result<()> {
    let ids = scrape_ids(dir, prefix_len).with_context(|| format!("scanning {}", dir.display()))?;
    for id in &ids {
        println!("{}\t{}", id.animal_id, id.file_name);
    }
    Ok(())
}

fn cmd_kernels(domain_filter: Option<String>) -> anyhow::Result<()> {
    let registry = KernelRegistry::new();
    rumenkernel_temporal::register_all(&registry)?;

    let domains: Vec<Domain> = match domain_filter.as_deref() {
        Some(name) => match Domain::parse(name) {
            Some(domain) => vec![domain],
            None => {
                println!("Unknown domain. Available domains:");
                for d in Domain::ALL {
                    println!("  - {} ({})", d, d.id_prefix());
                }
                return Ok(());
            }
        },
        None => Domain::ALL.to_vec(),
    };

    for domain in domains {
        let kernels = registry.by_domain(domain);
        println!("{} ({} kernels)", domain, kernels.len());
        for kernel in &kernels {
            println!("  {:<34} {}", kernel.id, kernel.description);
        }
        println!();
    }

    println!("Total: {} kernels", registry.total_count());
    Ok(())
}
