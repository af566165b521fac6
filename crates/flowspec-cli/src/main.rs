// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use clap::{Parser, Subcommand, ValueEnum};
use flowspec_align::{AlignConfig, AlignmentEngine};
use flowspec_cli::commands::{load_contract_path, parse_duration};
use flowspec_cli::inputs::expand_traffic_inputs;
use flowspec_cli::report::{self, RenderOptions};
use flowspec_contract::{Aggregation, ContractError, to_yaml_string};
use flowspec_core::{RedactionConfig, RedactionPolicy};
use flowspec_error::{
    EXIT_CONTRACT_FORMAT, EXIT_PARSE_ERROR, EXIT_RUNTIME_ERROR, EXIT_USAGE_ERROR, FlowError,
};
use flowspec_explore::{ContractInducer, ExploreOptions};
use flowspec_ingest::{IngestOptions, LogFormat, TrafficIngestor};
use flowspec_stream::{CancellationToken, StreamError};
use flowspec_trace::TraceError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flowspec", version, about = "Service contract drift detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Induce a service contract from captured HTTP traffic.
    Explore {
        /// Traffic inputs: files, directories, or globs. Can be repeated.
        #[arg(long, required = true, num_args = 1..)]
        traffic: Vec<String>,

        /// Where to write the contract YAML.
        #[arg(long)]
        out: PathBuf,

        /// Log format preset: combined | common | custom.
        #[arg(long, default_value = "combined")]
        log_format: String,

        /// Custom log regex (required with --log-format custom).
        #[arg(long)]
        regex: Option<String>,

        /// Inclusive lower bound on record timestamps (RFC 3339).
        #[arg(long)]
        since: Option<String>,

        /// Inclusive upper bound on record timestamps (RFC 3339).
        #[arg(long)]
        until: Option<String>,

        /// Deterministic sampling rate in 0..=1.
        #[arg(long, default_value_t = 1.0)]
        sample_rate: f64,

        /// Response aggregation policy.
        #[arg(long, value_enum, default_value_t = AggregationArg::Auto)]
        status_aggregation: AggregationArg,

        /// Presence ratio at or above which a field is required.
        #[arg(long, default_value_t = 0.95)]
        required_threshold: f64,

        /// Minimum samples for an endpoint to be emitted.
        #[arg(long, default_value_t = 5)]
        min_samples: u64,

        /// Distinct-value ratio above which a path segment becomes {var}.
        #[arg(long, default_value_t = 0.8)]
        path_clustering_threshold: f64,

        /// Minimum occurrences before a segment may be parameterized.
        #[arg(long, default_value_t = 20)]
        min_sample_size: u64,

        /// Cap on tracked distinct values per segment position.
        #[arg(long, default_value_t = 10_000)]
        max_unique_values: usize,

        /// Service name for contract metadata.
        #[arg(long, default_value = "generated-service")]
        service_name: String,

        /// Service version for contract metadata.
        #[arg(long, default_value = "v1.0.0")]
        service_version: String,

        /// Sensitive header/query key to redact. Can be repeated.
        #[arg(long = "sensitive")]
        sensitive: Vec<String>,

        /// Redaction policy: drop | mask | hash (unknown values mean drop).
        #[arg(long, default_value = "drop")]
        redaction_policy: String,
    },

    /// Verify a trace against a contract file or directory.
    Verify {
        /// Contract file, or a directory of *.yaml contracts.
        #[arg(long)]
        path: PathBuf,

        /// Trace file (native or OTLP JSON).
        #[arg(long)]
        trace: PathBuf,

        /// Report format.
        #[arg(long, value_enum, default_value_t = OutputArg::Human)]
        output: OutputArg,

        /// CI mode: no colors, no timing, byte-stable output.
        #[arg(long)]
        ci: bool,

        /// Treat skipped operations as failures.
        #[arg(long)]
        strict: bool,

        /// Per-operation evaluation timeout (e.g. 500ms, 30s, 2m).
        #[arg(long, default_value = "30s")]
        timeout: String,

        /// Worker pool size.
        #[arg(long, default_value_t = 4)]
        max_workers: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggregationArg {
    Auto,
    Range,
    Exact,
}

impl From<AggregationArg> for Aggregation {
    fn from(value: AggregationArg) -> Self {
        match value {
            AggregationArg::Auto => Aggregation::Auto,
            AggregationArg::Range => Aggregation::Range,
            AggregationArg::Exact => Aggregation::Exact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Human,
    Json,
}

/// A command failure carrying its process exit code.
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn usage(message: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE_ERROR, message)
    }
}

impl From<FlowError> for Failure {
    fn from(err: FlowError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl From<ContractError> for Failure {
    fn from(err: ContractError) -> Self {
        let code = match err {
            ContractError::Io { .. } => EXIT_RUNTIME_ERROR,
            _ => EXIT_CONTRACT_FORMAT,
        };
        Self::new(code, err.to_string())
    }
}

impl From<TraceError> for Failure {
    fn from(err: TraceError) -> Self {
        let code = match err {
            TraceError::Io { .. } => EXIT_RUNTIME_ERROR,
            _ => EXIT_PARSE_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

impl From<StreamError> for Failure {
    fn from(err: StreamError) -> Self {
        let code = match err {
            StreamError::Cancelled => EXIT_RUNTIME_ERROR,
            StreamError::Terminal { .. } => EXIT_PARSE_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE_ERROR,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let filter = if cli.debug {
        EnvFilter::new("flowspec=debug")
    } else {
        EnvFilter::new("flowspec=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Locale is read once at startup and read-only afterwards.
    let lang = flowspec_core::lang::current();

    let outcome = match cli.command {
        Commands::Explore {
            traffic,
            out,
            log_format,
            regex,
            since,
            until,
            sample_rate,
            status_aggregation,
            required_threshold,
            min_samples,
            path_clustering_threshold,
            min_sample_size,
            max_unique_values,
            service_name,
            service_version,
            sensitive,
            redaction_policy,
        } => {
            cmd_explore(ExploreCmd {
                traffic,
                out,
                log_format,
                regex,
                since,
                until,
                sample_rate,
                status_aggregation,
                required_threshold,
                min_samples,
                path_clustering_threshold,
                min_sample_size,
                max_unique_values,
                service_name,
                service_version,
                sensitive,
                redaction_policy,
            })
            .await
        }
        Commands::Verify {
            path,
            trace,
            output,
            ci,
            strict,
            timeout,
            max_workers,
        } => {
            cmd_verify(VerifyCmd {
                path,
                trace,
                output,
                ci,
                strict,
                timeout,
                max_workers,
                lang,
            })
            .await
        }
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(failure) => {
            eprintln!("error: {}", failure.message);
            std::process::exit(failure.code);
        }
    }
}

struct ExploreCmd {
    traffic: Vec<String>,
    out: PathBuf,
    log_format: String,
    regex: Option<String>,
    since: Option<String>,
    until: Option<String>,
    sample_rate: f64,
    status_aggregation: AggregationArg,
    required_threshold: f64,
    min_samples: u64,
    path_clustering_threshold: f64,
    min_sample_size: u64,
    max_unique_values: usize,
    service_name: String,
    service_version: String,
    sensitive: Vec<String>,
    redaction_policy: String,
}

async fn cmd_explore(cmd: ExploreCmd) -> Result<i32, Failure> {
    if !(0.0..=1.0).contains(&cmd.sample_rate) {
        return Err(Failure::usage(format!(
            "--sample-rate must be in 0..=1, got {}",
            cmd.sample_rate
        )));
    }
    if !(0.0..=1.0).contains(&cmd.required_threshold) {
        return Err(Failure::usage(format!(
            "--required-threshold must be in 0..=1, got {}",
            cmd.required_threshold
        )));
    }

    let format = LogFormat::resolve(&cmd.log_format, cmd.regex.as_deref())?;
    let inputs = expand_traffic_inputs(&cmd.traffic)?;
    let since = cmd.since.as_deref().map(parse_rfc3339).transpose()?;
    let until = cmd.until.as_deref().map(parse_rfc3339).transpose()?;

    let ingestor = TrafficIngestor::new(IngestOptions {
        format,
        since,
        until,
        sample_rate: cmd.sample_rate,
        redaction: RedactionConfig::uniform(
            &cmd.sensitive,
            RedactionPolicy::parse_lossy(&cmd.redaction_policy),
        ),
        ..IngestOptions::default()
    });

    let mut inducer = ContractInducer::new(ExploreOptions {
        status_aggregation: cmd.status_aggregation.into(),
        required_threshold: cmd.required_threshold,
        min_endpoint_samples: cmd.min_samples,
        path_clustering_threshold: cmd.path_clustering_threshold,
        min_sample_size: cmd.min_sample_size,
        max_unique_values: cmd.max_unique_values,
        service_name: cmd.service_name,
        service_version: cmd.service_version,
    });

    let mut records = ingestor.ingest(inputs)?;
    inducer.drain(&mut records).await?;

    let metrics = ingestor.metrics();
    if metrics.is_incomplete() {
        tracing::warn!(
            error_rate = metrics.error_rate(),
            "explore run is incomplete: more than 10% of lines failed to parse"
        );
        eprintln!(
            "warning: ingestion incomplete — {}/{} lines failed to parse ({:.1}%)",
            metrics.error_lines,
            metrics.total_lines,
            metrics.error_rate() * 100.0
        );
        for sample in &metrics.error_samples {
            eprintln!("  line {}: {}", sample.line_number, sample.reason);
        }
    }

    let induced = inducer.emit();
    if let Some(advisory) = &induced.advisory {
        eprintln!("note: {advisory}");
    }

    let yaml = to_yaml_string(&induced.spec)?;
    if let Some(parent) = cmd.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| Failure::new(EXIT_RUNTIME_ERROR, format!("cannot create {}: {e}", parent.display())))?;
    }
    std::fs::write(&cmd.out, yaml).map_err(|e| {
        Failure::new(
            EXIT_RUNTIME_ERROR,
            format!("cannot write {}: {e}", cmd.out.display()),
        )
    })?;

    eprintln!(
        "explored {} lines ({} parsed) into {} endpoints -> {}",
        metrics.total_lines,
        metrics.parsed_lines,
        induced.spec.spec.endpoints.len(),
        cmd.out.display()
    );
    Ok(0)
}

struct VerifyCmd {
    path: PathBuf,
    trace: PathBuf,
    output: OutputArg,
    ci: bool,
    strict: bool,
    timeout: String,
    max_workers: usize,
    lang: flowspec_core::Lang,
}

async fn cmd_verify(cmd: VerifyCmd) -> Result<i32, Failure> {
    let timeout = parse_duration(&cmd.timeout).map_err(Failure::usage)?;
    if cmd.max_workers == 0 {
        return Err(Failure::usage("--max-workers must be at least 1"));
    }

    let spec = load_contract_path(&cmd.path)?;
    let trace = Arc::new(flowspec_trace::from_json_file(&cmd.trace)?);

    let engine = AlignmentEngine::new(AlignConfig {
        max_workers: cmd.max_workers,
        timeout,
        ..AlignConfig::default()
    });
    let verdict = engine
        .evaluate(&spec, trace, CancellationToken::new())
        .await;

    let options = RenderOptions {
        color: !cmd.ci,
        include_timing: !cmd.ci,
        lang: cmd.lang,
    };
    let rendered = match cmd.output {
        OutputArg::Human => report::render_human(&spec.metadata.name, &verdict, options),
        OutputArg::Json => report::render_json(&spec.metadata.name, &verdict, options),
    };
    print!("{rendered}");

    let mut code = verdict.exit_code();
    if cmd.strict && verdict.summary.skipped > 0 {
        // Strict runs refuse silently-unexercised operations.
        code = 1;
    }
    Ok(code)
}

fn parse_rfc3339(text: &str) -> Result<chrono::DateTime<chrono::Utc>, Failure> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Failure::usage(format!("invalid RFC 3339 timestamp {text:?}: {e}")))
}
