use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nmr_normalizer::assembler::AssemblerOptions;
use nmr_normalizer::config::{ConfigLoader, ResolvedConfig};
use nmr_normalizer::domain::{RecordOrder, SourceFormat};
use nmr_normalizer::error::NmrError;
use nmr_normalizer::output::{JsonOutput, OutputMode, TextOutput};
use nmr_normalizer::pipeline::{
    InputSpec, NormalizationPipeline, PipelineOptions, ProgressEvent, ProgressSink,
    discover_inputs, order_inputs,
};
use nmr_normalizer::providers::catalog;
use nmr_normalizer::sink::{self, OutputKind};

#[derive(Parser)]
#[command(name = "nmr-normalize")]
#[command(about = "Normalize NMR spectral records into one relational metabolite/spectrum schema")]
#[command(version, author)]
struct Cli {
    /// Input files or directories; replaces the inputs listed in the config file.
    inputs: Vec<PathBuf>,

    #[arg(long)]
    config: Option<String>,

    /// Force the format of positional inputs (star, nmrml, hmdb-xml, peak-text).
    #[arg(long)]
    format: Option<String>,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    output_kind: Option<OutputKind>,

    #[arg(long)]
    order: Option<String>,

    #[arg(long)]
    catalog: Option<PathBuf>,

    #[arg(long)]
    companion_dir: Option<PathBuf>,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<NmrError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &NmrError) -> u8 {
    match error {
        NmrError::MissingConfig
        | NmrError::ConfigRead(_)
        | NmrError::ConfigParse(_)
        | NmrError::InvalidFormat(_)
        | NmrError::InvalidOrder(_) => 2,
        NmrError::Sink(_) | NmrError::Integrity(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = load_config(&cli)?;
    let config = apply_overrides(config, &cli)?;
    if config.inputs.is_empty() {
        return Err(miette::Report::msg(
            "no inputs (pass paths or list them in nmr-normalize.json)",
        ));
    }

    let progress: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    };
    normalize(&config, progress, output_mode)
}

/// Positional inputs make the config file optional.
fn load_config(cli: &Cli) -> Result<ResolvedConfig, NmrError> {
    match ConfigLoader::resolve(cli.config.as_deref()) {
        Err(NmrError::MissingConfig) if !cli.inputs.is_empty() => Ok(ResolvedConfig::default()),
        other => other,
    }
}

fn apply_overrides(mut config: ResolvedConfig, cli: &Cli) -> Result<ResolvedConfig, NmrError> {
    let format = cli
        .format
        .as_deref()
        .map(str::parse::<SourceFormat>)
        .transpose()?;
    if !cli.inputs.is_empty() {
        config.inputs = cli
            .inputs
            .iter()
            .map(|path| InputSpec {
                path: path.clone(),
                format,
            })
            .collect();
    } else if let Some(format) = format {
        for input in &mut config.inputs {
            input.format = Some(format);
        }
    }
    if let Some(order) = cli.order.as_deref() {
        config.order = order.parse::<RecordOrder>()?;
    }
    if let Some(kind) = cli.output_kind {
        config.output.kind = kind;
    }
    if let Some(path) = &cli.output {
        config.output.path = path.clone();
    }
    if let Some(path) = &cli.catalog {
        config.catalog = Some(path.clone());
    }
    if let Some(path) = &cli.companion_dir {
        config.companion_dir = Some(path.clone());
    }
    Ok(config)
}

fn normalize(
    config: &ResolvedConfig,
    progress: &dyn ProgressSink,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let started = Instant::now();
    progress.event(ProgressEvent {
        message: "phase=Discover; scanning inputs".to_string(),
        elapsed: None,
    });
    let inputs = discover_inputs(&config.inputs, config.companion_dir.as_deref())?;
    let inputs = order_inputs(inputs, config.order);
    info!(files = inputs.len(), order = ?config.order, "inputs discovered");

    let mut pipeline = NormalizationPipeline::new(PipelineOptions {
        assembler: AssemblerOptions {
            default_linewidth: config.default_linewidth,
            max_linewidth: config.max_linewidth,
        },
        placeholder_titles: config.placeholder_titles.clone(),
    });
    if let Some(path) = &config.catalog {
        pipeline.seed_catalog(catalog::load(path)?);
    }
    pipeline.run(&inputs, progress);

    let mut sink = sink::open(config.output.kind, &config.output.path)?;
    let summary = pipeline.finish(sink.as_mut(), progress)?;
    progress.event(ProgressEvent {
        message: "phase=Done".to_string(),
        elapsed: Some(started.elapsed()),
    });

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary).into_diagnostic()?,
    }
    Ok(())
}
