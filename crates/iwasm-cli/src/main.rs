//! iwasm Command-Line Interface
//!
//! This CLI provides tools for:
//! - Running the two-stage pipeline of a processor module
//! - Running only the `prepare_data` stage and saving its output
//! - Checking that a module file loads and exports the processor ABI

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use clap::{Parser, Subcommand, ValueEnum};
use iwasm_runtime::wasm::Runtime;
use iwasm_runtime::{Aggregation, Pipeline, PipelineRequest, RuntimeConfig, RuntimeHandle};
use tracing::info;

#[derive(Parser)]
#[command(name = "iwasm")]
#[command(author, version, about = "Sandboxed WebAssembly processor runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Runtime preset
    #[arg(long, value_enum, default_value = "networked", global = true)]
    preset: Preset,

    /// JSON runtime config file (overrides --preset)
    #[arg(long, global = true)]
    runtime_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Minimal,
    Networked,
    Development,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare every source, then aggregate them
    Run {
        /// Processor module (.wasm or .wat)
        #[arg(short, long)]
        module: PathBuf,

        /// Config passed to both stages
        #[arg(short, long, default_value = "IntelliX")]
        config: String,

        /// Source request for prepare_data (repeatable)
        #[arg(short, long, required = true)]
        source: Vec<String>,

        /// Request tag for aggregate
        #[arg(short, long, default_value = "first")]
        request: String,

        /// Write the raw result bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run only prepare_data for one source
    Prepare {
        /// Processor module (.wasm or .wat)
        #[arg(short, long)]
        module: PathBuf,

        /// Config passed to prepare_data
        #[arg(short, long, default_value = "IntelliX")]
        config: String,

        /// Source request
        #[arg(short, long)]
        source: String,

        /// Output file for the prepared bytes (or - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Load a module and list its exports
    Check {
        /// Processor module (.wasm or .wat)
        #[arg(short, long)]
        module: PathBuf,
    },
}

fn load_runtime_config(preset: Preset, path: Option<&Path>) -> Result<RuntimeConfig> {
    if let Some(path) = path {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read runtime config {}", path.display()))?;
        return RuntimeConfig::from_json(&bytes)
            .with_context(|| format!("Invalid runtime config {}", path.display()));
    }
    Ok(match preset {
        Preset::Minimal => RuntimeConfig::minimal(),
        Preset::Networked => RuntimeConfig::networked(),
        Preset::Development => RuntimeConfig::development(),
    })
}

fn read_module(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read module {}", path.display()))
}

fn decode_result(aggregation: &Aggregation) -> Option<f64> {
    (aggregation.result.len() == 8).then(|| LittleEndian::read_f64(&aggregation.result))
}

fn cmd_run(
    config: RuntimeConfig,
    module: PathBuf,
    processor_config: String,
    sources: Vec<String>,
    request: String,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut pipeline_request = PipelineRequest::new(read_module(&module)?)
        .config(processor_config)
        .request(request);
    for source in sources {
        pipeline_request = pipeline_request.source(source);
    }

    info!("Running {} with {} source(s)", module.display(), pipeline_request.sources.len());
    let output_data = Pipeline::new(config).run(&pipeline_request)?;
    let aggregation = &output_data.aggregation;
    let value = decode_result(aggregation);

    if let Some(path) = output {
        fs::write(&path, &aggregation.result).context("Failed to write output file")?;
        info!("Wrote {} result bytes to {}", aggregation.result.len(), path.display());
    }

    if json {
        let report = serde_json::json!({
            "value": value,
            "result": hex::encode(&aggregation.result),
            "digest": hex::encode(&aggregation.digest),
            "prepared_bytes": output_data.prepared.iter().map(Vec::len).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Pipeline Result ===");
    match value {
        Some(value) => println!("Value:  {}", value),
        None => println!("Result: {}", hex::encode(&aggregation.result)),
    }
    println!("Digest: {}", hex::encode(&aggregation.digest));
    for (index, prepared) in output_data.prepared.iter().enumerate() {
        println!("Source {}: {} bytes prepared", index, prepared.len());
    }
    Ok(())
}

fn cmd_prepare(
    config: RuntimeConfig,
    module: PathBuf,
    processor_config: String,
    source: String,
    output: PathBuf,
) -> Result<()> {
    let wasm = read_module(&module)?;
    let runtime = RuntimeHandle::with_config(&config)?;
    runtime.check().context("Failed to create runtime")?;
    let instance = runtime.create_instance(&wasm)?;
    instance.check().context("Failed to load module")?;

    let data = instance
        .prepare_data(processor_config.as_bytes(), source.as_bytes())?
        .into_data()
        .context("prepare_data failed")?;

    if output.as_os_str() == "-" {
        use std::io::Write;
        std::io::stdout().write_all(&data)?;
    } else {
        fs::write(&output, &data).context("Failed to write output file")?;
        info!("Wrote {} bytes to {}", data.len(), output.display());
    }
    Ok(())
}

fn cmd_check(config: RuntimeConfig, module: PathBuf) -> Result<()> {
    let wasm = read_module(&module)?;
    let runtime = Runtime::new(config)?;
    let instance = runtime
        .create_instance(&wasm)
        .with_context(|| format!("{} is not a processor module", module.display()))?;

    println!("=== {} ===", module.display());
    println!("Size: {} bytes", wasm.len());
    println!("Exported functions:");
    for name in instance.exported_functions() {
        println!("  {}", name);
    }
    if let Some(fuel) = instance.remaining_fuel() {
        println!("Fuel budget per call: {}", fuel);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_runtime_config(cli.preset, cli.runtime_config.as_deref())?;

    match cli.command {
        Commands::Run {
            module,
            config: processor_config,
            source,
            request,
            output,
            json,
        } => cmd_run(config, module, processor_config, source, request, output, json),

        Commands::Prepare {
            module,
            config: processor_config,
            source,
            output,
        } => cmd_prepare(config, module, processor_config, source, output),

        Commands::Check { module } => cmd_check(config, module),
    }
}
