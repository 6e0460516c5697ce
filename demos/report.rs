use std::{
    fs::{self, File},
    io::BufWriter,
    process,
};

use anyhow::{bail, Context, Result};
use mlflow_reports::{
    aggregate::{Aggregate, AggregateOptions, Aggregator, ExecutionContext, Mode},
    backend::rest::{Server, ServerConfig},
    enrich::{links::LinkBuilder, Enricher},
    report::{self, Document},
};

struct Args {
    model: Option<String>,
    model_uri: Option<String>,
    output_file: String,
    output_data_file: Option<String>,
    options: AggregateOptions,
}

impl Args {
    pub fn from_env() -> Result<Self> {
        let mut args = pico_args::Arguments::from_env();
        let raw = args.contains("--raw");
        let parsed = Args {
            model: args.opt_value_from_str("--model")?,
            model_uri: args.opt_value_from_str("--model-uri")?,
            output_file: args
                .opt_value_from_str("--output-file")?
                .unwrap_or_else(|| "report.md".to_string()),
            output_data_file: args.opt_value_from_str("--output-data-file")?,
            options: AggregateOptions {
                include_run: args.contains("--run"),
                artifact_depth: args.opt_value_from_str("--artifact-max-level")?.unwrap_or(-1),
                include_all_versions: args.contains("--versions"),
                include_latest_versions: args.contains("--latest-versions"),
                include_permissions: args.contains("--permissions"),
                mode: if raw { Mode::Raw } else { Mode::Normalized },
            },
        };
        args.finish()?;
        Ok(parsed)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("Failed to build the report: {:#}", error);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::from_env()?;
    let config = ServerConfig::from_env()?;
    let context = ExecutionContext::from_tracking_uri(config.host());
    let enricher = Enricher::new(LinkBuilder::new(config.host()));
    let mut client = Server::with_config(config);
    let mut aggregator = Aggregator::new(&mut client).with_enricher(enricher).with_context(context);

    let document = match (&args.model_uri, &args.model) {
        (Some(uri), _) => report::build_model_report(&mut aggregator, uri, &args.options)?,
        (None, Some(name)) if args.options.mode == Mode::Raw => {
            let aggregate = aggregator.aggregate(name, &args.options)?;
            return write_raw(&aggregate, args.output_data_file.as_deref());
        }
        (None, Some(name)) => report::build_registered_model_report(&mut aggregator, name, &args.options)?,
        (None, None) => bail!("either --model or --model-uri is required"),
    };
    write_document(&document, &args.output_file, args.output_data_file.as_deref())
}

// both outputs are rendered before any file is created
fn write_document(document: &Document, output_file: &str, output_data_file: Option<&str>) -> Result<()> {
    let mut markdown = Vec::new();
    document.write_markdown(&mut markdown)?;
    let data = match output_data_file {
        Some(path) => {
            let mut data = Vec::new();
            document.write_data(&mut data)?;
            Some((path, data))
        }
        None => None,
    };

    fs::write(output_file, markdown).with_context(|| format!("cannot write {}", output_file))?;
    println!("Report written to {}", output_file);
    if let Some((path, data)) = data {
        fs::write(path, data).with_context(|| format!("cannot write {}", path))?;
        println!("Report data written to {}", path);
    }
    Ok(())
}

fn write_raw(aggregate: &Aggregate, output_data_file: Option<&str>) -> Result<()> {
    match output_data_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create {}", path))?;
            serde_json::to_writer_pretty(BufWriter::new(file), aggregate)?;
            println!("Raw registered model written to {}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(aggregate)?),
    }
    Ok(())
}
