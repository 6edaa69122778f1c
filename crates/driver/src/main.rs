use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use pyexec_driver::{batch, infer_environment, read_all_inference_conf, write_json_file};
use pyexec_shared_types::{BuildSpec, InferenceConf};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer the environment of one project
    Infer(InferArgs),
    /// Infer the environments of every project listed in a file
    Batch(BatchArgs),
    /// Combine existing Dockerfiles into one
    Merge(MergeArgs),
    /// Only read Pipfile, setup.py and requirements.txt
    Static(StaticArgs),
}

#[derive(Debug, Args)]
pub struct InferArgs {
    #[clap(long)]
    project_dir: PathBuf,

    /// Where to write the Dockerfile, stdout when absent
    #[clap(long)]
    output: Option<PathBuf>,

    /// Also write a json record of how the environment was found
    #[clap(long)]
    record: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// File with one project directory per line
    #[clap(long)]
    project_list: PathBuf,

    #[clap(long)]
    output_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[clap(long, required = true)]
    dockerfile: Vec<PathBuf>,

    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StaticArgs {
    #[clap(long)]
    project_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Opt {
    /// Json inference config, may pull in others through `includes`
    #[clap(long)]
    config: Option<PathBuf>,

    /// Probe executable, overrides the config
    #[clap(long)]
    probe: Option<String>,

    /// Budget for probing one project, overrides the config
    #[clap(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

fn load_conf(opt: &Opt) -> Result<InferenceConf> {
    let working_directory = std::env::current_dir()?;
    let mut conf = match &opt.config {
        Some(path) => read_all_inference_conf(path, &working_directory)?,
        None => InferenceConf::default(),
    };
    if let Some(probe) = &opt.probe {
        conf.probe.command = probe.clone();
    }
    if let Some(timeout_secs) = opt.timeout_secs {
        conf.timeout_secs = Some(timeout_secs);
    }
    Ok(conf)
}

fn write_or_print(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Writing {:?}", path))
        }
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

async fn infer(args: &InferArgs, conf: &InferenceConf) -> Result<()> {
    let inference = infer_environment(&args.project_dir, conf).await?;
    match &inference.build_spec {
        Some(spec) => write_or_print(args.output.as_ref(), &spec.to_dockerfile())?,
        None => warn!("No environment could be inferred for {:?}", args.project_dir),
    }
    if let Some(record_path) = &args.record {
        let record = batch::project_record(
            batch::project_name(&args.project_dir),
            &args.project_dir,
            &inference,
            args.output.as_deref().filter(|_| inference.build_spec.is_some()),
        );
        write_json_file(record_path, &record)?;
    }
    Ok(())
}

async fn run_batch(args: &BatchArgs, conf: InferenceConf) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.project_list)
        .await
        .with_context(|| format!("Reading project list {:?}", args.project_list))?;
    let project_dirs = batch::read_project_list(&content, &std::env::current_dir()?);
    let results = batch::run_batch(project_dirs, &args.output_dir, Arc::new(conf)).await?;
    info!(
        "Processed {} projects, {} failed",
        results.projects.len(),
        results.failures
    );
    Ok(())
}

fn merge(args: &MergeArgs) -> Result<()> {
    let specs = args
        .dockerfile
        .iter()
        .map(|p| {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("Reading {:?}", p))?;
            BuildSpec::parse(&content).with_context(|| format!("Parsing {:?}", p))
        })
        .collect::<Result<Vec<_>>>()?;
    let merged = BuildSpec::merge(&specs)?;
    write_or_print(args.output.as_ref(), &merged.to_dockerfile())
}

fn static_only(args: &StaticArgs) -> Result<()> {
    if !args.project_dir.is_dir() {
        anyhow::bail!(
            "Path {:?} does not refer to an existing directory",
            args.project_dir
        );
    }
    let extracted = pyexec_static_extractor::infer_from_config_files(&args.project_dir);
    println!("{}", serde_json::to_string_pretty(&extracted)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.format_timestamp_nanos();
    builder.target(pretty_env_logger::env_logger::Target::Stderr);
    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.parse_filters(
            "warn,pyexec_driver=info,pyexec_static_extractor=info,pyexec_shared_types=info",
        );
    }
    builder.init();

    let conf = load_conf(&opt)?;

    let start_time = Instant::now();
    match &opt.command {
        Commands::Infer(args) => infer(args, &conf).await?,
        Commands::Batch(args) => run_batch(args, conf).await?,
        Commands::Merge(args) => merge(args)?,
        Commands::Static(args) => static_only(args)?,
    };

    info!("Command {:?} took {:?}", opt.command, start_time.elapsed());
    Ok(())
}
