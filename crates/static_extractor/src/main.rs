use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use pyexec_static_extractor as se;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Opt {
    /// Checkout of the project to read Pipfile, setup.py and requirements.txt from
    #[clap(long)]
    project_dir: PathBuf,

    #[clap(long)]
    output: PathBuf,
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
        builder.parse_filters("warn,pyexec_static_extractor=info,pyexec_shared_types=info");
    }
    builder.init();

    let start_time = Instant::now();

    se::extract_static(opt.project_dir, opt.output).await?;

    info!("Static extraction took {:?}", start_time.elapsed());
    Ok(())
}
