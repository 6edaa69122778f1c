use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use pyexec_shared_types::api::extracted_dependencies::ExtractedDependencies;
use pyexec_shared_types::DependencySet;

mod balanced;
pub mod config_file;
mod pipfile;
mod requirements_txt;
mod setup_py;

pub use balanced::{balanced_group, BalancedGroup};
pub use config_file::{ConfigFile, ConfigFileError, ConfigParser, ParseFailure, ParsedDependency};
pub use pipfile::Pipfile;
pub use requirements_txt::RequirementsTxt;
pub use setup_py::SetupPy;

/// Runs one parser against `<project_dir>/<FILE_NAME>`. A missing file is
/// silently empty, a file that cannot be opened is logged and empty.
fn infer_with<P: ConfigParser>(project_dir: &Path) -> DependencySet {
    let path = project_dir.join(P::FILE_NAME);
    if !path.exists() {
        return DependencySet::default();
    }
    match P::open(&path) {
        Ok(parser) => parser.infer_dependencies(),
        Err(e) => {
            warn!("Skipping {:?}: {}", path, e);
            DependencySet::default()
        }
    }
}

/// The static fallback chain: Pipfile, then setup.py, then requirements.txt.
/// The first non-empty stage wins.
pub fn infer_from_config_files(project_dir: &Path) -> ExtractedDependencies {
    let stages: [(fn(&Path) -> DependencySet, _); 3] = [
        (infer_with::<Pipfile>, Pipfile::SOURCE),
        (infer_with::<SetupPy>, SetupPy::SOURCE),
        (infer_with::<RequirementsTxt>, RequirementsTxt::SOURCE),
    ];

    for (infer, source) in stages {
        let dependencies = infer(project_dir);
        if !dependencies.is_empty() {
            info!(
                "Found {} dependencies for {:?} in {}",
                dependencies.len(),
                project_dir,
                source
            );
            return ExtractedDependencies {
                source,
                dependencies,
            };
        }
    }
    ExtractedDependencies::not_found()
}

pub async fn extract_static(project_dir: PathBuf, output: PathBuf) -> Result<()> {
    if !project_dir.is_dir() {
        anyhow::bail!("Path {:?} does not refer to an existing directory", project_dir);
    }
    let extracted = infer_from_config_files(&project_dir);
    tokio::fs::write(&output, serde_json::to_string_pretty(&extracted)?)
        .await
        .with_context(|| format!("While attempting to write {:?}", output))?;
    Ok(())
}
