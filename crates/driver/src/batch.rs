use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{error, info};
use pyexec_shared_types::api::batch_results::{BatchResults, ProjectRecord};
use pyexec_shared_types::InferenceConf;

use crate::aggregate::{infer_environment, EnvironmentInference};
use crate::async_write_json_file;

pub const RESULTS_FILE: &str = "results.json";

pub fn project_name(project_dir: &Path) -> String {
    project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| project_dir.to_string_lossy().to_string())
}

pub fn dockerfile_name(name: &str) -> String {
    format!("Dockerfile_{}", name)
}

pub fn project_record(
    name: String,
    project_dir: &Path,
    inference: &EnvironmentInference,
    dockerfile_path: Option<&Path>,
) -> ProjectRecord {
    let spec = inference.build_spec.as_ref();
    ProjectRecord {
        name,
        project_dir: project_dir.to_string_lossy().to_string(),
        dockerfile_source: inference.source,
        probe_status: Some(inference.probe_status),
        dockerfile_path: dockerfile_path.map(|p| p.to_string_lossy().to_string()),
        pip_dependencies: spec.map(|s| s.pip_dependency_count()).unwrap_or_default(),
        apt_dependencies: spec.map(|s| s.apt_dependency_count()).unwrap_or_default(),
        error: None,
    }
}

fn log_io_failure(path: &Path, e: &std::io::Error) {
    if e.kind() == ErrorKind::PermissionDenied {
        error!(
            "Cannot write to {:?}, this requires manual intervention: {}",
            path, e
        );
    } else {
        error!("Unable to write {:?}: {}", path, e);
    }
}

async fn process_project(
    project_dir: PathBuf,
    output_dir: &Path,
    conf: Arc<InferenceConf>,
) -> ProjectRecord {
    let name = project_name(&project_dir);
    let display_dir = project_dir.to_string_lossy().to_string();

    // Own task so a panic only loses this project.
    let task_dir = project_dir.clone();
    let joined = tokio::spawn(async move { infer_environment(&task_dir, &conf).await }).await;

    let inference = match joined {
        Ok(Ok(inference)) => inference,
        Ok(Err(e)) => {
            error!("Inference for {} failed: {}", name, e);
            return ProjectRecord::failed(name, display_dir, e.to_string());
        }
        Err(e) => {
            error!("Inference for {} aborted: {}", name, e);
            return ProjectRecord::failed(name, display_dir, e.to_string());
        }
    };

    let dockerfile_path = match &inference.build_spec {
        Some(spec) => {
            let path = output_dir.join(dockerfile_name(&name));
            if let Err(e) = tokio::fs::write(&path, spec.to_dockerfile()).await {
                log_io_failure(&path, &e);
                let mut record = project_record(name, &project_dir, &inference, None);
                record.error = Some(e.to_string());
                return record;
            }
            Some(path)
        }
        None => None,
    };
    project_record(name, &project_dir, &inference, dockerfile_path.as_deref())
}

/// Infers every listed project in turn and writes `Dockerfile_<name>` files and
/// `results.json` to `output_dir`.
pub async fn run_batch(
    project_dirs: Vec<PathBuf>,
    output_dir: &Path,
    conf: Arc<InferenceConf>,
) -> Result<BatchResults> {
    if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
        log_io_failure(output_dir, &e);
        return Err(e).with_context(|| format!("Creating output directory {:?}", output_dir));
    }

    let mut results = BatchResults::default();
    let total = project_dirs.len();
    for (idx, project_dir) in project_dirs.into_iter().enumerate() {
        let st = Instant::now();
        info!("[{}/{}] Processing {:?}", idx + 1, total, project_dir);
        let record = process_project(project_dir, output_dir, conf.clone()).await;
        info!(
            "[{}/{}] {} -> {} in {:?}",
            idx + 1,
            total,
            record.name,
            record.dockerfile_source,
            st.elapsed()
        );
        results.push(record);
    }

    let results_path = output_dir.join(RESULTS_FILE);
    async_write_json_file(&results_path, &results)
        .await
        .with_context(|| format!("Writing {:?}", results_path))?;

    let summary: BTreeMap<_, _> = results.sources.iter().collect();
    for (source, count) in summary {
        info!("{:>18}: {}", source.as_str(), count);
    }
    if results.failures > 0 {
        info!("{:>18}: {}", "failed", results.failures);
    }
    Ok(results)
}

/// One project directory per line; blank lines and `#` comments are skipped.
/// Relative entries resolve against `base`.
pub fn read_project_list(content: &str, base: &Path) -> Vec<PathBuf> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| crate::maybe_add_working_directory(base, Path::new(l)).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_list_parsing() {
        let dirs = read_project_list("# mined 2020-05\n/abs/one\n\n  two  \n", Path::new("/base"));
        assert_eq!(
            dirs,
            vec![PathBuf::from("/abs/one"), PathBuf::from("/base/two")]
        );
    }

    #[test]
    fn names() {
        assert_eq!(project_name(Path::new("/work/Flask-Login")), "Flask-Login");
        assert_eq!(dockerfile_name("Flask-Login"), "Dockerfile_Flask-Login");
    }
}
