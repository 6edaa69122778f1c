use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use pyexec_shared_types::instruction::BASE_IMAGE_PREFIX;
use pyexec_shared_types::{BuildSpec, BuildSpecError, InferenceConf};
use thiserror::Error;

use crate::probe::{Probe, ProbeInvocation, ProbeOutcome};
use crate::project_files::ProjectFiles;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("There is no file or directory named {0:?}")]
    DirectoryNotFound(PathBuf),
    #[error("The project path {0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("Unable to resolve project path {path:?}")]
    InvalidProjectPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid exclusion glob")]
    InvalidGlob(#[from] globset::Error),
    #[error("The probe was unable to infer a working environment for {0:?}")]
    NoEnvironment(PathBuf),
    #[error("Probing timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
    #[error("The probe produced an invalid Dockerfile for {file:?}")]
    MalformedProbeOutput {
        file: PathBuf,
        #[source]
        source: BuildSpecError,
    },
    #[error("Unable to combine the per-file environments")]
    Aggregation(#[source] BuildSpecError),
    #[error("Invalid default Python version")]
    InvalidDefaultBaseImage(#[source] BuildSpecError),
}

impl InferenceError {
    /// Outcomes after which static config parsing is still worth trying.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            InferenceError::NoEnvironment(_)
                | InferenceError::Timeout { .. }
                | InferenceError::MalformedProbeOutput { .. }
        )
    }
}

/// Probes every Python file of one project and merges what the probe reports.
pub struct InferDockerfile {
    project_dir: PathBuf,
    project_name: String,
    files: ProjectFiles,
    probe: Probe,
}

impl InferDockerfile {
    pub fn new(project_dir: &Path, conf: &InferenceConf) -> Result<InferDockerfile, InferenceError> {
        if !project_dir.exists() {
            return Err(InferenceError::DirectoryNotFound(project_dir.to_path_buf()));
        }
        if !project_dir.is_dir() {
            return Err(InferenceError::NotADirectory(project_dir.to_path_buf()));
        }
        let project_dir =
            project_dir
                .canonicalize()
                .map_err(|source| InferenceError::InvalidProjectPath {
                    path: project_dir.to_path_buf(),
                    source,
                })?;
        let project_name = project_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(InferDockerfile {
            files: ProjectFiles::new(&project_dir, conf)?,
            probe: Probe::new(conf.probe.clone()),
            project_dir,
            project_name,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// `timeout` bounds the whole run, not each file.
    pub async fn infer_dockerfile(
        &self,
        timeout: Option<Duration>,
    ) -> Result<BuildSpec, InferenceError> {
        info!("Start inferring dependencies for {:?}", self.project_dir);
        let start_time = Instant::now();

        let files = self.files.python_files();
        if files.is_empty() {
            return Err(InferenceError::NoEnvironment(self.project_dir.clone()));
        }
        debug!("Files found: {:?}", files);
        let python_path = self.files.python_path(self.probe.mount_point());

        let mut specs = Vec::default();
        for file in files.iter() {
            let budget = match timeout {
                Some(t) => {
                    let remaining = t.saturating_sub(start_time.elapsed());
                    if remaining.is_zero() {
                        return Err(InferenceError::Timeout {
                            elapsed: start_time.elapsed(),
                        });
                    }
                    Some(remaining)
                }
                None => None,
            };

            debug!("Inferring file {:?}", file);
            let invocation = ProbeInvocation {
                project_dir: &self.project_dir,
                python_path: &python_path,
                project_name: &self.project_name,
                file,
            };
            let stdout = match self.probe.run(&invocation, budget).await {
                Ok(ProbeOutcome::Completed { status, stdout }) => {
                    if !status.success() {
                        debug!("Probe exited with {} for {:?}", status, file);
                    }
                    stdout
                }
                Ok(ProbeOutcome::TimedOut) => {
                    return Err(InferenceError::Timeout {
                        elapsed: start_time.elapsed(),
                    })
                }
                Err(e) => {
                    warn!("Unable to run the probe on {:?}: {}", file, e);
                    continue;
                }
            };

            let first_line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
            if !first_line.map_or(false, |l| l.starts_with(BASE_IMAGE_PREFIX)) {
                debug!("No environment reported for {:?}", file);
                continue;
            }
            let spec = BuildSpec::parse_dependencies_only(&stdout).map_err(|source| {
                InferenceError::MalformedProbeOutput {
                    file: file.clone(),
                    source,
                }
            })?;
            specs.push(spec);
        }

        if specs.is_empty() {
            return Err(InferenceError::NoEnvironment(self.project_dir.clone()));
        }
        let merged = BuildSpec::merge(&specs).map_err(InferenceError::Aggregation)?;
        info!(
            "Inferred {} pip and {} apt dependencies from {} files in {:?}",
            merged.pip_dependency_count(),
            merged.apt_dependency_count(),
            specs.len(),
            start_time.elapsed()
        );
        Ok(merged)
    }
}
