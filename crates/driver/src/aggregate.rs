use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use pyexec_shared_types::api::batch_results::ProbeStatus;
use pyexec_shared_types::{BuildSpec, DependencySource, InferenceConf};

use crate::infer_dockerfile::{InferDockerfile, InferenceError};

/// What the fallback chain settled on for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInference {
    /// `None` when neither probing nor the config files produced anything.
    pub build_spec: Option<BuildSpec>,
    pub source: DependencySource,
    pub probe_status: ProbeStatus,
}

fn probe_status(error: &InferenceError) -> ProbeStatus {
    match error {
        InferenceError::Timeout { .. } => ProbeStatus::Timeout,
        InferenceError::MalformedProbeOutput { .. } => ProbeStatus::MalformedProbeOutput,
        _ => ProbeStatus::NoEnvironment,
    }
}

/// Probe first; when probing yields nothing usable, read Pipfile, setup.py and
/// requirements.txt and pin the result to the default base image.
pub async fn infer_environment(
    project_dir: &Path,
    conf: &InferenceConf,
) -> Result<EnvironmentInference, InferenceError> {
    let mut fallback = BuildSpec::from_python_version(&conf.default_python_version)
        .map_err(InferenceError::InvalidDefaultBaseImage)?;
    let inferer = InferDockerfile::new(project_dir, conf)?;

    let probe_status = match inferer
        .infer_dockerfile(conf.timeout_secs.map(Duration::from_secs))
        .await
    {
        Ok(build_spec) => {
            return Ok(EnvironmentInference {
                build_spec: Some(build_spec),
                source: DependencySource::Probe,
                probe_status: ProbeStatus::Success,
            })
        }
        Err(e) if e.allows_fallback() => {
            info!("{}, reading config files instead", e);
            probe_status(&e)
        }
        Err(e) => return Err(e),
    };

    let extracted = pyexec_static_extractor::infer_from_config_files(inferer.project_dir());
    if extracted.is_empty() {
        info!("No inferable environment for {:?}", inferer.project_dir());
        return Ok(EnvironmentInference {
            build_spec: None,
            source: DependencySource::NotFound,
            probe_status,
        });
    }

    for dependency in extracted.dependencies.iter() {
        if let Err(e) =
            fallback.add_pip_dependency(dependency.name.clone(), dependency.version.clone())
        {
            warn!("Skipping {} from {}: {}", dependency, extracted.source, e);
        }
    }
    Ok(EnvironmentInference {
        build_spec: Some(fallback),
        source: extracted.source,
        probe_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn falls_back_to_config_files() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        std::fs::write(
            tmpdir.path().join("Pipfile"),
            "[packages]\nrequests = \"==2.25.1\"\nclick = \"*\"\n",
        )
        .unwrap();

        let inference = infer_environment(tmpdir.path(), &InferenceConf::default())
            .await
            .unwrap();
        assert_eq!(inference.source, DependencySource::Pipfile);
        assert_eq!(inference.probe_status, ProbeStatus::NoEnvironment);
        assert_eq!(
            inference.build_spec.unwrap().to_dockerfile(),
            r#"FROM python:3.8
RUN ["apt-get", "update"]
RUN ["python", "-m", "pip", "install", "--upgrade", "pip"]
RUN ["pip","install","requests==2.25.1"]
RUN ["pip","install","click"]
"#
        );
    }

    #[tokio::test]
    async fn fallback_dockerfiles_parse_back() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        std::fs::write(tmpdir.path().join("requirements.txt"), "foo==1!2.0\nflask\n").unwrap();

        let inference = infer_environment(tmpdir.path(), &InferenceConf::default())
            .await
            .unwrap();
        assert_eq!(inference.source, DependencySource::RequirementsTxt);
        let spec = inference.build_spec.unwrap();
        assert_eq!(spec.pip_packages().version("foo"), Some("1!2.0"));
        assert_eq!(BuildSpec::parse(&spec.to_dockerfile()), Ok(spec));
    }

    #[tokio::test]
    async fn option_lines_and_private_names_fail_the_file() {
        for content in ["--pre\nflask\n", "_private==1.0\n"] {
            let tmpdir = tempdir().expect("Failed to create temp directory");
            std::fs::write(tmpdir.path().join("requirements.txt"), content).unwrap();

            let inference = infer_environment(tmpdir.path(), &InferenceConf::default())
                .await
                .unwrap();
            assert_eq!(inference.source, DependencySource::NotFound);
            assert_eq!(inference.build_spec, None);
        }
    }

    #[tokio::test]
    async fn nothing_to_infer() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        let inference = infer_environment(tmpdir.path(), &InferenceConf::default())
            .await
            .unwrap();
        assert_eq!(
            inference,
            EnvironmentInference {
                build_spec: None,
                source: DependencySource::NotFound,
                probe_status: ProbeStatus::NoEnvironment,
            }
        );
    }

    #[tokio::test]
    async fn bad_default_version_is_a_configuration_error() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        let conf = InferenceConf {
            default_python_version: "latest".to_string(),
            ..InferenceConf::default()
        };
        assert!(matches!(
            infer_environment(tmpdir.path(), &conf).await,
            Err(InferenceError::InvalidDefaultBaseImage(_))
        ));
    }
}
