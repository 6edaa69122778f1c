use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::DependencySource;

/// How the probe phase ended for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Success,
    NoEnvironment,
    Timeout,
    MalformedProbeOutput,
}

/// One row of `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub project_dir: String,
    pub dockerfile_source: DependencySource,
    #[serde(default)]
    pub probe_status: Option<ProbeStatus>,
    #[serde(default)]
    pub dockerfile_path: Option<String>,
    #[serde(default)]
    pub pip_dependencies: usize,
    #[serde(default)]
    pub apt_dependencies: usize,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProjectRecord {
    pub fn failed(name: String, project_dir: String, error: String) -> ProjectRecord {
        ProjectRecord {
            name,
            project_dir,
            dockerfile_source: DependencySource::NotFound,
            probe_status: None,
            dockerfile_path: None,
            pip_dependencies: 0,
            apt_dependencies: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResults {
    pub projects: Vec<ProjectRecord>,
    #[serde(serialize_with = "crate::serde_helpers::ordered_map")]
    pub sources: HashMap<DependencySource, usize>,
    pub failures: usize,
}

impl BatchResults {
    pub fn push(&mut self, record: ProjectRecord) {
        if record.error.is_some() {
            self.failures += 1;
        } else {
            *self.sources.entry(record.dockerfile_source).or_default() += 1;
        }
        self.projects.push(record);
    }
}
