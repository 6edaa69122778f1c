use serde::{Deserialize, Serialize};

/// Which stage of the inference waterfall produced a project's dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencySource {
    Probe,
    Pipfile,
    #[serde(rename = "setup.py")]
    SetupPy,
    #[serde(rename = "requirements.txt")]
    RequirementsTxt,
    #[serde(rename = "None")]
    NotFound,
}

impl DependencySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencySource::Probe => "Probe",
            DependencySource::Pipfile => "Pipfile",
            DependencySource::SetupPy => "setup.py",
            DependencySource::RequirementsTxt => "requirements.txt",
            DependencySource::NotFound => "None",
        }
    }
}

impl std::fmt::Display for DependencySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
