use serde::{Deserialize, Serialize};

fn default_python_version() -> String {
    "3.8".to_string()
}

fn default_probe_command() -> String {
    "v2".to_string()
}

fn default_mount_point() -> String {
    "/mnt/projectdir".to_string()
}

fn default_timeout_exit_code() -> i32 {
    124
}

fn default_excluded_path_globs() -> Vec<String> {
    ["*__pycache__*", "*tests*", "*doc*", "*.git*", "*examples*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_file_names() -> Vec<String> {
    vec!["setup.py".to_string(), "__init__.py".to_string()]
}

/// How the external probe tool is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeConf {
    #[serde(default = "default_probe_command")]
    pub command: String,

    /// Arguments placed between `command` and `run`.
    #[serde(default)]
    pub prefix_args: Vec<String>,

    /// Where the project directory is mounted inside the probe sandbox.
    #[serde(default = "default_mount_point")]
    pub mount_point: String,

    #[serde(default = "default_timeout_exit_code")]
    pub timeout_exit_code: i32,

    /// e.g. `timeout`; called as `<wrapper> <secs> <command> ...`.
    #[serde(default)]
    pub timeout_wrapper: Option<String>,
}

impl Default for ProbeConf {
    fn default() -> Self {
        ProbeConf {
            command: default_probe_command(),
            prefix_args: Vec::default(),
            mount_point: default_mount_point(),
            timeout_exit_code: default_timeout_exit_code(),
            timeout_wrapper: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferenceConf {
    #[serde(default = "default_python_version")]
    pub default_python_version: String,

    #[serde(default)]
    pub probe: ProbeConf,

    #[serde(default = "default_excluded_path_globs")]
    pub excluded_path_globs: Vec<String>,

    #[serde(default = "default_excluded_file_names")]
    pub excluded_file_names: Vec<String>,

    /// Budget for the whole probe phase of one project. `None` means unbounded.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub includes: Vec<String>,
}

impl Default for InferenceConf {
    fn default() -> Self {
        InferenceConf {
            default_python_version: default_python_version(),
            probe: ProbeConf::default(),
            excluded_path_globs: default_excluded_path_globs(),
            excluded_file_names: default_excluded_file_names(),
            timeout_secs: None,
            includes: Vec::default(),
        }
    }
}

impl InferenceConf {
    /// Lists are unioned, scalars already set on `self` win.
    pub fn merge(&mut self, other: InferenceConf) {
        self.includes.extend(other.includes.into_iter());
        self.includes.sort();
        self.includes.dedup();

        self.excluded_path_globs
            .extend(other.excluded_path_globs.into_iter());
        self.excluded_path_globs.sort();
        self.excluded_path_globs.dedup();

        self.excluded_file_names
            .extend(other.excluded_file_names.into_iter());
        self.excluded_file_names.sort();
        self.excluded_file_names.dedup();

        if self.timeout_secs.is_none() {
            self.timeout_secs = other.timeout_secs;
        }
        if self.probe.timeout_wrapper.is_none() {
            self.probe.timeout_wrapper = other.probe.timeout_wrapper;
        }
    }
}
