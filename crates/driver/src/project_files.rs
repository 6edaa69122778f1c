use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use pyexec_shared_types::InferenceConf;

lazy_static::lazy_static! {
    static ref PYTHON_EXTENSION: std::ffi::OsString = std::ffi::OsString::from("py");
}

fn compile_globset(globs: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for g in globs {
        builder.add(Glob::new(g)?);
    }
    builder.build()
}

#[derive(Debug)]
struct Exclusions {
    root: PathBuf,
    path_globs: GlobSet,
    file_names: Vec<String>,
}

impl Exclusions {
    /// Globs are matched against the root-relative path, so the location of
    /// the checkout itself never excludes anything.
    fn excludes_path(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => false,
            Ok(rel) => self.path_globs.is_match(rel),
            Err(_) => true,
        }
    }

    fn excludes_file_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.file_names.iter().any(|e| e == n))
            .unwrap_or(false)
    }
}

/// The part of a checkout that probing looks at.
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    exclusions: Arc<Exclusions>,
}

impl ProjectFiles {
    pub fn new(root: &Path, conf: &InferenceConf) -> Result<ProjectFiles, globset::Error> {
        Ok(ProjectFiles {
            exclusions: Arc::new(Exclusions {
                root: root.to_path_buf(),
                path_globs: compile_globset(&conf.excluded_path_globs)?,
                file_names: conf.excluded_file_names.clone(),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.exclusions.root
    }

    fn walk(&self) -> impl Iterator<Item = ignore::DirEntry> {
        let exclusions = self.exclusions.clone();
        WalkBuilder::new(&self.exclusions.root)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !exclusions.excludes_path(entry.path()))
            .build()
            .filter_map(|e| e.ok())
    }

    /// Python sources to probe, depth first with siblings sorted by name.
    pub fn python_files(&self) -> Vec<PathBuf> {
        self.walk()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| entry.path().extension() == Some(PYTHON_EXTENSION.as_os_str()))
            .filter(|entry| !self.exclusions.excludes_file_name(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Every kept directory, root first, as seen from `mount_point` inside the
    /// probe sandbox, joined with `:`.
    pub fn python_path(&self, mount_point: &str) -> String {
        let mount_point = mount_point.trim_end_matches('/');
        self.walk()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(self.root()).ok()?;
                if rel.as_os_str().is_empty() {
                    Some(mount_point.to_string())
                } else {
                    Some(format!("{}/{}", mount_point, rel.to_string_lossy()))
                }
            })
            .collect::<Vec<_>>()
            .join(":")
    }
}
