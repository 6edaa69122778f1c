pub mod aggregate;
pub mod batch;
pub mod infer_dockerfile;
pub mod probe;
pub mod project_files;

use std::{
    borrow::Cow,
    collections::HashSet,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use pyexec_shared_types::InferenceConf;

pub use aggregate::{infer_environment, EnvironmentInference};
pub use infer_dockerfile::{InferDockerfile, InferenceError};

pub fn read_json_file<T>(p: &Path) -> Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let mut file = std::fs::File::open(p).with_context(|| format!("Opening json file {:?}", p))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let v: T = serde_json::from_str(contents.as_str())
        .with_context(|| format!("Parsing json file {:?}", p))?;
    Ok(v)
}

pub fn write_json_file<T>(p: &Path, value: T) -> Result<()>
where
    T: serde::Serialize,
{
    std::fs::write(p, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

pub async fn async_write_json_file<T>(p: &Path, value: T) -> Result<()>
where
    T: serde::Serialize,
{
    tokio::fs::write(p, serde_json::to_string_pretty(&value)?).await?;
    Ok(())
}

pub fn maybe_add_working_directory<'a, 'b>(
    working_directory: &'a Path,
    path: &'b Path,
) -> Cow<'b, Path> {
    if path.is_absolute() {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(working_directory.join(path))
    }
}

/// Reads the main config and everything it transitively includes. Each include
/// is read once; relative paths resolve against `working_directory`.
pub fn read_all_inference_conf(
    input_path: &Path,
    working_directory: &Path,
) -> Result<InferenceConf> {
    let mut v: InferenceConf =
        read_json_file(maybe_add_working_directory(working_directory, input_path).as_ref())
            .with_context(|| "Reading main config file")?;

    let mut seen_includes: HashSet<String> = HashSet::default();
    while !v.includes.is_empty() {
        let mut includes = std::mem::take(&mut v.includes);
        while let Some(p) = includes.pop() {
            if seen_includes.contains(&p) {
                continue;
            }
            seen_includes.insert(p.clone());
            let path: PathBuf =
                maybe_add_working_directory(working_directory, Path::new(&p)).into_owned();
            let mut nxt: InferenceConf = read_json_file(path.as_path())
                .with_context(|| format!("Reading input config {}", path.display()))?;
            includes.extend(std::mem::take(&mut nxt.includes));
            v.merge(nxt);
        }
    }

    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn follows_includes_once() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        let dir = tmpdir.path();
        std::fs::write(
            dir.join("main.json"),
            r#"{"timeout_secs": 60, "includes": ["a.json", "b.json"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("a.json"),
            r#"{"excluded_path_globs": ["*venv*"], "includes": ["b.json"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("b.json"),
            r#"{"timeout_secs": 5, "probe": {"timeout_wrapper": "timeout"}, "includes": ["main.json"]}"#,
        )
        .unwrap();

        let conf = read_all_inference_conf(Path::new("main.json"), dir).unwrap();
        assert_eq!(conf.timeout_secs, Some(60));
        assert_eq!(conf.probe.timeout_wrapper.as_deref(), Some("timeout"));
        assert!(conf.excluded_path_globs.contains(&"*venv*".to_string()));
        assert!(conf.includes.is_empty());
    }

    #[test]
    fn missing_include_is_an_error() {
        let tmpdir = tempdir().expect("Failed to create temp directory");
        std::fs::write(tmpdir.path().join("main.json"), r#"{"includes": ["nope.json"]}"#)
            .unwrap();
        let err = read_all_inference_conf(Path::new("main.json"), tmpdir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.json"));
    }
}
