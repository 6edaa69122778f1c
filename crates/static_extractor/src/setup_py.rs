use lazy_static::lazy_static;
use log::debug;
use pyexec_shared_types::DependencySource;
use regex::Regex;

use crate::balanced::balanced_group;
use crate::config_file::{ConfigFile, ConfigParser, ParseFailure, ParsedDependency};

const SETUP_CALL: &str = "setup(";
const REQUIREMENTS_FILE: &str = "requirements.txt";

lazy_static! {
    static ref INSTALL_REQUIRES_RE: Regex = Regex::new(r"\binstall_requires\s*=\s*").unwrap();
    static ref STRING_LITERAL_RE: Regex =
        Regex::new(r#""(?P<double>[^"]*)"|'(?P<single>[^']*)'"#).unwrap();
    static ref REQUIREMENT_RE: Regex = Regex::new(
        r"(?x)
        ^(?P<name>[A-Za-z0-9][A-Za-z0-9_.-]*)\s*
        (?:\[[\w\s,.-]*\])?\s*
        (?:
            (?:===|==|>=|<=|~=|!=|<|>)\s*(?P<version>[A-Za-z0-9_.+!-]+)(?:\.\*)?
            (?:\s*,\s*(?:===|==|>=|<=|~=|!=|<|>)\s*[\w.*+!-]+)*
        )?$"
    )
    .unwrap();
}

pub struct SetupPy {
    file: ConfigFile,
}

/// The literal list or tuple assigned to `install_requires`, if any.
fn install_requires(content: &str) -> Result<Option<String>, ParseFailure> {
    let call_start = content
        .find(SETUP_CALL)
        .ok_or(ParseFailure::MissingSetupCall)?;
    let arguments = balanced_group(&content[call_start + SETUP_CALL.len() - 1..])
        .ok_or(ParseFailure::Unbalanced)?
        .inner;

    let value = match INSTALL_REQUIRES_RE.find(arguments) {
        Some(m) => &arguments[m.end()..],
        None => return Ok(None),
    };
    if !value.starts_with(['[', '(']) {
        return Err(ParseFailure::UnsupportedInstallRequires);
    }
    let group = balanced_group(value).ok_or(ParseFailure::Unbalanced)?;
    Ok(Some(group.inner.replace('\n', " ")))
}

impl ConfigParser for SetupPy {
    const FILE_NAME: &'static str = "setup.py";
    const SOURCE: DependencySource = DependencySource::SetupPy;

    fn from_config_file(file: ConfigFile) -> Self {
        SetupPy { file }
    }

    fn config_file(&self) -> &ConfigFile {
        &self.file
    }

    fn parse_content(content: &str) -> Result<Vec<ParsedDependency>, ParseFailure> {
        let requirements = match install_requires(content)? {
            Some(r) => r,
            None => return Ok(Vec::default()),
        };

        let mut parsed = Vec::default();
        for literal in STRING_LITERAL_RE.captures_iter(&requirements) {
            let text = literal
                .name("double")
                .or_else(|| literal.name("single"))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let requirement = text.split(';').next().unwrap_or_default().trim();
            if requirement == REQUIREMENTS_FILE {
                return Err(ParseFailure::DelegatesToRequirements);
            }
            match REQUIREMENT_RE.captures(requirement) {
                Some(caps) => parsed.push(ParsedDependency::new(
                    &caps["name"],
                    caps.name("version").map(|m| m.as_str()),
                    Self::SOURCE,
                )),
                None => debug!("Skipping install_requires literal {:?}", text),
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(content: &str) -> Vec<(String, Option<String>)> {
        SetupPy::parse_content(content)
            .unwrap()
            .into_iter()
            .map(|d| (d.name, d.version))
            .collect()
    }

    fn pair(name: &str, version: Option<&str>) -> (String, Option<String>) {
        (name.to_string(), version.map(|v| v.to_string()))
    }

    #[test]
    fn reads_literal_install_requires() {
        let content = r#"
from setuptools import setup, find_packages

setup(
    name="demo",
    version="0.1.0",
    packages=find_packages(exclude=("tests",)),
    install_requires=[
        "requests>=2.20,<3",
        'click',
        "numpy==1.19.*",
        "attrs[tests] >= 20.1",
        "dataclasses; python_version < '3.7'",
    ],
    extras_require={"dev": ["pytest"]},
)
"#;
        assert_eq!(
            deps(content),
            vec![
                pair("requests", Some("2.20")),
                pair("click", None),
                pair("numpy", Some("1.19")),
                pair("attrs", Some("20.1")),
                pair("dataclasses", None),
            ]
        );
    }

    #[test]
    fn tuple_and_spacing_are_fine() {
        assert_eq!(
            deps("setuptools.setup(name='x', install_requires = ('six',))"),
            vec![pair("six", None)]
        );
    }

    #[test]
    fn missing_install_requires_is_empty() {
        assert!(deps("setup(name='x', version='1.0')").is_empty());
    }

    #[test]
    fn failure_modes() {
        assert_eq!(
            SetupPy::parse_content("print('no call here')"),
            Err(ParseFailure::MissingSetupCall)
        );
        assert_eq!(
            SetupPy::parse_content("setup(name='x', install_requires=['a'"),
            Err(ParseFailure::Unbalanced)
        );
        assert_eq!(
            SetupPy::parse_content("setup(install_requires=reqs)"),
            Err(ParseFailure::UnsupportedInstallRequires)
        );
        assert_eq!(
            SetupPy::parse_content(
                "setup(install_requires=[l.strip() for l in open('requirements.txt')])"
            ),
            Err(ParseFailure::DelegatesToRequirements)
        );
    }

    #[test]
    fn requirements_literal_poisons_the_whole_list() {
        let content = "setup(install_requires=['six>=1.15', 'requirements.txt', 'attrs'])";
        assert_eq!(
            SetupPy::parse_content(content),
            Err(ParseFailure::DelegatesToRequirements)
        );

        let tmpdir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = tmpdir.path().join("setup.py");
        std::fs::write(&path, content).unwrap();
        assert!(SetupPy::open(&path).unwrap().infer_dependencies().is_empty());
    }
}
