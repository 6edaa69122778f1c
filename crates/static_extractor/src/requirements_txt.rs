use lazy_static::lazy_static;
use pyexec_shared_types::DependencySource;
use regex::Regex;

use crate::config_file::{ConfigFile, ConfigParser, ParseFailure, ParsedDependency};

lazy_static! {
    static ref DEPENDENCY_RE: Regex = Regex::new(
        r"(?x)
        ^(?P<name>[A-Za-z0-9][A-Za-z0-9_.-]*)\s*
        (?:\[[\w\s,.-]*\])?\s*
        (?:
            (?:===|==|>=|<=|~=|!=|<|>)\s*(?P<version>[A-Za-z0-9_.+!-]+)(?:\.\*)?
            (?:\s*,\s*(?:===|==|>=|<=|~=|!=|<|>)\s*[\w.*+!-]+)*
        )?$"
    )
    .unwrap();
    static ref ANY_VERSION_RE: Regex = Regex::new(
        r#"^(?P<name>[A-Za-z0-9][A-Za-z0-9_.-]*)\s*==\s*["']\*["']$"#
    )
    .unwrap();
    static ref MARKER_RE: Regex = Regex::new(
        r#"^python_version\s*(?:===|==|>=|<=|~=|!=|<|>)\s*["']\d+(?:\.\d+)*["']$"#
    )
    .unwrap();
}

pub struct RequirementsTxt {
    file: ConfigFile,
}

impl RequirementsTxt {
    fn parse_fragment(fragment: &str) -> Option<Option<ParsedDependency>> {
        if MARKER_RE.is_match(fragment) {
            return Some(None);
        }
        let caps = DEPENDENCY_RE
            .captures(fragment)
            .or_else(|| ANY_VERSION_RE.captures(fragment))?;
        Some(Some(ParsedDependency::new(
            &caps["name"],
            caps.name("version").map(|m| m.as_str()),
            Self::SOURCE,
        )))
    }
}

impl ConfigParser for RequirementsTxt {
    const FILE_NAME: &'static str = "requirements.txt";
    const SOURCE: DependencySource = DependencySource::RequirementsTxt;

    fn from_config_file(file: ConfigFile) -> Self {
        RequirementsTxt { file }
    }

    fn config_file(&self) -> &ConfigFile {
        &self.file
    }

    fn parse_content(content: &str) -> Result<Vec<ParsedDependency>, ParseFailure> {
        let mut parsed = Vec::default();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default();
            for fragment in line.split(';').map(str::trim).filter(|f| !f.is_empty()) {
                match Self::parse_fragment(fragment) {
                    Some(dependency) => parsed.extend(dependency),
                    None => {
                        return Err(ParseFailure::UnmatchedLine {
                            line_number: idx + 1,
                            line: raw.trim().to_string(),
                        })
                    }
                }
            }
        }
        Ok(parsed)
    }
}
