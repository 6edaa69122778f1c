use lazy_static::lazy_static;
use log::warn;
use pyexec_shared_types::DependencySource;
use regex::Regex;

use crate::config_file::{ConfigFile, ConfigParser, ParseFailure, ParsedDependency};

lazy_static! {
    static ref SECTION_RE: Regex = Regex::new(r"^\[+(?P<section>[\w.-]+)\]+$").unwrap();
    static ref DEPENDENCY_RE: Regex = Regex::new(
        r#"(?x)
        ^(?P<name>[A-Za-z0-9][A-Za-z0-9_.-]*)\s*
        (?:
            =\s*['"]?\s*
            (?:
                \*
                |
                (?:===|==|>=|<=|~=|!=|<|>)\s*(?P<version>[A-Za-z0-9_.+!-]+)(?:\.\*)?
                (?:\s*,\s*(?:===|==|>=|<=|~=|!=|<|>)\s*[\w.*+!-]+)*
            )
            \s*['"]?
        )?$"#
    )
    .unwrap();
}

/// Sections whose entries are installed, in install order.
const PACKAGE_SECTIONS: [&str; 2] = ["packages", "dev-packages"];

pub struct Pipfile {
    file: ConfigFile,
}

impl ConfigParser for Pipfile {
    const FILE_NAME: &'static str = "Pipfile";
    const SOURCE: DependencySource = DependencySource::Pipfile;

    fn from_config_file(file: ConfigFile) -> Self {
        Pipfile { file }
    }

    fn config_file(&self) -> &ConfigFile {
        &self.file
    }

    fn parse_content(content: &str) -> Result<Vec<ParsedDependency>, ParseFailure> {
        let mut sections: Vec<(String, Vec<(usize, &str)>)> = Vec::default();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = SECTION_RE.captures(line) {
                sections.push((caps["section"].to_string(), Vec::default()));
            } else if let Some((_, entries)) = sections.last_mut() {
                entries.push((idx + 1, line));
            } else {
                warn!("Found line outside of section: {}", line);
            }
        }

        let mut parsed = Vec::default();
        for wanted in PACKAGE_SECTIONS {
            let entries = sections
                .iter()
                .filter(|(name, _)| name == wanted)
                .flat_map(|(_, entries)| entries.iter());
            for (line_number, line) in entries {
                let caps = DEPENDENCY_RE
                    .captures(line)
                    .ok_or_else(|| ParseFailure::UnmatchedLine {
                        line_number: *line_number,
                        line: line.to_string(),
                    })?;
                parsed.push(ParsedDependency::new(
                    &caps["name"],
                    caps.name("version").map(|m| m.as_str()),
                    Self::SOURCE,
                ));
            }
        }
        Ok(parsed)
    }
}
