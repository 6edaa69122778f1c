use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};
use lazy_static::lazy_static;
use log::{debug, warn};
use pyexec_shared_types::{Dependency, DependencySet, DependencySource};
use regex::Regex;
use thiserror::Error;

lazy_static! {
    // PEP 263, only honoured on the first two lines.
    static ref CODING_RE: Regex =
        Regex::new(r"^[ \t\f]*#.*?coding[:=][ \t]*(?P<codec>[-\w.]+)").unwrap();
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Path {0:?} does not refer to a file")]
    NotAFile(PathBuf),
    #[error("Wrong file name: expected {expected}, found {found:?}")]
    WrongFileName { expected: &'static str, found: PathBuf },
    #[error("Unable to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a configuration file yielded nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("Did not match line {line_number}: {line:?}")]
    UnmatchedLine { line_number: usize, line: String },
    #[error("install_requires is read from requirements.txt")]
    DelegatesToRequirements,
    #[error("Did not find setup call")]
    MissingSetupCall,
    #[error("Unbalanced brackets")]
    Unbalanced,
    #[error("install_requires is not a literal list")]
    UnsupportedInstallRequires,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDependency {
    pub name: String,
    pub version: Option<String>,
    pub source: DependencySource,
}

impl ParsedDependency {
    pub fn new(name: &str, version: Option<&str>, source: DependencySource) -> ParsedDependency {
        ParsedDependency {
            name: name.to_string(),
            version: version.map(|v| v.to_string()),
            source,
        }
    }
}

impl From<ParsedDependency> for Dependency {
    fn from(parsed: ParsedDependency) -> Self {
        Dependency::new(parsed.name, parsed.version)
    }
}

/// Python codec aliases that the WHATWG label table does not know.
fn normalize_codec(codec: &str) -> String {
    let lowered = codec.to_ascii_lowercase().replace('_', "-");
    let alias = match lowered.as_str() {
        "u8" | "utf" | "utf8" | "utf-8-sig" => "utf-8",
        "latin-1" | "l1" | "iso-8859-1" | "iso8859-1" | "8859" | "cp819" => "latin1",
        "936" | "cp936" | "ms936" => "gbk",
        "eucjp" | "ujis" | "u-jis" => "euc-jp",
        "euckr" | "korean" | "ksc5601" | "ks-c-5601" | "ks-c-5601-1987" | "ks-x-1001" => {
            "euc-kr"
        }
        "big5-tw" | "csbig5" => "big5",
        "866" | "cp866" => "ibm866",
        "mac-roman" | "macroman" => "macintosh",
        "gb18030-2000" => "gb18030",
        other => other,
    };
    alias.to_string()
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(bytes);
    head.lines().take(2).find_map(|line| {
        let codec = CODING_RE.captures(line)?.name("codec")?.as_str();
        let encoding = Encoding::for_label(normalize_codec(codec).as_bytes());
        if encoding.is_none() {
            warn!("Unknown source encoding {:?}, reading as UTF-8", codec);
        }
        encoding
    })
}

pub(crate) fn decode(bytes: &[u8]) -> String {
    match declared_encoding(bytes) {
        Some(encoding) if encoding != UTF_8 => {
            let (cow, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                debug!("Replaced malformed sequences while decoding as {}", encoding.name());
            }
            cow.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// A decoded project configuration file with a fixed name.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    content: String,
}

impl ConfigFile {
    pub fn open(path: &Path, expected_name: &'static str) -> Result<ConfigFile, ConfigFileError> {
        if !path.is_file() {
            return Err(ConfigFileError::NotAFile(path.to_path_buf()));
        }
        if path.file_name().and_then(|n| n.to_str()) != Some(expected_name) {
            return Err(ConfigFileError::WrongFileName {
                expected: expected_name,
                found: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ConfigFile {
            path: path.to_path_buf(),
            content: decode(&bytes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A parser for one kind of project configuration file.
pub trait ConfigParser: Sized {
    const FILE_NAME: &'static str;
    const SOURCE: DependencySource;

    fn from_config_file(file: ConfigFile) -> Self;

    fn config_file(&self) -> &ConfigFile;

    fn parse_content(content: &str) -> Result<Vec<ParsedDependency>, ParseFailure>;

    fn open(path: &Path) -> Result<Self, ConfigFileError> {
        ConfigFile::open(path, Self::FILE_NAME).map(Self::from_config_file)
    }

    fn parse(&self) -> Result<Vec<ParsedDependency>, ParseFailure> {
        Self::parse_content(self.config_file().content())
    }

    /// Never fails: a file that does not parse contributes nothing.
    fn infer_dependencies(&self) -> DependencySet {
        match self.parse() {
            Ok(parsed) => parsed.into_iter().map(Dependency::from).collect(),
            Err(failure) => {
                warn!(
                    "Ignoring {:?}: {}",
                    self.config_file().path(),
                    failure
                );
                DependencySet::default()
            }
        }
    }
}
