use thiserror::Error;

use crate::dependency_set::{Dependency, DependencySet};
use crate::instruction::{Instruction, BASE_IMAGE_PREFIX, SUPPRESSED_APT_PACKAGE};

/// Every way a Dockerfile text or a combination of build specs can be malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildSpecError {
    #[error("Invalid FROM clause: {0:?}")]
    InvalidBaseImage(String),
    #[error("Dockerfile is empty")]
    Empty,
    #[error("Found invalid line in dockerfile: {0:?}")]
    InvalidLine(String),
    #[error("Argument is no valid {expected} clause: {line:?}")]
    UnexpectedInstruction { expected: &'static str, line: String },
    #[error("Argument list must contain at least one element")]
    NothingToMerge,
    #[error("Dependencies require different Python versions: {0} and {1}")]
    PythonVersionMismatch(String, String),
    #[error("Dockerfiles contain different {0} commands")]
    DirectiveMismatch(&'static str),
    #[error("Package does not fit the install line grammar: {0:?}")]
    InvalidDependency(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Copy,
    Workdir,
    Cmd,
}

impl DirectiveKind {
    const ALL: [DirectiveKind; 3] = [
        DirectiveKind::Copy,
        DirectiveKind::Workdir,
        DirectiveKind::Cmd,
    ];

    fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::Copy => "COPY",
            DirectiveKind::Workdir => "WORKDIR",
            DirectiveKind::Cmd => "CMD",
        }
    }

    fn of(instruction: &Instruction) -> Option<DirectiveKind> {
        match instruction {
            Instruction::Copy(_) => Some(DirectiveKind::Copy),
            Instruction::Workdir(_) => Some(DirectiveKind::Workdir),
            Instruction::Cmd(_) => Some(DirectiveKind::Cmd),
            _ => None,
        }
    }
}

/// Install lines must read back as the instruction they were written from.
fn check_readable(instruction: Instruction) -> Result<(), BuildSpecError> {
    let line = instruction.to_string();
    match Instruction::from_line(&line) {
        Ok(parsed) if parsed == instruction => Ok(()),
        _ => Err(BuildSpecError::InvalidDependency(line)),
    }
}

/// A minimal container environment: one Python base image, the apt and pip
/// packages to install on top of it and the optional COPY/WORKDIR/CMD lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    python_version: String,
    apt_packages: DependencySet,
    pip_packages: DependencySet,
    copy_command: Option<String>,
    workdir_command: Option<String>,
    cmd_command: Option<String>,
}

impl BuildSpec {
    /// `from_clause` must be exactly `FROM python:<version>`.
    pub fn new(from_clause: &str) -> Result<BuildSpec, BuildSpecError> {
        match Instruction::from_line(from_clause) {
            Ok(Instruction::From(version)) => Ok(BuildSpec::empty(version)),
            _ => Err(BuildSpecError::InvalidBaseImage(from_clause.to_string())),
        }
    }

    pub fn from_python_version(version: &str) -> Result<BuildSpec, BuildSpecError> {
        BuildSpec::new(&format!("{}{}", BASE_IMAGE_PREFIX, version))
    }

    fn empty(python_version: String) -> BuildSpec {
        BuildSpec {
            python_version,
            apt_packages: DependencySet::default(),
            pip_packages: DependencySet::default(),
            copy_command: None,
            workdir_command: None,
            cmd_command: None,
        }
    }

    /// Reads a complete Dockerfile. The first non-blank line must be the base
    /// image, every other non-blank line must be a known instruction.
    pub fn parse(dockerfile: &str) -> Result<BuildSpec, BuildSpecError> {
        BuildSpec::parse_lines(dockerfile, true)
    }

    /// Like `parse`, but COPY/WORKDIR/CMD lines are validated and then dropped.
    pub fn parse_dependencies_only(dockerfile: &str) -> Result<BuildSpec, BuildSpecError> {
        BuildSpec::parse_lines(dockerfile, false)
    }

    fn parse_lines(dockerfile: &str, keep_directives: bool) -> Result<BuildSpec, BuildSpecError> {
        let mut lines = dockerfile.lines().map(str::trim).filter(|l| !l.is_empty());
        let first = lines.next().ok_or(BuildSpecError::Empty)?;
        let mut spec = BuildSpec::new(first)?;

        for line in lines {
            let instruction = Instruction::from_line(line)?;
            let directive = DirectiveKind::of(&instruction);
            match instruction {
                Instruction::From(_) => return Err(BuildSpecError::InvalidLine(line.to_string())),
                Instruction::Copy(l) | Instruction::Workdir(l) | Instruction::Cmd(l) => {
                    if let (true, Some(kind)) = (keep_directives, directive) {
                        *spec.directive_slot(kind) = Some(l);
                    }
                }
                run => spec.apply_run(run),
            }
        }
        Ok(spec)
    }

    fn directive_slot(&mut self, kind: DirectiveKind) -> &mut Option<String> {
        match kind {
            DirectiveKind::Copy => &mut self.copy_command,
            DirectiveKind::Workdir => &mut self.workdir_command,
            DirectiveKind::Cmd => &mut self.cmd_command,
        }
    }

    fn directive(&self, kind: DirectiveKind) -> Option<&str> {
        match kind {
            DirectiveKind::Copy => self.copy_command.as_deref(),
            DirectiveKind::Workdir => self.workdir_command.as_deref(),
            DirectiveKind::Cmd => self.cmd_command.as_deref(),
        }
    }

    /// Applies one `RUN [...]` line.
    pub fn add_run_command(&mut self, cmd: &str) -> Result<(), BuildSpecError> {
        match Instruction::from_line(cmd) {
            Ok(instruction) if instruction.is_run() => {
                self.apply_run(instruction);
                Ok(())
            }
            _ => Err(BuildSpecError::UnexpectedInstruction {
                expected: "RUN",
                line: cmd.to_string(),
            }),
        }
    }

    fn apply_run(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::AptInstall(d) => {
                self.apt_packages.insert_dependency(d);
            }
            Instruction::PipInstall(d) => {
                self.pip_packages.insert_dependency(d);
            }
            _ => (),
        }
    }

    /// Refuses names and versions the install line grammar would not read back.
    pub fn add_pip_dependency<S: Into<String>>(
        &mut self,
        name: S,
        version: Option<String>,
    ) -> Result<(), BuildSpecError> {
        let dependency = Dependency::new(name, version);
        check_readable(Instruction::PipInstall(dependency.clone()))?;
        self.pip_packages.insert_dependency(dependency);
        Ok(())
    }

    pub fn add_apt_dependency<S: Into<String>>(
        &mut self,
        name: S,
        version: Option<String>,
    ) -> Result<(), BuildSpecError> {
        let dependency = Dependency::new(name, version);
        check_readable(Instruction::AptInstall(dependency.clone()))?;
        self.apt_packages.insert_dependency(dependency);
        Ok(())
    }

    pub fn set_copy_command(&mut self, cmd: &str, replace: bool) -> Result<(), BuildSpecError> {
        self.set_directive(DirectiveKind::Copy, cmd, replace)
    }

    pub fn set_workdir_command(&mut self, cmd: &str, replace: bool) -> Result<(), BuildSpecError> {
        self.set_directive(DirectiveKind::Workdir, cmd, replace)
    }

    pub fn set_cmd_command(&mut self, cmd: &str, replace: bool) -> Result<(), BuildSpecError> {
        self.set_directive(DirectiveKind::Cmd, cmd, replace)
    }

    fn set_directive(
        &mut self,
        kind: DirectiveKind,
        cmd: &str,
        replace: bool,
    ) -> Result<(), BuildSpecError> {
        let line = match Instruction::from_line(cmd) {
            Ok(instruction) if DirectiveKind::of(&instruction) == Some(kind) => instruction.to_string(),
            _ => {
                return Err(BuildSpecError::UnexpectedInstruction {
                    expected: kind.keyword(),
                    line: cmd.to_string(),
                })
            }
        };
        let slot = self.directive_slot(kind);
        if slot.is_none() || replace {
            *slot = Some(line);
        }
        Ok(())
    }

    /// Combines specs into a new one without touching the inputs.
    ///
    /// All inputs need the same Python version, and every directive set by more
    /// than one input must agree. Packages are folded in the given order.
    pub fn merge(specs: &[BuildSpec]) -> Result<BuildSpec, BuildSpecError> {
        let (first, rest) = specs.split_first().ok_or(BuildSpecError::NothingToMerge)?;
        if let Some(other) = rest.iter().find(|s| s.python_version != first.python_version) {
            return Err(BuildSpecError::PythonVersionMismatch(
                first.python_version.clone(),
                other.python_version.clone(),
            ));
        }

        let mut merged = BuildSpec::empty(first.python_version.clone());
        for kind in DirectiveKind::ALL {
            let mut agreed: Option<&str> = None;
            for value in specs.iter().filter_map(|s| s.directive(kind)) {
                match agreed {
                    Some(existing) if existing != value => {
                        return Err(BuildSpecError::DirectiveMismatch(kind.keyword()))
                    }
                    _ => agreed = Some(value),
                }
            }
            *merged.directive_slot(kind) = agreed.map(str::to_string);
        }

        for spec in specs {
            merged.apt_packages.merge(&spec.apt_packages);
            merged.pip_packages.merge(&spec.pip_packages);
        }
        Ok(merged)
    }

    pub fn python_version(&self) -> &str {
        &self.python_version
    }

    pub fn apt_packages(&self) -> &DependencySet {
        &self.apt_packages
    }

    pub fn pip_packages(&self) -> &DependencySet {
        &self.pip_packages
    }

    pub fn copy_command(&self) -> Option<&str> {
        self.copy_command.as_deref()
    }

    pub fn workdir_command(&self) -> Option<&str> {
        self.workdir_command.as_deref()
    }

    pub fn cmd_command(&self) -> Option<&str> {
        self.cmd_command.as_deref()
    }

    pub fn pip_dependency_count(&self) -> usize {
        self.pip_packages.len()
    }

    pub fn apt_dependency_count(&self) -> usize {
        self.apt_packages.len()
    }

    /// The lines `to_dockerfile` emits, in order.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut out = vec![
            Instruction::From(self.python_version.clone()),
            Instruction::AptUpdate,
            Instruction::PipSelfUpgrade,
        ];
        out.extend(
            self.apt_packages
                .iter()
                .filter(|d| d.name != SUPPRESSED_APT_PACKAGE)
                .cloned()
                .map(Instruction::AptInstall),
        );
        out.extend(self.pip_packages.iter().cloned().map(Instruction::PipInstall));
        if let Some(l) = &self.copy_command {
            out.push(Instruction::Copy(l.clone()));
        }
        if let Some(l) = &self.workdir_command {
            out.push(Instruction::Workdir(l.clone()));
        }
        if let Some(l) = &self.cmd_command {
            out.push(Instruction::Cmd(l.clone()));
        }
        out
    }

    pub fn to_dockerfile(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for BuildSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for instruction in self.instructions() {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for BuildSpec {
    type Err = BuildSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildSpec::parse(s)
    }
}
