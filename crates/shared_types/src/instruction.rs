use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, satisfy, space0, space1},
    combinator::{opt, recognize, rest, verify},
    error::{context, ContextError, ParseError},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::build_spec::BuildSpecError;
use crate::dependency_set::Dependency;

/// Prefix every base image line starts with.
pub const BASE_IMAGE_PREFIX: &str = "FROM python:";

/// Interpreter package that must never be installed through apt.
pub const SUPPRESSED_APT_PACKAGE: &str = "python-pip";

/// One line of the pseudo-Dockerfile a `BuildSpec` is read from and written to.
///
/// The set is closed: anything the grammar below does not accept is an invalid line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    From(String),
    AptUpdate,
    PipSelfUpgrade,
    AptInstall(Dependency),
    PipInstall(Dependency),
    Copy(String),
    Workdir(String),
    Cmd(String),
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn is_version_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '!' | ':' | '~' | '-')
}

fn list_separator<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    let (input, _) = tuple((space0, char(','), space0))(input)?;
    Ok((input, ()))
}

fn quoted<'a, E: ParseError<&'a str>>(
    word: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    delimited(char('"'), tag(word), char('"'))
}

/// `"w1", "w2", ...` with optional whitespace around every comma.
fn exec_words<'a, E: ParseError<&'a str>>(
    words: &'static [&'static str],
) -> impl FnMut(&'a str) -> IResult<&'a str, (), E> {
    move |mut input: &'a str| {
        for (idx, word) in words.iter().enumerate() {
            if idx > 0 {
                let (remaining, _) = list_separator(input)?;
                input = remaining;
            }
            let (remaining, _) = quoted(*word)(input)?;
            input = remaining;
        }
        Ok((input, ()))
    }
}

fn run_open<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    let (input, _) = tuple((tag("RUN"), space1, char('['), space0))(input)?;
    Ok((input, ()))
}

fn run_close<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    let (input, _) = tuple((space0, char(']')))(input)?;
    Ok((input, ()))
}

/// `name`, `name<pin>version` inside the quotes of an install argument.
/// Names start with an alphanumeric.
fn package<'a, E: ParseError<&'a str>>(
    pin: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, Dependency, E> {
    move |input: &'a str| {
        let (input, name) = recognize(pair(
            satisfy(|c: char| c.is_alphanumeric()),
            take_while(is_name_char),
        ))(input)?;
        let (input, version) = opt(preceded(
            tuple((space0, tag(pin), space0)),
            take_while1(is_version_char),
        ))(input)?;
        let (input, _) = space0(input)?;
        Ok((
            input,
            Dependency::new(name, version.map(|v: &str| v.to_string())),
        ))
    }
}

fn base_image<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, version) = preceded(
        tag(BASE_IMAGE_PREFIX),
        take_while1(|c: char| c.is_ascii_digit() || c == '.'),
    )(input)?;
    Ok((input, Instruction::From(version.to_string())))
}

fn pip_install<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, _) = run_open(input)?;
    let (input, _) = exec_words(&["pip", "install"])(input)?;
    let (input, _) = list_separator(input)?;
    let (input, dependency) = delimited(char('"'), package("=="), char('"'))(input)?;
    let (input, _) = run_close(input)?;
    Ok((input, Instruction::PipInstall(dependency)))
}

fn apt_install<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, _) = run_open(input)?;
    let (input, _) = exec_words(&["apt-get", "install"])(input)?;
    let (input, _) = list_separator(input)?;
    let (input, _) = opt(tuple((quoted("-y"), list_separator)))(input)?;
    let (input, dependency) = delimited(char('"'), package("="), char('"'))(input)?;
    let (input, _) = run_close(input)?;
    Ok((input, Instruction::AptInstall(dependency)))
}

fn apt_update<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, _) = tuple((run_open, exec_words(&["apt-get", "update"]), run_close))(input)?;
    Ok((input, Instruction::AptUpdate))
}

fn pip_self_upgrade<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Instruction, E> {
    let (input, _) = tuple((
        run_open,
        exec_words(&["python", "-m", "pip", "install", "--upgrade", "pip"]),
        run_close,
    ))(input)?;
    Ok((input, Instruction::PipSelfUpgrade))
}

/// `KEYWORD <anything non-empty>`, yielding the whole line.
fn directive_line<'a, E: ParseError<&'a str>>(
    keyword: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    recognize(tuple((
        tag(keyword),
        space1,
        verify(rest, |r: &str| !r.trim().is_empty()),
    )))
}

fn copy_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, line) = directive_line("COPY")(input)?;
    Ok((input, Instruction::Copy(line.to_string())))
}

fn workdir_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, line) = directive_line("WORKDIR")(input)?;
    Ok((input, Instruction::Workdir(line.to_string())))
}

fn cmd_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Instruction, E> {
    let (input, line) = directive_line("CMD")(input)?;
    Ok((input, Instruction::Cmd(line.to_string())))
}

impl Instruction {
    pub fn parse<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
        input: &'a str,
    ) -> IResult<&'a str, Instruction, E> {
        alt((
            context("base image", base_image),
            context("pip install", pip_install),
            context("apt-get install", apt_install),
            context("apt-get update", apt_update),
            context("pip self upgrade", pip_self_upgrade),
            context("COPY", copy_line),
            context("WORKDIR", workdir_line),
            context("CMD", cmd_line),
        ))(input)
    }

    /// Parses a complete line; surrounding whitespace is ignored, trailing garbage is not.
    pub fn from_line(line: &str) -> Result<Instruction, BuildSpecError> {
        let trimmed = line.trim();
        match Instruction::parse::<(&str, nom::error::ErrorKind)>(trimmed) {
            Ok(("", instruction)) => Ok(instruction),
            _ => Err(BuildSpecError::InvalidLine(trimmed.to_string())),
        }
    }

    pub fn is_run(&self) -> bool {
        matches!(
            self,
            Instruction::AptUpdate
                | Instruction::PipSelfUpgrade
                | Instruction::AptInstall(_)
                | Instruction::PipInstall(_)
        )
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::From(version) => write!(f, "{}{}", BASE_IMAGE_PREFIX, version),
            Instruction::AptUpdate => write!(f, r#"RUN ["apt-get", "update"]"#),
            Instruction::PipSelfUpgrade => write!(
                f,
                r#"RUN ["python", "-m", "pip", "install", "--upgrade", "pip"]"#
            ),
            Instruction::AptInstall(Dependency { name, version }) => match version {
                Some(v) => write!(f, r#"RUN ["apt-get","install","-y","{}={}"]"#, name, v),
                None => write!(f, r#"RUN ["apt-get","install","-y","{}"]"#, name),
            },
            Instruction::PipInstall(Dependency { name, version }) => match version {
                Some(v) => write!(f, r#"RUN ["pip","install","{}=={}"]"#, name, v),
                None => write!(f, r#"RUN ["pip","install","{}"]"#, name),
            },
            Instruction::Copy(line) | Instruction::Workdir(line) | Instruction::Cmd(line) => {
                write!(f, "{}", line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_line(input: &str) -> Instruction {
        Instruction::from_line(input).unwrap()
    }

    #[test]
    fn parses_base_image() {
        assert_eq!(
            parse_line("FROM python:3.8"),
            Instruction::From("3.8".to_string())
        );
        assert_eq!(
            parse_line("  FROM python:3.10.4 "),
            Instruction::From("3.10.4".to_string())
        );
        assert!(Instruction::from_line("FROM python:3.8-slim").is_err());
        assert!(Instruction::from_line("FROM ubuntu:20.04").is_err());
        assert!(Instruction::from_line("FROM  python:3.8").is_err());
        assert!(Instruction::from_line("FROM python:").is_err());
    }

    #[test]
    fn parses_pip_install() {
        assert_eq!(
            parse_line(r#"RUN ["pip","install","requests==2.25.1"]"#),
            Instruction::PipInstall(Dependency::new("requests", Some("2.25.1".to_string())))
        );
        assert_eq!(
            parse_line(r#"RUN ["pip", "install", "click"]"#),
            Instruction::PipInstall(Dependency::new("click", None))
        );
        assert_eq!(
            parse_line(r#"RUN ["pip", "install", "zope.interface == 5.0.0+local"]"#),
            Instruction::PipInstall(Dependency::new(
                "zope.interface",
                Some("5.0.0+local".to_string())
            ))
        );
        assert_eq!(
            parse_line(r#"RUN ["pip","install","foo==1!2.0"]"#),
            Instruction::PipInstall(Dependency::new("foo", Some("1!2.0".to_string())))
        );
        assert!(Instruction::from_line(r#"RUN ["pip","install","--pre"]"#).is_err());
        assert!(Instruction::from_line(r#"RUN ["pip","install","_private==1.0"]"#).is_err());
        assert!(Instruction::from_line(r#"RUN ["pip","install","requests=2.0"]"#).is_err());
        assert!(Instruction::from_line(r#"RUN ["pip","install","requests>=2.0"]"#).is_err());
        assert!(Instruction::from_line(r#"RUN ["pip","install","requests"] extra"#).is_err());
        assert!(Instruction::from_line(r#"RUN ["pip","install",""]"#).is_err());
    }

    #[test]
    fn parses_apt_install() {
        assert_eq!(
            parse_line(r#"RUN ["apt-get","install","-y","libpq-dev=1.0"]"#),
            Instruction::AptInstall(Dependency::new("libpq-dev", Some("1.0".to_string())))
        );
        assert_eq!(
            parse_line(r#"RUN ["apt-get", "install", "libxml2-dev"]"#),
            Instruction::AptInstall(Dependency::new("libxml2-dev", None))
        );
        assert_eq!(
            parse_line(r#"RUN ["apt-get","install","-y","libc6 = 2.31-13+deb11u5"]"#),
            Instruction::AptInstall(Dependency::new(
                "libc6",
                Some("2.31-13+deb11u5".to_string())
            ))
        );
        assert_eq!(
            parse_line(r#"RUN ["apt-get","install","-y","tzdata=1:2021a~1"]"#),
            Instruction::AptInstall(Dependency::new("tzdata", Some("1:2021a~1".to_string())))
        );
        assert!(Instruction::from_line(r#"RUN ["apt-get","install","-y"]"#).is_err());
    }

    #[test]
    fn parses_housekeeping_runs() {
        assert_eq!(
            parse_line(r#"RUN ["apt-get", "update"]"#),
            Instruction::AptUpdate
        );
        assert_eq!(
            parse_line(r#"RUN ["apt-get","update" ]"#),
            Instruction::AptUpdate
        );
        assert_eq!(
            parse_line(r#"RUN ["python", "-m", "pip", "install", "--upgrade", "pip"]"#),
            Instruction::PipSelfUpgrade
        );
        assert!(Instruction::from_line(r#"RUN ["apt-get", "upgrade"]"#).is_err());
        assert!(Instruction::from_line("RUN apt-get update").is_err());
    }

    #[test]
    fn parses_directives() {
        assert_eq!(
            parse_line("COPY . /mnt/projectdir"),
            Instruction::Copy("COPY . /mnt/projectdir".to_string())
        );
        assert_eq!(
            parse_line("WORKDIR /mnt/projectdir"),
            Instruction::Workdir("WORKDIR /mnt/projectdir".to_string())
        );
        assert_eq!(
            parse_line(r#"CMD ["python", "main.py"]"#),
            Instruction::Cmd(r#"CMD ["python", "main.py"]"#.to_string())
        );
        assert!(Instruction::from_line("COPY").is_err());
        assert!(Instruction::from_line("COPY   ").is_err());
        assert!(Instruction::from_line("COPYX a b").is_err());
        assert!(Instruction::from_line("ENV FOO=bar").is_err());
    }

    #[test]
    fn display_is_parseable() {
        let lines = vec![
            Instruction::From("3.8".to_string()),
            Instruction::AptUpdate,
            Instruction::PipSelfUpgrade,
            Instruction::AptInstall(Dependency::new("libpq-dev", Some("1.0".to_string()))),
            Instruction::AptInstall(Dependency::new("gcc", None)),
            Instruction::PipInstall(Dependency::new("psycopg2", None)),
            Instruction::PipInstall(Dependency::new("numpy", Some("1.19.5".to_string()))),
            Instruction::Cmd(r#"CMD ["python"]"#.to_string()),
        ];
        for instruction in lines {
            assert_eq!(parse_line(&instruction.to_string()), instruction);
        }
    }
}
