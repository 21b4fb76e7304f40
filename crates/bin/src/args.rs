//! Command line binding.
//!
//! Everything on the command line that is not one of the flags of [`Cli`] is
//! a template variable, either `name=value` or `name value` (with any number
//! of leading dashes on `name`). Binding runs in two stages: [`scan`] tags
//! every token as a flag or a variable binding, and [`reduce`] folds the tags
//! into a [`Command`].

use std::{fmt, path::PathBuf};

use clap::{CommandFactory, Parser};
use log::LevelFilter;
use stencil::{Syntax, VariableMap};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::{BindError, StencilError};

/// The control flags.
///
/// Nothing is parsed into this struct: [`scan`] reads its flag table and
/// [`usage`] renders its help. Defaults declared here are shown in the help
/// and must match the ones [`reduce`] applies.
#[derive(Debug, Parser)]
#[clap(
    name = "stencil",
    version,
    about = "Render a text template with variables given on the command line.",
    override_usage = "stencil [OPTIONS] [NAME=VALUE | --NAME VALUE]...",
    after_help = "Any other argument binds a template variable, e.g. `name=World` or \
                  `--name World`. Everything after `--` is a variable.",
    disable_help_flag(true),
    disable_version_flag(true)
)]
pub struct Cli {
    /// Template file to render.
    ///
    /// The template is read from standard input when this is not given.
    #[clap(
        help_heading = "Template",
        short,
        long,
        visible_alias = "template",
        value_name = "PATH"
    )]
    pub file: Option<PathBuf>,

    /// Use Go `text/template` syntax: `{{ .name }}`.
    #[clap(help_heading = "Syntax", short, long, visible_alias = "gotemplate")]
    pub go: bool,

    /// Use mustache syntax: `{{name}}`. This is the default.
    #[clap(help_heading = "Syntax", short, long, visible_alias = "moustache")]
    pub mustache: bool,

    /// Use colon syntax: `:name`.
    #[clap(help_heading = "Syntax", short, long)]
    pub colon: bool,

    /// Select the syntax by name: go, gotemplate, mustache, moustache or colon.
    ///
    /// When several syntax flags are given, the last one wins.
    #[clap(help_heading = "Syntax", long = "type", value_name = "NAME")]
    pub syntax: Option<String>,

    /// Comma-separated list of `key=value` variables.
    #[clap(help_heading = "Variables", long, value_name = "LIST")]
    pub variables: Option<String>,

    /// Utility log level
    ///
    /// Set to `trace` to print very low priority, often extremely
    /// verbose information.
    ///
    /// Set to `debug` to print the full report of a failure.
    ///
    /// Set to `off` to disable logging completely.
    #[clap(
        help_heading = "Meta",
        long,
        default_value = "warn",
        value_name = "LEVEL"
    )]
    pub log_level: LevelFilter,

    /// Equivalent to setting `log_level` to `off`.
    ///
    /// This would override the `log_level`.
    #[clap(help_heading = "Meta", short, long)]
    pub quiet: bool,

    /// Print logs in json format to be parsable.
    #[clap(help_heading = "Meta", long)]
    pub json_output: bool,

    /// Print version information
    #[clap(help_heading = "Meta", short = 'V', long)]
    pub version: bool,

    /// Print help information
    #[clap(help_heading = "Meta", short, long)]
    pub help: bool,
}

/// The control flags, named by their ids in [`Cli`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Flag {
    File,
    Go,
    Mustache,
    Colon,
    Syntax,
    Variables,
    LogLevel,
    Quiet,
    JsonOutput,
    Version,
    Help,
}

#[derive(Debug)]
struct FlagSpec {
    flag: Flag,
    longs: Vec<String>,
    short: Option<char>,
    takes_value: bool,
}

fn flag_table() -> Vec<FlagSpec> {
    let mut command = Cli::command();
    command.build();

    let table: Vec<FlagSpec> = command
        .get_arguments()
        .filter_map(|arg| {
            let flag = arg.get_id().as_str().parse().ok()?;
            let longs = arg
                .get_long()
                .into_iter()
                .chain(arg.get_all_aliases().unwrap_or_default())
                .map(str::to_owned)
                .collect();

            Some(FlagSpec {
                flag,
                longs,
                short: arg.get_short(),
                takes_value: arg.get_action().takes_values(),
            })
        })
        .collect();

    debug_assert_eq!(table.len(), Flag::iter().count(), "{table:?}");

    table
}

/// Find the flag `token` names, with its inline `=value` if any.
fn match_flag<'t, 'a>(table: &'t [FlagSpec], token: &'a str) -> Option<(&'t FlagSpec, Option<&'a str>)> {
    let (head, inline) = match token.split_once('=') {
        Some((head, value)) => (head, Some(value)),
        None => (token, None),
    };

    let spec = if let Some(long) = head.strip_prefix("--") {
        table.iter().find(|spec| spec.longs.iter().any(|l| l == long))
    } else if let Some(short) = head.strip_prefix('-') {
        let mut chars = short.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => table.iter().find(|spec| spec.short == Some(c)),
            _ => None,
        }
    } else {
        None
    }?;

    Some((spec, inline))
}

/// One tagged command line token, or a token with the value it consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Flag { flag: Flag, value: Option<String> },
    Binding { key: String, value: String },
}

/// Tag every token as a control flag or a variable binding.
///
/// Stops early at `-h`/`--help` and `-V`/`--version`.
pub fn scan<I>(tokens: I) -> Result<Vec<Arg>, BindError>
where
    I: IntoIterator<Item = String>,
{
    let table = flag_table();
    let mut tokens = tokens.into_iter();
    let mut args = Vec::new();
    let mut flags_done = false;

    while let Some(token) = tokens.next() {
        if !flags_done {
            if token == "--" {
                flags_done = true;
                continue;
            }

            if let Some((spec, inline)) = match_flag(&table, &token) {
                let value = match (spec.takes_value, inline) {
                    (true, Some(value)) => Some(value.to_owned()),
                    (true, None) => Some(
                        tokens
                            .next()
                            .ok_or_else(|| BindError::MissingValue(token.clone()))?,
                    ),
                    (false, Some(_)) => return Err(BindError::UnexpectedValue(token.clone())),
                    (false, None) => None,
                };

                let flag = spec.flag;
                args.push(Arg::Flag { flag, value });

                if matches!(flag, Flag::Help | Flag::Version) {
                    break;
                }
                continue;
            }
        }

        args.push(binding(token, &mut tokens)?);
    }

    Ok(args)
}

fn binding(token: String, rest: &mut impl Iterator<Item = String>) -> Result<Arg, BindError> {
    let (key, value) = match token.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (token.as_str(), None),
    };

    let key = key.trim_start_matches('-');
    if key.is_empty() {
        return Err(BindError::EmptyKey(token.clone()));
    }

    let key = key.to_owned();
    let value = match value {
        Some(value) => value.to_owned(),
        None => rest
            .next()
            .ok_or_else(|| BindError::MissingValue(token.clone()))?,
    };

    Ok(Arg::Binding { key, value })
}

/// Where the template text comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    #[default]
    Stdin,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::File(path) => write!(f, "{}", path.display()),
            TemplateSource::Stdin => f.write_str("standard input"),
        }
    }
}

/// A fully bound render request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub source: TemplateSource,
    pub syntax: Syntax,
    pub variables: VariableMap,
    pub log_level: LevelFilter,
    pub json_output: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Render(Invocation),
}

/// Fold scanned arguments into a [`Command`].
///
/// Later flags and bindings override earlier ones.
pub fn reduce(args: Vec<Arg>) -> Result<Command, StencilError> {
    let has_flag = |wanted: Flag| {
        args.iter()
            .any(|arg| matches!(arg, Arg::Flag { flag, .. } if *flag == wanted))
    };
    if has_flag(Flag::Help) {
        return Ok(Command::Help);
    }
    if has_flag(Flag::Version) {
        return Ok(Command::Version);
    }

    let mut source = TemplateSource::Stdin;
    let mut syntax = Syntax::default();
    let mut variables = VariableMap::new();
    let mut log_level = LevelFilter::Warn;
    let mut quiet = false;
    let mut json_output = false;

    for arg in args {
        let (flag, value) = match arg {
            Arg::Binding { key, value } => {
                variables.insert(key, value);
                continue;
            }
            Arg::Flag { flag, value } => (flag, value),
        };

        match (flag, value) {
            (Flag::File, Some(path)) => source = TemplateSource::File(path.into()),
            (Flag::Syntax, Some(name)) => syntax = name.parse()?,
            (Flag::Variables, Some(list)) => bind_variable_list(&list, &mut variables)?,
            (Flag::LogLevel, Some(level)) => {
                log_level = level
                    .parse()
                    .map_err(|_| BindError::InvalidLogLevel(level))?;
            }
            (Flag::File | Flag::Syntax | Flag::Variables | Flag::LogLevel, None) => {
                return Err(BindError::MissingValue(flag.to_string()).into());
            }
            (Flag::Go, _) => syntax = Syntax::GoTemplate,
            (Flag::Mustache, _) => syntax = Syntax::Mustache,
            (Flag::Colon, _) => syntax = Syntax::Colon,
            (Flag::Quiet, _) => quiet = true,
            (Flag::JsonOutput, _) => json_output = true,
            (Flag::Help | Flag::Version, _) => {}
        }
    }

    if quiet {
        log_level = LevelFilter::Off;
    }

    Ok(Command::Render(Invocation {
        source,
        syntax,
        variables,
        log_level,
        json_output,
    }))
}

/// Insert every `key=value` entry of a `--variables` list.
///
/// Empty entries are skipped; keys are trimmed, values kept as written.
fn bind_variable_list(list: &str, variables: &mut VariableMap) -> Result<(), BindError> {
    for entry in list.split(',').filter(|entry| !entry.trim().is_empty()) {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                variables.insert(key.trim(), value);
            }
            _ => return Err(BindError::InvalidVariables(entry.to_owned())),
        }
    }
    Ok(())
}

/// Bind a command line, given without the program name.
pub fn parse<I>(tokens: I) -> Result<Command, StencilError>
where
    I: IntoIterator<Item = String>,
{
    reduce(scan(tokens)?)
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

pub fn version() -> String {
    Cli::command().render_version()
}
