//! Typed option registry.
//!
//! Options are declared with a kind and a default. Every piece of textual
//! input, whether it comes from the command line or the environment, is
//! parsed through [`FlagValue::parse`], so coercion behaves the same no
//! matter where a value came from.

use std::fmt;
use std::time::Duration;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::config::env::{expand_env, EnvSource, ProcessEnv};
use crate::error::{Error, Result};

/// The declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Bool,
    Duration,
}

impl FlagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagKind::String => "string",
            FlagKind::Bool => "bool",
            FlagKind::Duration => "duration",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    String(String),
    Bool(bool),
    Duration(Duration),
}

impl FlagValue {
    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::String(_) => FlagKind::String,
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::Duration(_) => FlagKind::Duration,
        }
    }

    /// Parse `text` as a value of `kind`.
    pub fn parse(kind: FlagKind, text: &str) -> std::result::Result<Self, String> {
        match kind {
            FlagKind::String => Ok(FlagValue::String(text.to_string())),
            FlagKind::Bool => parse_bool(text).map(FlagValue::Bool),
            FlagKind::Duration => humantime::parse_duration(text.trim())
                .map(FlagValue::Duration)
                .map_err(|err| err.to_string()),
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::String(s) => f.write_str(s),
            FlagValue::Bool(b) => write!(f, "{b}"),
            FlagValue::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
        }
    }
}

fn parse_bool(text: &str) -> std::result::Result<bool, String> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(format!("expected a boolean, got {text:?}")),
    }
}

/// A single registered option.
#[derive(Debug, Clone)]
pub struct Flag {
    name: String,
    usage: String,
    default: FlagValue,
    value: FlagValue,
    changed: bool,
}

impl Flag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn value(&self) -> &FlagValue {
        &self.value
    }

    /// Whether the value was explicitly set rather than left at its default.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

/// Ordered registry of options for one command.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: Vec<Flag>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a string option.
    pub fn string(
        &mut self,
        name: impl Into<String>,
        default: impl Into<String>,
        usage: impl Into<String>,
    ) -> &mut Self {
        self.define(name.into(), FlagValue::String(default.into()), usage.into())
    }

    /// Declare a boolean option.
    pub fn bool(&mut self, name: impl Into<String>, default: bool, usage: impl Into<String>) -> &mut Self {
        self.define(name.into(), FlagValue::Bool(default), usage.into())
    }

    /// Declare a duration option.
    pub fn duration(
        &mut self,
        name: impl Into<String>,
        default: Duration,
        usage: impl Into<String>,
    ) -> &mut Self {
        self.define(name.into(), FlagValue::Duration(default), usage.into())
    }

    /// Re-declaring a name replaces the earlier declaration in place.
    fn define(&mut self, name: String, default: FlagValue, usage: String) -> &mut Self {
        let flag = Flag {
            name,
            usage,
            value: default.clone(),
            default,
            changed: false,
        };
        match self.flags.iter_mut().find(|f| f.name == flag.name) {
            Some(existing) => *existing = flag,
            None => self.flags.push(flag),
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Parse `text` into the named option and mark it changed.
    pub fn set(&mut self, name: &str, text: &str) -> Result<()> {
        let flag = self
            .flags
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::UnknownFlag(name.to_string()))?;

        flag.value = FlagValue::parse(flag.kind(), text).map_err(|reason| Error::Coercion {
            flag: name.to_string(),
            value: text.to_string(),
            reason,
        })?;
        flag.changed = true;
        Ok(())
    }

    /// Whether the named option was explicitly set. Unknown names are unchanged.
    pub fn changed(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(Flag::changed)
    }

    fn value(&self, name: &str) -> Result<&FlagValue> {
        self.lookup(name)
            .map(Flag::value)
            .ok_or_else(|| Error::UnknownFlag(name.to_string()))
    }

    fn wrong_kind(name: &str, expected: FlagKind, actual: &FlagValue) -> Error {
        Error::FlagType {
            flag: name.to_string(),
            expected: expected.as_str(),
            actual: actual.kind().as_str(),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        match self.value(name)? {
            FlagValue::String(s) => Ok(s),
            other => Err(Self::wrong_kind(name, FlagKind::String, other)),
        }
    }

    /// Like [`get_string`](Self::get_string) with `$VAR` and `${VAR}`
    /// expanded from the process environment.
    pub fn get_string_expanded(&self, name: &str) -> Result<String> {
        let raw = self.get_string(name)?;
        Ok(expand_env(raw, |key| ProcessEnv.var(key)))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.value(name)? {
            FlagValue::Bool(b) => Ok(*b),
            other => Err(Self::wrong_kind(name, FlagKind::Bool, other)),
        }
    }

    pub fn get_duration(&self, name: &str) -> Result<Duration> {
        match self.value(name)? {
            FlagValue::Duration(d) => Ok(*d),
            other => Err(Self::wrong_kind(name, FlagKind::Duration, other)),
        }
    }

    /// Add one long argument per option to `cmd`.
    ///
    /// Values are kept as raw text so that [`apply_matches`](Self::apply_matches)
    /// can run them through the registry's own parsers.
    pub fn augment(&self, cmd: Command) -> Command {
        self.flags.iter().fold(cmd, |cmd, flag| {
            let arg = Arg::new(flag.name.clone())
                .long(flag.name.clone())
                .help(flag.usage.clone())
                .default_value(flag.default.to_string())
                .action(ArgAction::Set);

            let arg = match flag.kind() {
                FlagKind::Bool => arg
                    .num_args(0..=1)
                    .require_equals(true)
                    .default_missing_value("true"),
                FlagKind::Duration => arg.value_name("DURATION"),
                FlagKind::String => arg.value_name("STRING"),
            };
            cmd.arg(arg)
        })
    }

    /// Copy values that were given on the command line into the registry.
    ///
    /// Values clap filled in from defaults are skipped, so they stay
    /// unchanged and remain eligible for environment overrides.
    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<()> {
        let names: Vec<String> = self.flags.iter().map(|f| f.name.clone()).collect();
        for name in names {
            let text = match matches.try_get_one::<String>(&name) {
                Ok(Some(text)) => text.clone(),
                _ => continue,
            };
            if matches.value_source(&name) != Some(ValueSource::CommandLine) {
                continue;
            }
            self.set(&name, &text)?;
        }
        Ok(())
    }
}
