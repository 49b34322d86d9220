//! The context a command runs with.

use clap::ArgMatches;

use crate::config::FlagSet;
use crate::error::Result;

/// Commands the CLI framework provides itself. They take no part in
/// configuration resolution.
pub const BUILTIN_COMMANDS: &[&str] = &["help", "completion"];

/// One command execution: its name and its resolved options.
#[derive(Debug, Clone)]
pub struct Invocation {
    command: String,
    flags: FlagSet,
}

impl Invocation {
    pub fn new(command: impl Into<String>, flags: FlagSet) -> Self {
        Self {
            command: command.into(),
            flags,
        }
    }

    /// Build an invocation from parsed arguments. Only values that were
    /// given on the command line are marked as explicitly set.
    pub fn from_matches(command: impl Into<String>, mut flags: FlagSet, matches: &ArgMatches) -> Result<Self> {
        flags.apply_matches(matches)?;
        Ok(Self::new(command, flags))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut FlagSet {
        &mut self.flags
    }

    pub fn into_flags(self) -> FlagSet {
        self.flags
    }

    /// Whether this is a framework-provided pseudo-command.
    pub fn is_builtin(&self) -> bool {
        BUILTIN_COMMANDS.contains(&self.command.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_detection() {
        assert!(Invocation::new("help", FlagSet::new()).is_builtin());
        assert!(Invocation::new("completion", FlagSet::new()).is_builtin());
        assert!(!Invocation::new("serve", FlagSet::new()).is_builtin());
        assert!(!Invocation::new("helper", FlagSet::new()).is_builtin());
    }
}
