//! Environment-variable overrides for registered options.
//!
//! # Responsibilities
//! - Derive the variable name for each flag under a prefix
//! - Apply present variables to options not set on the command line
//! - Expand `$VAR` references inside path-like option values
//!
//! # Design Decisions
//! - Explicit command-line input always wins over the environment
//! - Values go through `FlagSet::set`, the same parser the command line uses
//! - The environment is behind a trait so resolution is testable without
//!   mutating the process environment

use std::collections::HashMap;

use crate::error::Result;
use crate::lifecycle::hooks::Hook;
use crate::lifecycle::invocation::Invocation;

/// Read-only view of an environment.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

fn env_segment(s: &str) -> String {
    s.replace('-', "_").to_uppercase()
}

/// Variable consulted for `flag` under `prefix`.
///
/// `env_var_name("myapp", "log-level")` is `MYAPP_LOG_LEVEL`; with an empty
/// prefix it is just `LOG_LEVEL`.
pub fn env_var_name(prefix: &str, flag: &str) -> String {
    if prefix.is_empty() {
        env_segment(flag)
    } else {
        format!("{}_{}", env_segment(prefix), env_segment(flag))
    }
}

/// Expand `$NAME` and `${NAME}` using `lookup`. Unset names expand to "".
pub fn expand_env(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(&lookup(&braced[..end]).unwrap_or_default());
                    rest = &braced[end + 1..];
                }
                None => {
                    // Unterminated; keep the text as written.
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
            continue;
        }

        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            out.push('$');
        } else {
            out.push_str(&lookup(&after[..len]).unwrap_or_default());
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

/// Hook that fills unset options from prefixed environment variables.
#[derive(Debug, Clone)]
pub struct EnvOverrides<E = ProcessEnv> {
    prefix: String,
    env: E,
}

impl EnvOverrides<ProcessEnv> {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_source(prefix, ProcessEnv)
    }
}

impl<E: EnvSource> EnvOverrides<E> {
    pub fn with_source(prefix: impl Into<String>, env: E) -> Self {
        Self {
            prefix: prefix.into(),
            env,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A set but empty variable counts as unset.
    fn value(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|text| !text.is_empty())
    }
}

impl<E: EnvSource> Hook for EnvOverrides<E> {
    fn run(&self, invocation: &mut Invocation) -> Result<()> {
        if invocation.is_builtin() {
            return Ok(());
        }

        let pending: Vec<(String, String)> = invocation
            .flags()
            .iter()
            .filter(|flag| !flag.changed())
            .filter_map(|flag| {
                let key = env_var_name(&self.prefix, flag.name());
                self.value(&key).map(|_| (flag.name().to_string(), key))
            })
            .collect();

        for (flag, key) in pending {
            if let Some(text) = self.value(&key) {
                invocation.flags_mut().set(&flag, &text)?;
                tracing::debug!(flag = %flag, env = %key, "applied environment override");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlagSet;
    use crate::error::Error;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn invocation(command: &str) -> Invocation {
        let mut flags = FlagSet::new();
        flags
            .string("log-level", "info", "")
            .bool("grpc-enabled", false, "")
            .string("grpc-tls-cert-path", "", "");
        Invocation::new(command, flags)
    }

    #[test]
    fn variable_names() {
        assert_eq!(env_var_name("myapp", "log-level"), "MYAPP_LOG_LEVEL");
        assert_eq!(env_var_name("my-app", "grpc-tls-cert-path"), "MY_APP_GRPC_TLS_CERT_PATH");
        assert_eq!(env_var_name("", "http-addr"), "HTTP_ADDR");
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let mut inv = invocation("serve");
        EnvOverrides::with_source("app", env(&[("OTHER", "x")]))
            .run(&mut inv)
            .unwrap();

        assert_eq!(inv.flags().get_string("log-level").unwrap(), "info");
        assert!(inv.flags().iter().all(|f| !f.changed()));
    }

    #[test]
    fn present_variables_apply_through_the_parser() {
        let mut inv = invocation("serve");
        EnvOverrides::with_source(
            "app",
            env(&[("APP_LOG_LEVEL", "debug"), ("APP_GRPC_ENABLED", "1")]),
        )
        .run(&mut inv)
        .unwrap();

        assert_eq!(inv.flags().get_string("log-level").unwrap(), "debug");
        assert!(inv.flags().get_bool("grpc-enabled").unwrap());
        assert!(inv.flags().changed("grpc-enabled"));
    }

    #[test]
    fn explicit_values_win() {
        let mut inv = invocation("serve");
        inv.flags_mut().set("log-level", "error").unwrap();

        EnvOverrides::with_source("app", env(&[("APP_LOG_LEVEL", "trace")]))
            .run(&mut inv)
            .unwrap();

        assert_eq!(inv.flags().get_string("log-level").unwrap(), "error");
    }

    #[test]
    fn malformed_values_fail() {
        let mut inv = invocation("serve");
        let err = EnvOverrides::with_source("app", env(&[("APP_GRPC_ENABLED", "maybe")]))
            .run(&mut inv)
            .unwrap_err();

        assert!(matches!(err, Error::Coercion { ref flag, .. } if flag == "grpc-enabled"));
    }

    #[test]
    fn empty_variables_keep_defaults() {
        let mut inv = invocation("serve");
        EnvOverrides::with_source(
            "app",
            env(&[("APP_GRPC_ENABLED", ""), ("APP_LOG_LEVEL", "")]),
        )
        .run(&mut inv)
        .unwrap();

        assert!(!inv.flags().get_bool("grpc-enabled").unwrap());
        assert_eq!(inv.flags().get_string("log-level").unwrap(), "info");
        assert!(!inv.flags().changed("grpc-enabled"));
        assert!(!inv.flags().changed("log-level"));
    }

    #[test]
    fn builtins_are_skipped() {
        let mut inv = invocation("help");
        EnvOverrides::with_source("app", env(&[("APP_LOG_LEVEL", "trace")]))
            .run(&mut inv)
            .unwrap();

        assert_eq!(inv.flags().get_string("log-level").unwrap(), "info");
    }

    #[test]
    fn expansion() {
        let lookup = |key: &str| match key {
            "HOME" => Some("/home/svc".to_string()),
            "TLS_DIR" => Some("/etc/tls".to_string()),
            _ => None,
        };
        assert_eq!(expand_env("$HOME/cert.pem", lookup), "/home/svc/cert.pem");
        assert_eq!(expand_env("${TLS_DIR}/key.pem", lookup), "/etc/tls/key.pem");
        assert_eq!(expand_env("$MISSING:8080", lookup), ":8080");
        assert_eq!(expand_env("cost $5 and $", lookup), "cost  and $");
        assert_eq!(expand_env("${UNCLOSED", lookup), "${UNCLOSED");
        assert_eq!(expand_env("plain", lookup), "plain");
    }
}
