//! Option registration and resolution.
//!
//! # Data Flow
//! ```text
//! surface.rs (register_* declares <prefix>-<name> options)
//!     → flags.rs (FlagSet: typed values, defaults, changed bits)
//!     → clap parses the command line, FlagSet::apply_matches copies explicit values
//!     → env.rs (EnvOverrides fills untouched options from PREFIX_NAME variables)
//!     → hooks and server constructors read typed values
//! ```
//!
//! # Design Decisions
//! - Two layers only: explicit flag beats environment beats default
//! - One parser per kind, shared by command line and environment
//! - No configuration files

pub mod env;
pub mod flags;
pub mod surface;

pub use env::{env_var_name, EnvOverrides, EnvSource, ProcessEnv};
pub use flags::{Flag, FlagKind, FlagSet, FlagValue};
pub use surface::{
    register_grpc_server_flags, register_http_server_flags, register_logging_flags,
    register_tracing_flags,
};
