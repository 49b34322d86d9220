//! Command lifecycle.
//!
//! # Data Flow
//! ```text
//! Pre-execution (hooks.rs, invocation.rs):
//!     Invocation { command, flags } → HookStack [env, logging, tracing] → command body
//!
//! Shutdown (shutdown.rs):
//!     trigger → every listener's signal future resolves → listeners drain and stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Hooks run sequentially and fail fast; nothing is rolled back
//! - Builtin pseudo-commands (help, completion) skip every configurator
//! - Shutdown is an explicit value passed to listeners, not ambient state

pub mod hooks;
pub mod invocation;
pub mod shutdown;
pub mod signals;

pub use hooks::{Hook, HookStack};
pub use invocation::{Invocation, BUILTIN_COMMANDS};
pub use shutdown::Shutdown;
