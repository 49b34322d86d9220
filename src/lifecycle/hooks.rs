//! Pre-execution hooks and their composition.

use crate::error::Result;
use crate::lifecycle::invocation::Invocation;

/// A configuration side effect applied before a command body runs.
pub trait Hook {
    fn run(&self, invocation: &mut Invocation) -> Result<()>;
}

impl<F> Hook for F
where
    F: Fn(&mut Invocation) -> Result<()>,
{
    fn run(&self, invocation: &mut Invocation) -> Result<()> {
        self(invocation)
    }
}

/// An ordered list of hooks run as one.
///
/// Hooks run in insertion order on the same invocation. The first failure is
/// returned immediately and the remaining hooks do not run; effects of the
/// hooks that already ran are not undone.
#[derive(Default)]
pub struct HookStack {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook, builder style.
    pub fn with(mut self, hook: impl Hook + 'static) -> Self {
        self.push(hook);
        self
    }

    pub fn push(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl FromIterator<Box<dyn Hook>> for HookStack {
    fn from_iter<I: IntoIterator<Item = Box<dyn Hook>>>(iter: I) -> Self {
        Self {
            hooks: iter.into_iter().collect(),
        }
    }
}

impl Hook for HookStack {
    fn run(&self, invocation: &mut Invocation) -> Result<()> {
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(err) = hook.run(invocation) {
                tracing::debug!(hook = index, command = invocation.command(), error = %err, "pre-run hook failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookStack").field("len", &self.hooks.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlagSet;
    use crate::error::Error;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> impl Hook {
        let log = Arc::clone(log);
        move |_: &mut Invocation| {
            log.lock().unwrap().push(name);
            if fail {
                Err(Error::UnrecognizedLevel(name.to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = HookStack::new()
            .with(recorder(&log, "a", false))
            .with(recorder(&log, "b", true))
            .with(recorder(&log, "c", false));

        let mut inv = Invocation::new("serve", FlagSet::new());
        let err = stack.run(&mut inv).unwrap_err();

        assert!(matches!(err, Error::UnrecognizedLevel(ref name) if name == "b"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn runs_everything_in_order_on_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack: HookStack = vec![
            Box::new(recorder(&log, "a", false)) as Box<dyn Hook>,
            Box::new(recorder(&log, "b", false)),
            Box::new(recorder(&log, "c", false)),
        ]
        .into_iter()
        .collect();

        let mut inv = Invocation::new("serve", FlagSet::new());
        stack.run(&mut inv).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn later_hooks_see_earlier_mutations() {
        let mut flags = FlagSet::new();
        flags.string("log-level", "info", "");

        let stack = HookStack::new()
            .with(|inv: &mut Invocation| inv.flags_mut().set("log-level", "warn"))
            .with(|inv: &mut Invocation| -> Result<()> {
                assert_eq!(inv.flags().get_string("log-level")?, "warn");
                Ok(())
            });

        stack.run(&mut Invocation::new("serve", flags)).unwrap();
    }

    #[test]
    fn stacks_nest_and_empty_succeeds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = HookStack::new().with(recorder(&log, "inner", false));
        let outer = HookStack::new().with(HookStack::new()).with(inner).with(recorder(&log, "outer", false));

        outer.run(&mut Invocation::new("serve", FlagSet::new())).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["inner", "outer"]);
    }
}
