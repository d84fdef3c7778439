use serde::{Deserialize, Serialize};
use xc_core::config::{
    bool_from_env, env_true, usize_from_env, ENV_MAX_ERRORS, ENV_MAX_SWEEPS, ENV_VERBOSE,
    ENV_WARN_UNREACHABLE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Upper bound on name-resolution sweeps. `None` derives it from the tree: depth plus the
    /// number of deferrable nodes plus one.
    pub max_resolve_sweeps: Option<usize>,
    /// Serious diagnostics tolerated before a unit is abandoned; 0 means no limit.
    pub max_errors: usize,
    /// Warn on the first unreachable statement of a block.
    pub warn_unreachable: bool,
    /// Log a disassembly of every emitted method.
    pub verbose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_resolve_sweeps: None,
            max_errors: 0,
            warn_unreachable: true,
            verbose: false,
        }
    }
}

impl CompileOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_resolve_sweeps: usize_from_env(ENV_MAX_SWEEPS),
            max_errors: usize_from_env(ENV_MAX_ERRORS).unwrap_or(defaults.max_errors),
            warn_unreachable: env_true(ENV_WARN_UNREACHABLE).unwrap_or(defaults.warn_unreachable),
            verbose: bool_from_env(ENV_VERBOSE),
        }
    }

    pub fn with_max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_resolve_sweeps = Some(sweeps);
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_warn_unreachable(mut self, warn: bool) -> Self {
        self.warn_unreachable = warn;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
