use serde::{Deserialize, Serialize};

/// Which profiling counters the execution engine maintains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilingMode {
    /// No timing is taken.
    #[default]
    Off,
    /// Cumulative/exclusive time per command list.
    Lists,
    /// List timing plus per-command timing.
    Commands,
}

impl ProfilingMode {
    pub(crate) fn lists(self) -> bool {
        !matches!(self, Self::Off)
    }

    pub(crate) fn commands(self) -> bool {
        matches!(self, Self::Commands)
    }
}

/// Options controlling a [`Session`](crate::Session).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOpts {
    /// Maximum nesting depth for sub-list invocation before an invocation is aborted.
    pub recursion_limit: u32,
    /// Profiling counters to maintain while running command lists.
    pub profiling: ProfilingMode,
    /// Initial number of ini parameter slots (each holds `x y z w`).
    pub ini_params: usize,
    /// Upper bound for ini parameter indices referenced by scripts.
    pub max_ini_params: usize,
    /// Whether the interactive hunting overlay is enabled. Folded as a constant.
    pub hunting: bool,
    /// Whether frame analysis is enabled. Folded as a constant.
    pub frame_analysis: bool,
    /// Whether the host runs in SLI/multi-GPU mode. Folded as a constant.
    pub sli: bool,
    /// Whether stereo commands and queries are enabled at all.
    pub stereo: bool,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            recursion_limit: 64,
            profiling: ProfilingMode::Off,
            ini_params: 8,
            max_ini_params: 4096,
            hunting: false,
            frame_analysis: false,
            sli: false,
            stereo: true,
        }
    }
}

impl SessionOpts {
    /// Parse options from a JSON document; missing fields keep their defaults.
    pub fn from_json(s: &str) -> crate::ScriptResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| crate::ScriptError::invalid(format!("session options: {e}")))
    }
}
