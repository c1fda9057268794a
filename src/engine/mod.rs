//! Command list execution: the program arena, runtime state, the recursive runner, profiling
//! and the fixed-point optimizer.

pub(crate) mod optimize;
pub(crate) mod profile;
pub(crate) mod program;
pub(crate) mod run;
pub(crate) mod state;
