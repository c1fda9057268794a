use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::engine::program::Program;
use crate::foundation::ids::ListId;

#[derive(Debug, Clone, Copy, Default)]
struct ListStats {
    invocations: u64,
    cumulative: Duration,
    exclusive: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct CommandStats {
    invocations: u64,
    time: Duration,
}

/// Open list timing, returned by [`Profiler::enter`].
#[derive(Debug)]
pub(crate) struct ListTimer {
    start: Instant,
    saved_sub: Duration,
}

/// Cumulative and exclusive list timing plus optional per-command timing.
///
/// Exclusive time is cumulative time minus time spent in lists invoked from the list. The
/// sub-list accumulator is saved on entry and restored (plus the elapsed time) on exit.
#[derive(Debug, Default)]
pub(crate) struct Profiler {
    lists: HashMap<ListId, ListStats>,
    commands: HashMap<(ListId, usize), CommandStats>,
    sub_time: Duration,
    pub(crate) recursion_limit_hits: u64,
}

impl Profiler {
    pub(crate) fn enter(&mut self) -> ListTimer {
        let saved_sub = std::mem::take(&mut self.sub_time);
        ListTimer {
            start: Instant::now(),
            saved_sub,
        }
    }

    pub(crate) fn exit(&mut self, list: ListId, timer: ListTimer) {
        let elapsed = timer.start.elapsed();
        let inner = std::mem::replace(&mut self.sub_time, timer.saved_sub + elapsed);
        let stats = self.lists.entry(list).or_default();
        stats.invocations += 1;
        stats.cumulative += elapsed;
        stats.exclusive += elapsed.saturating_sub(inner);
    }

    pub(crate) fn record_command(&mut self, list: ListId, index: usize, elapsed: Duration) {
        let stats = self.commands.entry((list, index)).or_default();
        stats.invocations += 1;
        stats.time += elapsed;
    }

    pub(crate) fn reset(&mut self) {
        self.lists.clear();
        self.commands.clear();
        self.sub_time = Duration::ZERO;
        self.recursion_limit_hits = 0;
    }

    pub(crate) fn report(&self, program: &Program) -> ProfileReport {
        let mut lists: Vec<ListProfile> = self
            .lists
            .iter()
            .map(|(id, stats)| {
                let list = program.list(*id);
                let mut commands: Vec<(usize, CommandProfile)> = self
                    .commands
                    .iter()
                    .filter(|((l, _), _)| l == id)
                    .map(|((_, i), c)| {
                        let line = list
                            .commands
                            .get(*i)
                            .map_or_else(String::new, |cmd| cmd.line.clone());
                        (
                            *i,
                            CommandProfile {
                                line,
                                invocations: c.invocations,
                                time_us: micros(c.time),
                            },
                        )
                    })
                    .collect();
                commands.sort_by_key(|(i, _)| *i);
                ListProfile {
                    label: list.label.clone(),
                    post: list.post,
                    invocations: stats.invocations,
                    cumulative_us: micros(stats.cumulative),
                    exclusive_us: micros(stats.exclusive),
                    commands: commands.into_iter().map(|(_, c)| c).collect(),
                }
            })
            .collect();
        lists.sort_by(|a, b| {
            b.cumulative_us
                .total_cmp(&a.cumulative_us)
                .then_with(|| a.label.cmp(&b.label))
        });
        ProfileReport {
            lists,
            recursion_limit_hits: self.recursion_limit_hits,
        }
    }
}

fn micros(d: Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

/// Snapshot of the profiling counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProfileReport {
    /// Per-list counters, most expensive first.
    pub lists: Vec<ListProfile>,
    /// Invocations aborted by the recursion ceiling.
    pub recursion_limit_hits: u64,
}

/// Counters of one command list.
#[derive(Clone, Debug, Serialize)]
pub struct ListProfile {
    /// Section (or `if` branch) the list belongs to.
    pub label: String,
    /// Whether this is the post-phase list.
    pub post: bool,
    /// Times the list ran.
    pub invocations: u64,
    /// Total time including invoked sub-lists, in microseconds.
    pub cumulative_us: f64,
    /// Time excluding invoked sub-lists, in microseconds.
    pub exclusive_us: f64,
    /// Per-command counters; empty unless command profiling is on.
    pub commands: Vec<CommandProfile>,
}

/// Counters of one command.
#[derive(Clone, Debug, Serialize)]
pub struct CommandProfile {
    /// Directive the command was parsed from.
    pub line: String,
    /// Times the command ran.
    pub invocations: u64,
    /// Total time, in microseconds.
    pub time_us: f64,
}
