//! Host-facing session: configuration loading, optimization, frame bookkeeping and the run
//! entry points.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::assign;
use crate::command::parse::{DirectiveParser, SectionParse};
use crate::command::CommandKind;
use crate::device::{Device, ResourceHandle, ViewHandle};
use crate::engine::optimize::optimize;
use crate::engine::profile::ProfileReport;
use crate::engine::program::{Override, Program, SectionKind, qualify};
use crate::engine::run;
use crate::engine::state::{CallInfo, FrameState, RunState, State};
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::ids::{ListId, SectionId};
use crate::foundation::opts::SessionOpts;
use crate::preset::Preset;
use crate::resource::custom::CustomResource;
use crate::variables::persist::{self, PersistedValues};
use crate::variables::store::flat_param;

/// One `(section, key, value, namespace)` tuple produced by the configuration loader.
///
/// Keys and values are expected lower-cased. Flow-control lines carry the whole line in `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Section name without brackets, e.g. `commandlistfoo`.
    pub section: String,
    /// Directive key.
    pub key: String,
    /// Directive value; empty for key-only lines.
    #[serde(default)]
    pub value: String,
    /// Namespace of the file the entry came from; empty for the global namespace.
    #[serde(default)]
    pub namespace: String,
}

impl ConfigEntry {
    /// Entry in the global namespace.
    pub fn new(section: &str, key: &str, value: &str) -> Self {
        Self {
            section: section.to_owned(),
            key: key.to_owned(),
            value: value.to_owned(),
            namespace: String::new(),
        }
    }

    /// Same entry, in `namespace`.
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_owned();
        self
    }
}

/// Counts from [`Session::load`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Entries processed.
    pub entries: usize,
    /// Entries dropped because they failed to parse or resolve.
    pub failed: usize,
}

/// Signals raised while a command list ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// The host should skip the draw or dispatch this list wrapped.
    pub skip: bool,
    /// The invocation was cut short by `handling = abort` or the recursion ceiling.
    pub aborted: bool,
}

/// An interpreter session: every parsed section, variable, custom resource and pool.
///
/// Sections are parsed with [`Session::load`] (or entry by entry with [`Session::parse_entry`]),
/// then [`Session::optimize_command_lists`] runs once, after which the host calls
/// [`Session::begin_frame`] and the `run_*` entry points from its render loop.
#[derive(Debug)]
pub struct Session {
    program: Program,
    state: State,
    parsing: Option<SectionParse>,
    rejected_sections: HashSet<String>,
}

impl Session {
    /// Empty session.
    pub fn new(opts: SessionOpts) -> Self {
        Self {
            program: Program::default(),
            state: State::new(opts),
            parsing: None,
            rejected_sections: HashSet::new(),
        }
    }

    /// Options the session was created with.
    pub fn opts(&self) -> &SessionOpts {
        &self.state.opts
    }

    fn register_section(&mut self, name: &str, namespace: &str) -> ScriptResult<SectionId> {
        let qualified = qualify(name, namespace);
        if let Some(id) = self.program.find(&qualified) {
            return Ok(id);
        }
        let kind = match SectionKind::classify(name) {
            Some("constants") => SectionKind::Constants,
            Some("present") => SectionKind::Present,
            Some("commandlist") => SectionKind::CommandList,
            Some("shaderoverride") => SectionKind::ShaderOverride,
            Some("textureoverride") => SectionKind::TextureOverride,
            Some("resource") => {
                SectionKind::Resource(self.state.add_resource(CustomResource::new(&qualified)))
            }
            Some("preset") => SectionKind::Preset(self.state.add_preset(Preset::new(&qualified))),
            _ => return Err(ScriptError::invalid(format!("unknown section type [{name}]"))),
        };
        Ok(self.program.add_section(name, namespace, kind))
    }

    /// Parse a whole configuration.
    ///
    /// Every section is registered before any entry is parsed, so `run` and resource references
    /// may point forward. Constants are parsed first and custom resources second; failed entries
    /// are logged and dropped.
    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    pub fn load(&mut self, entries: &[ConfigEntry]) -> LoadReport {
        for e in entries {
            if let Err(err) = self.register_section(&e.section, &e.namespace)
                && self.rejected_sections.insert(qualify(&e.section, &e.namespace))
            {
                tracing::warn!(section = %e.section, %err, "ignoring section");
            }
        }

        let rank = |e: &ConfigEntry| match SectionKind::classify(&e.section) {
            Some("constants") => 0,
            Some("resource") => 1,
            _ => 2,
        };
        let mut ordered: Vec<&ConfigEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| rank(e));

        let mut report = LoadReport::default();
        for e in ordered {
            report.entries += 1;
            if self.parse_entry(e).is_err() {
                report.failed += 1;
            }
        }
        self.end_section();
        tracing::info!(
            entries = report.entries,
            failed = report.failed,
            sections = self.program.sections.len(),
            "configuration loaded"
        );
        report
    }

    /// Parse one entry. Entries of a section must arrive together; moving on to another section
    /// ends the previous one.
    pub fn parse_entry(&mut self, entry: &ConfigEntry) -> ScriptResult<()> {
        let result = self.try_parse_entry(entry);
        if let Err(err) = &result {
            let section = qualify(&entry.section, &entry.namespace);
            if self.rejected_sections.contains(&section) {
                return result;
            }
            match err {
                ScriptError::Syntax(syntax) => {
                    let src = if entry.value.is_empty() {
                        &entry.key
                    } else {
                        &entry.value
                    };
                    tracing::warn!(
                        %section,
                        key = %entry.key,
                        "syntax error, directive dropped:\n{}",
                        syntax.caret(src.trim())
                    );
                }
                _ => tracing::warn!(%section, key = %entry.key, %err, "directive dropped"),
            }
        }
        result
    }

    fn try_parse_entry(&mut self, entry: &ConfigEntry) -> ScriptResult<()> {
        let id = self.register_section(&entry.section, &entry.namespace)?;
        if self.parsing.as_ref().map(|p| p.section) != Some(id) {
            self.end_section();
            self.parsing = Some(SectionParse::new(id, &entry.namespace));
        }
        let Some(cx) = self.parsing.as_mut() else {
            return Err(ScriptError::internal("no section is being parsed"));
        };
        let key = entry.key.trim();
        let value = entry.value.trim();
        let kind = self.program.section(id).kind;
        let mut p = DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx,
        };
        match kind {
            SectionKind::Constants if key.starts_with("global ") => {
                assign::global(&mut p, key, value)
            }
            SectionKind::Constants | SectionKind::Present | SectionKind::CommandList => {
                p.parse(key, value)
            }
            SectionKind::ShaderOverride | SectionKind::TextureOverride => match key {
                "hash" => {
                    let hash = parse_hash(value)?;
                    p.program.section_mut(id).hash = Some(hash);
                    Ok(())
                }
                "filter_index" => {
                    let v = value.parse::<f32>().map_err(|_| {
                        ScriptError::invalid(format!("filter_index '{value}' is not a number"))
                    })?;
                    p.program.section_mut(id).filter_index = Some(v);
                    Ok(())
                }
                _ => p.parse(key, value),
            },
            SectionKind::Resource(res) => p.state.resource_mut(res).parse_key(key, value),
            SectionKind::Preset(preset) => {
                if p.state.preset_mut(preset).parse_setting(key, value)? {
                    return Ok(());
                }
                let entry = assign::preset_value(&mut p, key, value)?;
                p.state.preset_mut(preset).values.push(entry);
                Ok(())
            }
        }
    }

    /// Finish the section being parsed: close unterminated `if` blocks and register overrides.
    pub fn end_section(&mut self) {
        let Some(mut cx) = self.parsing.take() else {
            return;
        };
        DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx: &mut cx,
        }
        .finish();

        let id = cx.section;
        let section = self.program.section(id);
        let lists = section.lists;
        let filter_index = section.filter_index.unwrap_or(1.0);
        let ov = Override {
            section: id,
            lists,
            filter_index,
        };
        match (section.kind, section.hash) {
            (SectionKind::ShaderOverride, Some(hash)) => {
                if self.program.shader_overrides.contains_key(&hash) {
                    tracing::warn!(section = %section.name, hash = %format_args!("{hash:016x}"), "duplicate shader override ignored");
                } else {
                    self.program.shader_overrides.insert(hash, ov);
                }
            }
            (SectionKind::TextureOverride, Some(hash)) => match u32::try_from(hash) {
                Ok(hash) if !self.program.texture_overrides.contains_key(&hash) => {
                    self.program.texture_overrides.insert(hash, ov);
                }
                Ok(hash) => {
                    tracing::warn!(section = %section.name, hash = %format_args!("{hash:08x}"), "duplicate texture override ignored");
                }
                Err(_) => {
                    tracing::warn!(section = %section.name, "texture hash does not fit in 32 bits");
                }
            },
            (SectionKind::ShaderOverride | SectionKind::TextureOverride, None) => {
                tracing::warn!(section = %section.name, "override section without a hash");
            }
            _ => {}
        }
    }

    /// Run the optimizer to a fixed point. Returns how many commands were removed or inlined.
    #[tracing::instrument(skip(self))]
    pub fn optimize_command_lists(&mut self) -> usize {
        self.end_section();
        let stats = optimize(&mut self.program, &self.state.opts);
        (stats.removed + stats.inlined) as usize
    }

    /// Run every constants section once, pre phase then post phase.
    pub fn run_constants(&mut self, device: &mut dyn Device) {
        let lists: Vec<_> = self
            .program
            .sections
            .iter()
            .filter(|s| s.kind == SectionKind::Constants)
            .map(|s| s.lists)
            .collect();
        for post in [false, true] {
            for pair in &lists {
                self.run_list(device, pair.phase(post), &CallInfo::default());
            }
        }
    }

    /// Start a frame: update host state, reset per-frame copy quotas and advance presets.
    pub fn begin_frame(&mut self, frame: FrameState) {
        let state = &mut self.state;
        state.frame = frame;
        for res in &mut state.resources {
            res.copies_this_frame = 0;
        }
        for preset in &mut state.presets {
            preset.advance(frame.time, &mut state.vars, &mut state.params);
        }
    }

    fn run_list(&mut self, device: &mut dyn Device, list: ListId, call: &CallInfo) -> RunOutcome {
        let mut rs = RunState::default();
        run::run_list(&self.program, &mut self.state, device, call, &mut rs, list);
        RunOutcome {
            skip: rs.skip,
            aborted: rs.abort,
        }
    }

    /// Run a section's pre or post list around a draw, dispatch or present.
    pub fn run_command_list(
        &mut self,
        device: &mut dyn Device,
        section: SectionId,
        call: &CallInfo,
        post: bool,
    ) -> RunOutcome {
        let list = self.program.section(section).lists.phase(post);
        self.run_list(device, list, call)
    }

    /// Run a section's list on behalf of `resource`, which `this` then refers to.
    pub fn run_resource_command_list(
        &mut self,
        device: &mut dyn Device,
        section: SectionId,
        resource: ResourceHandle,
        post: bool,
    ) -> RunOutcome {
        self.run_command_list(device, section, &CallInfo::resource(resource), post)
    }

    /// Run a section's list on behalf of the resource behind `view`.
    pub fn run_view_command_list(
        &mut self,
        device: &mut dyn Device,
        section: SectionId,
        view: ViewHandle,
        post: bool,
    ) -> RunOutcome {
        let Some(resource) = device.view_resource(view) else {
            tracing::debug!(?view, "view command list on a view without a resource");
            return RunOutcome::default();
        };
        self.run_resource_command_list(device, section, resource, post)
    }

    /// Section registered as `name`, looked up in `namespace` first.
    pub fn section(&self, name: &str, namespace: &str) -> Option<SectionId> {
        self.program.lookup(name, namespace)
    }

    /// Qualified name of a section.
    pub fn section_name(&self, id: SectionId) -> &str {
        &self.program.section(id).name
    }

    /// Shader override section registered for `hash`.
    pub fn shader_override(&self, hash: u64) -> Option<SectionId> {
        self.program.shader_overrides.get(&hash).map(|o| o.section)
    }

    /// Texture override section registered for `hash`.
    pub fn texture_override(&self, hash: u32) -> Option<SectionId> {
        self.program.texture_overrides.get(&hash).map(|o| o.section)
    }

    /// Current value of a global variable (including the `$`).
    pub fn var(&self, name: &str) -> Option<&[f32]> {
        self.state.vars.global(name).map(|id| self.state.vars.value(id))
    }

    /// Overwrite a global variable from the host. Returns `false` if it does not exist.
    pub fn set_var(&mut self, name: &str, values: &[f32]) -> bool {
        let Some(id) = self.state.vars.global(name) else {
            return false;
        };
        let len = self.state.vars.info(id).shape.len();
        let range = self.state.vars.range(id, 0, len);
        self.state.vars.set_range(range, values.iter().copied());
        true
    }

    /// `x y z w` of ini parameter `index`.
    pub fn ini_param(&self, index: usize) -> [f32; 4] {
        self.state.params.vec4(index)
    }

    /// Set one ini parameter component, growing the table if needed.
    pub fn set_ini_param(&mut self, index: usize, component: u8, value: f32) -> ScriptResult<()> {
        if component > 3 {
            return Err(ScriptError::invalid(format!("component {component} out of range")));
        }
        self.state.params.ensure(index).map_err(ScriptError::invalid)?;
        self.state.params.set(flat_param(index, component), value);
        Ok(())
    }

    /// Current custom resource of a `[Resource*]` section, if it has been created.
    pub fn resource_handle(&self, name: &str, namespace: &str) -> Option<ResourceHandle> {
        let id = self.program.lookup(name, namespace)?;
        match self.program.section(id).kind {
            SectionKind::Resource(res) => self.state.resource(res).handle,
            _ => None,
        }
    }

    /// Profiling counters collected so far.
    pub fn profile_report(&self) -> ProfileReport {
        self.state.profiler.report(&self.program)
    }

    /// Clear the profiling counters.
    pub fn reset_profile(&mut self) {
        self.state.profiler.reset();
    }

    /// Persisted globals whose value changed since the last call.
    pub fn take_persist_updates(&mut self) -> PersistedValues {
        persist::take_changed(&mut self.state.vars)
    }

    /// All persisted globals.
    pub fn persisted(&self) -> PersistedValues {
        persist::snapshot(&self.state.vars)
    }

    /// Write every persisted global to `path` as JSON.
    pub fn save_persisted(&mut self, path: &Path) -> ScriptResult<()> {
        persist::save(&self.state.vars, path)?;
        self.state.vars.take_dirty();
        Ok(())
    }

    /// Restore persisted globals from `path`. Returns how many were applied.
    pub fn load_persisted(&mut self, path: &Path) -> ScriptResult<usize> {
        persist::load(&mut self.state.vars, path)
    }

    /// Release every custom resource, pooled resource, cached view and pending readback.
    pub fn release_resources(&mut self, device: &mut dyn Device) {
        for res in &mut self.state.resources {
            res.release(device);
        }
        for cache in &mut self.state.copy_caches {
            cache.release(device);
        }
        tracing::debug!("session resources released");
    }

    /// Total commands across every list.
    pub fn command_count(&self) -> usize {
        self.program.command_count()
    }

    /// Indented listing of a section's pre or post list, with `if` branches nested.
    pub fn dump(&self, section: SectionId, post: bool) -> String {
        let mut out = String::new();
        let list = self.program.section(section).lists.phase(post);
        self.dump_list(&mut out, list, post, 0);
        out
    }

    fn dump_list(&self, out: &mut String, list: ListId, post: bool, depth: usize) {
        for cmd in &self.program.list(list).commands {
            let indent = "  ".repeat(depth);
            let CommandKind::If(id) = cmd.kind else {
                let _ = writeln!(out, "{indent}{}", cmd.line);
                continue;
            };
            let block = self.program.block(id);
            let _ = writeln!(out, "{indent}if {}", block.cond);
            let Some(branches) = block.phase(post) else {
                let _ = writeln!(out, "{indent}  <unfinished>");
                continue;
            };
            self.dump_list(out, branches.then, post, depth + 1);
            if !self.program.list(branches.otherwise).commands.is_empty() {
                let _ = writeln!(out, "{indent}else");
                self.dump_list(out, branches.otherwise, post, depth + 1);
            }
            let _ = writeln!(out, "{indent}endif");
        }
    }
}

fn parse_hash(value: &str) -> ScriptResult<u64> {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(hex, 16)
        .map_err(|_| ScriptError::invalid(format!("hash '{value}' is not hexadecimal")))
}
