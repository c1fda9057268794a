use crate::command::assign;
use crate::command::flow::{self, Flow};
use crate::command::{ClearCommand, Command, CommandKind, DrawCommand, Handling};
use crate::engine::program::{Program, SectionKind};
use crate::engine::state::State;
use crate::expression::Resolve;
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::ids::{BlockId, CustomResourceId, SectionId, VarId};
use crate::resource::copy::CopyCommand;
use crate::resource::target::parse_target;
use crate::variables::scope::ScopeStack;
use crate::variables::store::{VarInfo, parse_ini_param};

/// An `if` whose `endif` has not been seen yet.
#[derive(Debug, Clone)]
pub(crate) struct OpenIf {
    pub(crate) block: BlockId,
    pub(crate) has_else: bool,
    pub(crate) line: String,
}

/// Parse-time state of the section currently being read.
#[derive(Debug)]
pub(crate) struct SectionParse {
    pub(crate) section: SectionId,
    pub(crate) namespace: String,
    pub(crate) scope: ScopeStack,
    pub(crate) open: Vec<OpenIf>,
}

impl SectionParse {
    pub(crate) fn new(section: SectionId, namespace: &str) -> Self {
        Self {
            section,
            namespace: namespace.to_owned(),
            scope: ScopeStack::new(),
            open: Vec::new(),
        }
    }
}

/// Which phase lists a command is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Pre,
    Post,
    Both,
}

/// Strip a `pre ` or `post ` prefix.
fn split_phase(key: &str) -> (Option<Phase>, &str) {
    if let Some(rest) = key.strip_prefix("pre ") {
        (Some(Phase::Pre), rest.trim_start())
    } else if let Some(rest) = key.strip_prefix("post ") {
        (Some(Phase::Post), rest.trim_start())
    } else {
        (None, key)
    }
}

/// Builds commands for one section, resolving names against the session.
pub(crate) struct DirectiveParser<'a> {
    pub(crate) program: &'a mut Program,
    pub(crate) state: &'a mut State,
    pub(crate) cx: &'a mut SectionParse,
}

impl Resolve for DirectiveParser<'_> {
    fn variable(&self, name: &str) -> Option<VarId> {
        if let Some(id) = self.cx.scope.lookup(name) {
            return Some(id);
        }
        self.global(name)
    }

    fn var_info(&self, id: VarId) -> &VarInfo {
        self.state.vars.info(id)
    }

    fn ini_param(&mut self, index: usize) -> Result<(), String> {
        self.state.params.ensure(index)
    }

    fn custom_resource(&self, name: &str) -> Option<CustomResourceId> {
        let id = self.program.lookup(name, &self.cx.namespace)?;
        match self.program.section(id).kind {
            SectionKind::Resource(res) => Some(res),
            _ => None,
        }
    }
}

impl DirectiveParser<'_> {
    /// Global visible as `name` from this section's namespace.
    pub(crate) fn global(&self, name: &str) -> Option<VarId> {
        if !self.cx.namespace.is_empty()
            && let Some(bare) = name.strip_prefix('$')
            && !bare.starts_with('\\')
            && let Some(id) = self
                .state
                .vars
                .global(&format!("$\\{}\\{bare}", self.cx.namespace))
        {
            return Some(id);
        }
        self.state.vars.global(name)
    }

    fn section_label(&self) -> String {
        self.program.section(self.cx.section).name.clone()
    }

    /// Parse one `key = value` directive of a command-list section.
    pub(crate) fn parse(&mut self, key: &str, value: &str) -> ScriptResult<()> {
        if let Some(flow) = Flow::classify(key, value) {
            return flow::apply(self, flow);
        }

        let line = if value.is_empty() {
            key.to_owned()
        } else {
            format!("{key} = {value}")
        };
        let (forced, key) = split_phase(key);
        let Some((kind, default_phase)) = self.command(key, value)? else {
            return Ok(());
        };
        let phase = forced.unwrap_or(default_phase);
        self.push(Command::new(line, kind), phase);
        Ok(())
    }

    pub(crate) fn push(&mut self, cmd: Command, phase: Phase) {
        let lists = self.program.section(self.cx.section).lists;
        match phase {
            Phase::Pre => self.program.list_mut(lists.pre).commands.push(cmd),
            Phase::Post => self.program.list_mut(lists.post).commands.push(cmd),
            Phase::Both => {
                self.program.list_mut(lists.pre).commands.push(cmd.clone());
                self.program.list_mut(lists.post).commands.push(cmd);
            }
        }
    }

    /// Build the command for `key`. `None` for declarations that produce no command.
    fn command(&mut self, key: &str, value: &str) -> ScriptResult<Option<(CommandKind, Phase)>> {
        let kind = match key {
            "run" => {
                let id = self
                    .program
                    .lookup(value.trim(), &self.cx.namespace)
                    .filter(|id| self.program.section(*id).kind == SectionKind::CommandList)
                    .ok_or_else(|| ScriptError::unresolved(format!("command list '{value}'")))?;
                let lists = self.program.section(id).lists;
                return Ok(Some((CommandKind::Run { section: id, lists }, Phase::Both)));
            }
            "checktextureoverride" => {
                let target = parse_target(value.trim(), self)?
                    .ok_or_else(|| ScriptError::invalid(format!("'{value}' is not a bind target")))?;
                return Ok(Some((CommandKind::CheckTextureOverride(target), Phase::Both)));
            }
            "preset" | "exclude_preset" => {
                let id = self
                    .program
                    .lookup(value.trim(), &self.cx.namespace)
                    .and_then(|id| match self.program.section(id).kind {
                        SectionKind::Preset(p) => Some(p),
                        _ => None,
                    })
                    .ok_or_else(|| ScriptError::unresolved(format!("preset '{value}'")))?;
                CommandKind::Preset {
                    id,
                    exclude: key == "exclude_preset",
                }
            }
            "handling" => match value.trim() {
                "skip" => CommandKind::Handling(Handling::Skip),
                "abort" => CommandKind::Handling(Handling::Abort),
                other => {
                    return Err(ScriptError::invalid(format!("unknown handling '{other}'")));
                }
            },
            "clear" => CommandKind::Clear(ClearCommand::parse(value, self)?),
            "reset_per_frame_limits" => {
                let id = self.custom_resource(value.trim()).ok_or_else(|| {
                    ScriptError::unresolved(format!("custom resource '{value}'"))
                })?;
                CommandKind::ResetPerFrameLimits(id)
            }
            "separation" | "convergence" => assign::stereo(self, key, value)?,
            _ if DrawCommand::is_draw_key(key) => {
                CommandKind::Draw(DrawCommand::parse(key, value, self)?)
            }
            _ if key.starts_with("local ") => match assign::local(self, key, value)? {
                Some(kind) => kind,
                None => return Ok(None),
            },
            _ if key.starts_with('$') => assign::variable(self, key, value)?,
            _ if parse_ini_param(key).is_some() => assign::param(self, key, value)?,
            _ => {
                let Some(dst) = parse_target(key, self)? else {
                    return Err(ScriptError::invalid(format!("unknown directive '{key}'")));
                };
                let cache = self.state.new_copy_cache();
                CommandKind::Copy(CopyCommand::parse(dst, value, self, cache)?)
            }
        };
        Ok(Some((kind, Phase::Pre)))
    }

    /// Close every `if` left open at the end of the section.
    pub(crate) fn finish(&mut self) {
        while let Some(open) = self.cx.open.last() {
            tracing::warn!(
                section = %self.section_label(),
                line = %open.line,
                "unterminated if block; closing it at the end of the section"
            );
            if let Err(err) = flow::apply(self, Flow::EndIf) {
                tracing::error!(%err, "failed to close if block");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/command/parse.rs"]
mod tests;
