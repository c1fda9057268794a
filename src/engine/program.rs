use std::collections::HashMap;

use crate::command::Command;
use crate::expression::Expression;
use crate::foundation::ids::{BlockId, CustomResourceId, ListId, ListPair, PresetId, SectionId};

/// Section name prefixes that take part in namespace qualification.
const QUALIFIED_PREFIXES: [&str; 5] = [
    "commandlist",
    "shaderoverride",
    "textureoverride",
    "resource",
    "preset",
];

/// Name a section is registered under: `<prefix>\<namespace>\<rest>` inside a namespace.
pub(crate) fn qualify(name: &str, namespace: &str) -> String {
    if namespace.is_empty() || name.contains('\\') {
        return name.to_owned();
    }
    for prefix in QUALIFIED_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix)
            && !rest.is_empty()
        {
            return format!("{prefix}\\{namespace}\\{rest}");
        }
    }
    format!("{namespace}\\{name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionKind {
    Constants,
    Present,
    CommandList,
    ShaderOverride,
    TextureOverride,
    Resource(CustomResourceId),
    Preset(PresetId),
}

impl SectionKind {
    /// Kind implied by an unqualified section name, before per-kind state is allocated.
    pub(crate) fn classify(name: &str) -> Option<&'static str> {
        match name {
            "constants" => Some("constants"),
            "present" => Some("present"),
            _ => QUALIFIED_PREFIXES
                .into_iter()
                .find(|p| name.len() > p.len() && name.starts_with(p)),
        }
    }

    pub(crate) fn has_lists(self) -> bool {
        !matches!(self, Self::Resource(_) | Self::Preset(_))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) kind: SectionKind,
    pub(crate) lists: ListPair,
    /// Shader or texture hash for override sections.
    pub(crate) hash: Option<u64>,
    pub(crate) filter_index: Option<f32>,
}

/// Lists run when a shader or texture override matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Override {
    pub(crate) section: SectionId,
    pub(crate) lists: ListPair,
    pub(crate) filter_index: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandList {
    pub(crate) label: String,
    pub(crate) post: bool,
    pub(crate) commands: Vec<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Branches {
    pub(crate) then: ListId,
    pub(crate) otherwise: ListId,
}

/// An `if` block. Each phase is finalized separately when its `endif` is folded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IfBlock {
    pub(crate) cond: Expression,
    pub(crate) line: String,
    pub(crate) pre: Option<Branches>,
    pub(crate) post: Option<Branches>,
    /// Created by `elif`; closed by the same `endif` as its parent.
    pub(crate) synthetic: bool,
}

impl IfBlock {
    pub(crate) fn phase(&self, post: bool) -> Option<Branches> {
        if post { self.post } else { self.pre }
    }
}

/// Immutable-at-run-time arena of everything parsed from configuration.
#[derive(Debug, Default)]
pub(crate) struct Program {
    pub(crate) lists: Vec<CommandList>,
    pub(crate) blocks: Vec<IfBlock>,
    pub(crate) sections: Vec<Section>,
    names: HashMap<String, SectionId>,
    pub(crate) shader_overrides: HashMap<u64, Override>,
    pub(crate) texture_overrides: HashMap<u32, Override>,
    /// Whether every texture override list is empty, per phase (pre, post).
    texture_noop: [bool; 2],
}

impl Program {
    pub(crate) fn new_list(&mut self, label: impl Into<String>, post: bool) -> ListId {
        self.lists.push(CommandList {
            label: label.into(),
            post,
            commands: Vec::new(),
        });
        ListId(self.lists.len() as u32 - 1)
    }

    pub(crate) fn new_pair(&mut self, label: &str) -> ListPair {
        ListPair {
            pre: self.new_list(label, false),
            post: self.new_list(label, true),
        }
    }

    pub(crate) fn list(&self, id: ListId) -> &CommandList {
        &self.lists[id.0 as usize]
    }

    pub(crate) fn list_mut(&mut self, id: ListId) -> &mut CommandList {
        &mut self.lists[id.0 as usize]
    }

    pub(crate) fn new_block(&mut self, block: IfBlock) -> BlockId {
        self.blocks.push(block);
        BlockId(self.blocks.len() as u32 - 1)
    }

    pub(crate) fn block(&self, id: BlockId) -> &IfBlock {
        &self.blocks[id.0 as usize]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut IfBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub(crate) fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0 as usize]
    }

    pub(crate) fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0 as usize]
    }

    /// Register a section under its qualified name. Returns the existing id for repeats.
    pub(crate) fn add_section(
        &mut self,
        name: &str,
        namespace: &str,
        kind: SectionKind,
    ) -> SectionId {
        let qualified = qualify(name, namespace);
        if let Some(id) = self.names.get(&qualified) {
            return *id;
        }
        let lists = self.new_pair(&qualified);
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(Section {
            name: qualified.clone(),
            namespace: namespace.to_owned(),
            kind,
            lists,
            hash: None,
            filter_index: None,
        });
        self.names.insert(qualified, id);
        id
    }

    pub(crate) fn find(&self, qualified: &str) -> Option<SectionId> {
        self.names.get(qualified).copied()
    }

    /// Namespace-aware lookup: the name qualified with `namespace` first, then as given.
    pub(crate) fn lookup(&self, name: &str, namespace: &str) -> Option<SectionId> {
        if !namespace.is_empty()
            && let Some(id) = self.find(&qualify(name, namespace))
        {
            return Some(id);
        }
        self.find(name)
    }

    pub(crate) fn texture_overrides_noop(&self, post: bool) -> bool {
        self.texture_noop[usize::from(post)]
    }

    /// Recompute the per-phase "every texture override is empty" flags. Returns whether they changed.
    pub(crate) fn refresh_texture_noop(&mut self) -> bool {
        let flags = [false, true].map(|post| {
            self.texture_overrides
                .values()
                .all(|o| self.list(o.lists.phase(post)).commands.is_empty())
        });
        let changed = flags != self.texture_noop;
        self.texture_noop = flags;
        changed
    }

    pub(crate) fn command_count(&self) -> usize {
        self.lists.iter().map(|l| l.commands.len()).sum()
    }
}
