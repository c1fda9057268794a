/// Handle to a variable in the session's variable arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct VarId(pub(crate) u32);

/// Handle to a single phase command list in the list arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ListId(pub(crate) u32);

/// Handle to an `if` block shared by the pre and post phases of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BlockId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CustomResourceId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct PresetId(pub(crate) u32);

/// Public handle to a parsed configuration section that owns a pre/post command list pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub(crate) u32);

/// Pre/post list pair owned by one section or one branch of an `if` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListPair {
    pub(crate) pre: ListId,
    pub(crate) post: ListId,
}

impl ListPair {
    pub(crate) fn phase(self, post: bool) -> ListId {
        if post { self.post } else { self.pre }
    }
}

/// Runtime cache slot owned by one resource copy command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CopyCacheId(pub(crate) u32);
