use std::collections::{BTreeSet, HashMap};

use crate::foundation::ids::{SectionId, VarId};

/// Index of one float cell in the variable arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Slot(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarShape {
    Scalar,
    Array(u32),
    Matrix { rows: u32, cols: u32 },
}

impl VarShape {
    pub(crate) fn len(self) -> u32 {
        match self {
            Self::Scalar => 1,
            Self::Array(n) => n,
            Self::Matrix { rows, cols } => rows * cols,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct VarFlags {
    pub(crate) global: bool,
    pub(crate) persist: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct VarInfo {
    pub(crate) name: String,
    pub(crate) shape: VarShape,
    pub(crate) base: Slot,
    pub(crate) flags: VarFlags,
    /// Section that declared a local; `None` for globals.
    pub(crate) owner: Option<SectionId>,
}

impl VarInfo {
    pub(crate) fn slot(&self, offset: u32) -> Slot {
        Slot(self.base.0 + offset.min(self.shape.len().saturating_sub(1)))
    }
}

/// Contiguous run of cells inside one variable, used by range assignment and readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarRange {
    pub(crate) var: VarId,
    pub(crate) start: Slot,
    pub(crate) len: u32,
}

/// Arena of every variable in a session.
///
/// Cells are never moved or freed while the session lives, so the `Slot` handles resolved while
/// parsing stay valid no matter how many variables are declared afterwards.
#[derive(Debug, Default)]
pub(crate) struct VarStore {
    cells: Vec<f32>,
    vars: Vec<VarInfo>,
    slot_owner: Vec<VarId>,
    globals: HashMap<String, VarId>,
    dirty: BTreeSet<VarId>,
}

impl VarStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, name: &str, shape: VarShape, flags: VarFlags, owner: Option<SectionId>) -> VarId {
        let id = VarId(self.vars.len() as u32);
        let base = Slot(self.cells.len() as u32);
        let len = shape.len().max(1) as usize;
        self.cells.resize(self.cells.len() + len, 0.0);
        self.slot_owner.resize(self.slot_owner.len() + len, id);
        self.vars.push(VarInfo {
            name: name.to_owned(),
            shape,
            base,
            flags,
            owner,
        });
        id
    }

    /// Declare a global. Returns `None` if the name is taken.
    pub(crate) fn declare_global(&mut self, name: &str, shape: VarShape, persist: bool) -> Option<VarId> {
        if self.globals.contains_key(name) {
            return None;
        }
        let id = self.alloc(
            name,
            shape,
            VarFlags {
                global: true,
                persist,
            },
            None,
        );
        self.globals.insert(name.to_owned(), id);
        Some(id)
    }

    /// Allocate a local owned by `owner`. Visibility is tracked by the parse-time scope stack.
    pub(crate) fn declare_local(&mut self, name: &str, shape: VarShape, owner: SectionId) -> VarId {
        self.alloc(name, shape, VarFlags::default(), Some(owner))
    }

    pub(crate) fn global(&self, name: &str) -> Option<VarId> {
        self.globals.get(name).copied()
    }

    pub(crate) fn info(&self, id: VarId) -> &VarInfo {
        &self.vars[id.0 as usize]
    }

    pub(crate) fn get(&self, slot: Slot) -> f32 {
        self.cells.get(slot.0 as usize).copied().unwrap_or(0.0)
    }

    pub(crate) fn value(&self, id: VarId) -> &[f32] {
        let info = self.info(id);
        let start = info.base.0 as usize;
        &self.cells[start..start + info.shape.len() as usize]
    }

    /// Write one cell, tracking persisted globals whose value actually changed.
    pub(crate) fn set(&mut self, slot: Slot, value: f32) {
        let i = slot.0 as usize;
        let Some(cell) = self.cells.get_mut(i) else {
            return;
        };
        if cell.to_bits() == value.to_bits() {
            return;
        }
        *cell = value;
        let owner = self.slot_owner[i];
        if self.vars[owner.0 as usize].flags.persist {
            self.dirty.insert(owner);
        }
    }

    pub(crate) fn set_range(&mut self, range: VarRange, values: impl IntoIterator<Item = f32>) {
        for (i, v) in values.into_iter().take(range.len as usize).enumerate() {
            self.set(Slot(range.start.0 + i as u32), v);
        }
    }

    /// Cells of `range`, clamped to the variable it belongs to.
    pub(crate) fn range(&self, var: VarId, offset: u32, count: u32) -> VarRange {
        let info = self.info(var);
        let len = info.shape.len();
        let offset = offset.min(len.saturating_sub(1));
        VarRange {
            var,
            start: Slot(info.base.0 + offset),
            len: count.clamp(1, len - offset),
        }
    }

    /// Persisted globals changed since the last call.
    pub(crate) fn take_dirty(&mut self) -> Vec<VarId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub(crate) fn persisted(&self) -> impl Iterator<Item = VarId> + '_ {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.flags.persist)
            .map(|(i, _)| VarId(i as u32))
    }

    pub(crate) fn len(&self) -> usize {
        self.vars.len()
    }
}

/// Ini parameters: `x y z w` per index, stored flat.
#[derive(Debug, Clone)]
pub(crate) struct IniParams {
    values: Vec<f32>,
    max: usize,
}

impl IniParams {
    pub(crate) fn new(count: usize, max: usize) -> Self {
        Self {
            values: vec![0.0; count.min(max) * 4],
            max,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.values.len() / 4
    }

    /// Make sure `index` exists, growing the table up to the configured maximum.
    pub(crate) fn ensure(&mut self, index: usize) -> Result<(), String> {
        if index >= self.max {
            return Err(format!(
                "ini parameter index {index} exceeds the maximum of {}",
                self.max
            ));
        }
        if index >= self.count() {
            self.values.resize((index + 1) * 4, 0.0);
        }
        Ok(())
    }

    pub(crate) fn get(&self, flat: u32) -> f32 {
        self.values.get(flat as usize).copied().unwrap_or(0.0)
    }

    pub(crate) fn set(&mut self, flat: u32, value: f32) {
        if let Some(v) = self.values.get_mut(flat as usize) {
            *v = value;
        }
    }

    pub(crate) fn vec4(&self, index: usize) -> [f32; 4] {
        let mut out = [0.0; 4];
        if let Some(s) = self.values.get(index * 4..index * 4 + 4) {
            out.copy_from_slice(s);
        }
        out
    }
}

/// Parse `x`, `y12`, `w3` into `(index, component)`.
pub(crate) fn parse_ini_param(name: &str) -> Option<(usize, u8)> {
    let mut chars = name.chars();
    let component = match chars.next()? {
        'x' => 0,
        'y' => 1,
        'z' => 2,
        'w' => 3,
        _ => return None,
    };
    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((0, component));
    }
    if !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().map(|i| (i, component))
}

pub(crate) fn flat_param(index: usize, component: u8) -> u32 {
    (index * 4 + component as usize) as u32
}

#[cfg(test)]
#[path = "../../tests/unit/variables/store.rs"]
mod tests;
