use std::collections::HashMap;

use crate::foundation::ids::VarId;

/// Parse-time stack of local variable frames, one per nested `if`/`else` body.
///
/// Only lives while a section is being parsed; finished commands hold resolved slots.
#[derive(Debug, Clone)]
pub(crate) struct ScopeStack {
    frames: Vec<HashMap<String, VarId>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pop the innermost frame. The section-level frame is never popped.
    pub(crate) fn pop(&mut self) -> bool {
        if self.frames.len() <= 1 {
            return false;
        }
        self.frames.pop();
        true
    }

    /// Nesting depth; 0 at section level.
    pub(crate) fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Innermost-first lookup across every enclosing frame.
    pub(crate) fn lookup(&self, name: &str) -> Option<VarId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }

    /// Add `name` to the innermost frame.
    ///
    /// Fails if the name is already visible from here: redeclaring in an enclosing frame is
    /// rejected rather than shadowed.
    pub(crate) fn declare(&mut self, name: &str, id: VarId) -> Result<(), VarId> {
        if let Some(existing) = self.lookup(name) {
            return Err(existing);
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_owned(), id);
        }
        Ok(())
    }
}
