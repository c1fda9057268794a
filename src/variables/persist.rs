use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::ScriptResult;
use crate::foundation::ids::VarId;
use crate::variables::store::VarStore;

/// Stored value of one persisted global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedValue {
    /// Scalar variable.
    Scalar(f32),
    /// Array or matrix, row-major.
    Array(Vec<f32>),
}

impl PersistedValue {
    fn from_cells(cells: &[f32], scalar: bool) -> Self {
        if scalar {
            Self::Scalar(cells.first().copied().unwrap_or(0.0))
        } else {
            Self::Array(cells.to_vec())
        }
    }

    fn cells(&self) -> &[f32] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::Array(v) => v,
        }
    }
}

/// Name to value map of persisted globals, as written to the user's settings file.
pub type PersistedValues = BTreeMap<String, PersistedValue>;

pub(crate) fn snapshot(vars: &VarStore) -> PersistedValues {
    collect(vars, vars.persisted())
}

/// Persisted globals changed since the last call, with their current values.
pub(crate) fn take_changed(vars: &mut VarStore) -> PersistedValues {
    let dirty = vars.take_dirty();
    collect(vars, dirty)
}

fn collect(vars: &VarStore, ids: impl IntoIterator<Item = VarId>) -> PersistedValues {
    ids.into_iter()
        .map(|id| {
            let info = vars.info(id);
            let scalar = matches!(info.shape, crate::variables::store::VarShape::Scalar);
            (
                info.name.clone(),
                PersistedValue::from_cells(vars.value(id), scalar),
            )
        })
        .collect()
}

/// Apply stored values to matching persisted globals. Returns how many were applied.
pub(crate) fn apply(vars: &mut VarStore, values: &PersistedValues) -> usize {
    let mut applied = 0;
    for (name, value) in values {
        let Some(id) = vars.global(name) else {
            tracing::debug!(%name, "ignoring stored value for unknown global");
            continue;
        };
        if !vars.info(id).flags.persist {
            tracing::debug!(%name, "ignoring stored value for non-persisted global");
            continue;
        }
        let len = vars.info(id).shape.len();
        let range = vars.range(id, 0, len);
        vars.set_range(range, value.cells().iter().copied());
        applied += 1;
    }
    // Loading is not a runtime change.
    vars.take_dirty();
    applied
}

pub(crate) fn save(vars: &VarStore, path: &Path) -> ScriptResult<()> {
    let json = serde_json::to_string_pretty(&snapshot(vars)).context("serialize persisted globals")?;
    std::fs::write(path, json)
        .with_context(|| format!("write persisted globals '{}'", path.display()))?;
    Ok(())
}

pub(crate) fn load(vars: &mut VarStore, path: &Path) -> ScriptResult<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read persisted globals '{}'", path.display()))?;
    let values: PersistedValues = serde_json::from_str(&text)
        .with_context(|| format!("parse persisted globals '{}'", path.display()))?;
    Ok(apply(vars, &values))
}
