//! Presets: named sets of constant assignments that blend in while triggered and back out once
//! released.

use std::f32::consts::PI;

use crate::foundation::error::{ScriptError, ScriptResult};
use crate::variables::store::{IniParams, Slot, VarStore};

/// Cell a preset writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PresetTarget {
    Param(u32),
    Var(Slot),
}

impl PresetTarget {
    fn read(self, vars: &VarStore, params: &IniParams) -> f32 {
        match self {
            Self::Param(flat) => params.get(flat),
            Self::Var(slot) => vars.get(slot),
        }
    }

    fn write(self, vars: &mut VarStore, params: &mut IniParams, value: f32) {
        match self {
            Self::Param(flat) => params.set(flat, value),
            Self::Var(slot) => vars.set(slot, value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum TransitionKind {
    #[default]
    Linear,
    Cosine,
}

impl TransitionKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "linear" => Some(Self::Linear),
            "cosine" => Some(Self::Cosine),
            _ => None,
        }
    }

    fn ease(self, t: f32) -> f32 {
        match self {
            Self::Linear => t,
            Self::Cosine => (1.0 - (t * PI).cos()) / 2.0,
        }
    }
}

/// Blend in progress between two sets of values.
#[derive(Debug, Clone, PartialEq)]
struct Blend {
    start: f32,
    duration_ms: f32,
    from: Vec<f32>,
    to: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Preset {
    pub(crate) name: String,
    pub(crate) values: Vec<(PresetTarget, f32)>,
    pub(crate) transition_ms: f32,
    pub(crate) release_ms: f32,
    pub(crate) kind: TransitionKind,
    triggered: bool,
    excluded: bool,
    active: bool,
    /// Values before the preset first engaged; restored on release.
    saved: Option<Vec<f32>>,
    blend: Option<Blend>,
}

impl Preset {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            values: Vec::new(),
            transition_ms: 0.0,
            release_ms: 0.0,
            kind: TransitionKind::Linear,
            triggered: false,
            excluded: false,
            active: false,
            saved: None,
            blend: None,
        }
    }

    /// Handle one of the preset's own settings. Returns `false` for keys that are assignments.
    pub(crate) fn parse_setting(&mut self, key: &str, value: &str) -> ScriptResult<bool> {
        let ms = |v: &str| {
            v.trim()
                .parse::<f32>()
                .ok()
                .filter(|ms| *ms >= 0.0)
                .ok_or_else(|| ScriptError::invalid(format!("bad transition time '{v}'")))
        };
        match key {
            "transition" => self.transition_ms = ms(value)?,
            "release_transition" => self.release_ms = ms(value)?,
            "transition_type" | "release_transition_type" => {
                self.kind = TransitionKind::parse(value.trim()).ok_or_else(|| {
                    ScriptError::invalid(format!("unknown transition type '{value}'"))
                })?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub(crate) fn trigger(&mut self) {
        self.triggered = true;
    }

    pub(crate) fn exclude(&mut self) {
        self.excluded = true;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Settle this frame's trigger state and write blended values.
    pub(crate) fn advance(&mut self, now: f32, vars: &mut VarStore, params: &mut IniParams) {
        let want = self.triggered && !self.excluded;
        self.triggered = false;
        self.excluded = false;

        if want != self.active {
            self.active = want;
            let current: Vec<f32> = self
                .values
                .iter()
                .map(|(t, _)| t.read(vars, params))
                .collect();
            let (to, duration_ms) = if want {
                if self.saved.is_none() {
                    self.saved = Some(current.clone());
                }
                (
                    self.values.iter().map(|(_, v)| *v).collect(),
                    self.transition_ms,
                )
            } else {
                (self.saved.clone().unwrap_or_else(|| current.clone()), self.release_ms)
            };
            tracing::debug!(preset = %self.name, active = want, "preset state changed");
            self.blend = Some(Blend {
                start: now,
                duration_ms,
                from: current,
                to,
            });
        }

        let Some(blend) = &self.blend else {
            return;
        };
        let t = if blend.duration_ms <= 0.0 {
            1.0
        } else {
            ((now - blend.start) * 1000.0 / blend.duration_ms).clamp(0.0, 1.0)
        };
        let w = self.kind.ease(t);
        for (((target, _), from), to) in self.values.iter().zip(&blend.from).zip(&blend.to) {
            target.write(vars, params, from + (to - from) * w);
        }
        if t >= 1.0 {
            self.blend = None;
            if !self.active {
                self.saved = None;
            }
        }
    }
}
