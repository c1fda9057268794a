//! The expression sub-language: lexer, operand resolution, sweep parser and evaluation tree.
//!
//! Expressions are parsed once when a directive is loaded. Every operand is bound to its storage
//! (a variable slot, an ini parameter, a bind target) at that point, so evaluation never looks
//! anything up by name.

pub(crate) mod ast;
pub(crate) mod error;
pub(crate) mod lexer;
pub(crate) mod operand;
pub(crate) mod parser;

use std::fmt;

use crate::device::Device;
use crate::engine::program::Program;
use crate::engine::state::{CallInfo, State};
use crate::expression::ast::Node;
use crate::foundation::error::ScriptResult;
use crate::foundation::ids::{CustomResourceId, VarId};
use crate::foundation::opts::SessionOpts;
use crate::variables::store::VarInfo;

/// Name resolution available while an expression is parsed.
pub(crate) trait Resolve {
    /// Variable visible under `name` (including the leading `$`).
    fn variable(&self, name: &str) -> Option<VarId>;
    fn var_info(&self, id: VarId) -> &VarInfo;
    /// Make ini parameter `index` addressable.
    fn ini_param(&mut self, index: usize) -> Result<(), String>;
    /// Custom resource section referenced as `name`.
    fn custom_resource(&self, name: &str) -> Option<CustomResourceId>;
}

/// Everything an expression may read while running.
pub(crate) struct EvalCtx<'a> {
    pub(crate) state: &'a State,
    pub(crate) program: &'a Program,
    pub(crate) device: &'a dyn Device,
    pub(crate) call: &'a CallInfo,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expression {
    root: Node,
    src: String,
}

impl Expression {
    pub(crate) fn parse(src: &str, r: &mut dyn Resolve) -> ScriptResult<Self> {
        let src = src.trim();
        Ok(Self {
            root: parser::parse(src, r)?,
            src: src.to_owned(),
        })
    }

    /// Expression that always yields `value`.
    pub(crate) fn constant(value: f32) -> Self {
        Self {
            root: Node::Operand(operand::Operand::literal(value)),
            src: operand::format_literal(value),
        }
    }

    pub(crate) fn evaluate(&self, ctx: &EvalCtx<'_>) -> f32 {
        self.root.eval(ctx)
    }

    /// Value of the expression if it does not depend on any runtime state.
    pub(crate) fn static_evaluate(&self, opts: &SessionOpts) -> Option<f32> {
        self.root.static_eval(opts)
    }

    /// Fold constant sub-trees. Returns whether the tree changed.
    pub(crate) fn optimize(&mut self, opts: &SessionOpts) -> bool {
        self.root.optimize(opts)
    }

    pub(crate) fn is_literal(&self) -> bool {
        self.root.is_literal()
    }

    pub(crate) fn source(&self) -> &str {
        &self.src
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
