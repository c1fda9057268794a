use crate::command::parse::DirectiveParser;
use crate::command::{CommandKind, StereoParam};
use crate::expression::operand::{VarRef, element_offset, split_var_ref};
use crate::expression::{Expression, Resolve};
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::preset::PresetTarget;
use crate::resource::copy::CopyCommand;
use crate::resource::target::ResourceCopyTarget;
use crate::variables::store::{VarRange, VarShape, flat_param, parse_ini_param};

/// `x = expr`, `y3 = expr`.
pub(crate) fn param(p: &mut DirectiveParser<'_>, key: &str, value: &str) -> ScriptResult<CommandKind> {
    let Some((index, component)) = parse_ini_param(key) else {
        return Err(ScriptError::internal("not an ini parameter"));
    };
    p.ini_param(index).map_err(ScriptError::invalid)?;
    Ok(CommandKind::AssignParam {
        flat: flat_param(index, component),
        expr: Expression::parse(value, p)?,
    })
}

pub(crate) fn stereo(p: &mut DirectiveParser<'_>, key: &str, value: &str) -> ScriptResult<CommandKind> {
    let param = if key == "separation" {
        StereoParam::Separation
    } else {
        StereoParam::Convergence
    };
    Ok(CommandKind::SetStereo {
        param,
        expr: Expression::parse(value, p)?,
    })
}

/// Shape declared by `$name`, `$name[n]` or `$name[r][c]`.
pub(crate) fn declared_shape(r: &VarRef<'_>) -> ScriptResult<VarShape> {
    if r.count.is_some() {
        return Err(ScriptError::invalid(format!("element count in declaration of {}", r.name)));
    }
    let shape = match r.indices.as_slice() {
        [] => VarShape::Scalar,
        [n] => VarShape::Array(*n),
        [rows, cols] => VarShape::Matrix {
            rows: *rows,
            cols: *cols,
        },
        _ => {
            return Err(ScriptError::invalid(format!("{} has too many dimensions", r.name)));
        }
    };
    if shape.len() == 0 {
        return Err(ScriptError::invalid(format!("{} has no elements", r.name)));
    }
    Ok(shape)
}

/// `local $v`, `local $v = expr`, `local $arr[4]`.
pub(crate) fn local(
    p: &mut DirectiveParser<'_>,
    key: &str,
    value: &str,
) -> ScriptResult<Option<CommandKind>> {
    let decl = key.strip_prefix("local ").unwrap_or(key).trim();
    let r = split_var_ref(decl)?;
    let shape = declared_shape(&r)?;
    if r.name.contains('\\') {
        return Err(ScriptError::invalid(format!("local {} cannot be namespaced", r.name)));
    }

    // Parse the initialiser before the name becomes visible, so `local $x = $x` reads the global.
    let init = if value.is_empty() {
        None
    } else {
        Some(Expression::parse(value, p)?)
    };

    if p.cx.scope.lookup(r.name).is_some() {
        return Err(ScriptError::invalid(format!(
            "local {} is already declared in an enclosing scope",
            r.name
        )));
    }
    if p.global(r.name).is_some() {
        tracing::warn!(var = %r.name, "local variable masks a global of the same name");
    }
    let id = p.state.vars.declare_local(r.name, shape, p.cx.section);
    if p.cx.scope.declare(r.name, id).is_err() {
        return Err(ScriptError::internal(format!("scope rejected fresh local {}", r.name)));
    }

    Ok(init.map(|expr| CommandKind::AssignVar {
        target: p.state.vars.range(id, 0, shape.len()),
        expr,
    }))
}

/// Cells named by `$v`, `$a[i]`, `$m[r][c]` or `$a[i]n`. A bare array name covers the whole array.
fn var_range(p: &DirectiveParser<'_>, r: &VarRef<'_>) -> ScriptResult<VarRange> {
    let id = p
        .variable(r.name)
        .ok_or_else(|| ScriptError::unresolved(format!("undeclared variable {}", r.name)))?;
    let info = p.var_info(id);
    if r.indices.is_empty() {
        return Ok(p.state.vars.range(id, 0, info.shape.len()));
    }
    let offset = element_offset(info.shape, &r.indices)
        .map_err(|msg| ScriptError::invalid(format!("{}: {msg}", r.name)))?;
    Ok(p.state.vars.range(id, offset, r.count.unwrap_or(1)))
}

fn is_plain_var_ref(s: &str) -> bool {
    s.starts_with('$')
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'$' | b'_' | b'\\' | b'[' | b']' | b'.'))
}

/// `$v = expr`, `$a[i]n = expr`, `$a[i]n = $b[j]n`, `$a[i]n = readback <target>`.
pub(crate) fn variable(
    p: &mut DirectiveParser<'_>,
    key: &str,
    value: &str,
) -> ScriptResult<CommandKind> {
    let dst_ref = split_var_ref(key.trim())?;
    let dst = var_range(p, &dst_ref)?;
    let value = value.trim();

    if let Some(rest) = value.strip_prefix("readback ") {
        let cache = p.state.new_copy_cache();
        return Ok(CommandKind::Copy(CopyCommand::parse(
            ResourceCopyTarget::CpuReadback(dst),
            rest,
            p,
            cache,
        )?));
    }

    if is_plain_var_ref(value) {
        let src_ref = split_var_ref(value)?;
        let src = var_range(p, &src_ref)?;
        if src.len > 1 {
            let len = src.len.min(dst.len);
            return Ok(CommandKind::CopyVars {
                dst: VarRange { len, ..dst },
                src: VarRange { len, ..src },
            });
        }
    }

    Ok(CommandKind::AssignVar {
        target: dst,
        expr: Expression::parse(value, p)?,
    })
}

/// `global [persist] $name[dims] [= expr]` in a constants section.
pub(crate) fn global(p: &mut DirectiveParser<'_>, key: &str, value: &str) -> ScriptResult<()> {
    let mut words = key.split_whitespace();
    if words.next() != Some("global") {
        return Err(ScriptError::internal("not a global declaration"));
    }
    let mut persist = false;
    let mut decl = None;
    for w in words {
        match w {
            "persist" => persist = true,
            _ if decl.is_none() => decl = Some(w),
            _ => return Err(ScriptError::invalid(format!("unexpected '{w}' in '{key}'"))),
        }
    }
    let decl = decl.ok_or_else(|| ScriptError::invalid("global declaration without a name"))?;
    let r = split_var_ref(decl)?;
    let shape = declared_shape(&r)?;

    let name = match r.name.strip_prefix('$') {
        Some(bare) if !p.cx.namespace.is_empty() && !bare.starts_with('\\') => {
            format!("$\\{}\\{bare}", p.cx.namespace)
        }
        _ => r.name.to_owned(),
    };

    let init = if value.is_empty() {
        None
    } else {
        let expr = Expression::parse(value, p)?;
        let v = expr.static_evaluate(&p.state.opts).ok_or_else(|| {
            ScriptError::invalid(format!("initial value of {name} must be constant"))
        })?;
        Some(v)
    };

    let Some(id) = p.state.vars.declare_global(&name, shape, persist) else {
        return Err(ScriptError::invalid(format!("global {name} is already declared")));
    };
    if let Some(v) = init {
        let range = p.state.vars.range(id, 0, shape.len());
        p.state.vars.set_range(range, std::iter::repeat(v));
        // Initial values are not runtime changes.
        p.state.vars.take_dirty();
    }
    tracing::debug!(var = %name, ?shape, persist, "declared global");
    Ok(())
}

/// `x = 1` or `$v = 0.5` inside a preset section. Values must be constant.
pub(crate) fn preset_value(
    p: &mut DirectiveParser<'_>,
    key: &str,
    value: &str,
) -> ScriptResult<(PresetTarget, f32)> {
    let target = if let Some((index, component)) = parse_ini_param(key) {
        p.ini_param(index).map_err(ScriptError::invalid)?;
        PresetTarget::Param(flat_param(index, component))
    } else if key.starts_with('$') {
        let r = split_var_ref(key)?;
        let range = var_range(p, &r)?;
        if range.len != 1 {
            return Err(ScriptError::invalid(format!("preset target {key} must be one element")));
        }
        PresetTarget::Var(range.start)
    } else {
        return Err(ScriptError::invalid(format!("unknown preset setting '{key}'")));
    };
    let expr = Expression::parse(value, p)?;
    let v = expr
        .static_evaluate(&p.state.opts)
        .ok_or_else(|| ScriptError::invalid(format!("preset value for {key} must be constant")))?;
    Ok((target, v))
}

#[cfg(test)]
#[path = "../../tests/unit/command/assign.rs"]
mod tests;
