//! Overload resolution (§3.2, §4.E rule 2): filter candidates by arity, then
//! score each by per-argument convertibility, lowest total wins, ties are
//! ambiguous.

use std::rc::Rc;

use crate::ast::{Param, Position, TypeExpr};
use crate::errors::RuntimeError;
use crate::types::{MethodEntry, PrimitiveType, ResolvedType, TypeRegistry};
use crate::value::Value;

/// Per-argument convertibility score: exact type = 0, widening
/// (Int→Float, child→parent, T→Variant) = 1, anything else scored as
/// "needs user conversion" = 2. An untyped formal (no declared type)
/// always scores 0 — it accepts anything exactly.
fn score_value_against_type(value: &Value, type_expr: &TypeExpr, types: &TypeRegistry) -> u32 {
    let resolved = match types.resolve_type_expr(type_expr, Position::default()) {
        Ok(r) => r,
        Err(_) => return 1,
    };
    score_value_against_resolved(value, &resolved)
}

fn score_value_against_resolved(value: &Value, resolved: &ResolvedType) -> u32 {
    use ResolvedType::*;
    match (value.deref(), resolved) {
        (Value::Integer(_), Primitive(PrimitiveType::Integer)) => 0,
        (Value::Float(_), Primitive(PrimitiveType::Float)) => 0,
        (Value::Integer(_), Primitive(PrimitiveType::Float)) => 1,
        (Value::Str(_), Primitive(PrimitiveType::StringT)) => 0,
        (Value::Boolean(_), Primitive(PrimitiveType::Boolean)) => 0,
        (_, Primitive(PrimitiveType::Variant)) => 1,
        (Value::Variant(_), _) => 1,
        (Value::Enum(e), Enum(et)) if Rc::ptr_eq(&e.enum_type, et) => 0,
        (Value::Record(r), Record(ri)) if Rc::ptr_eq(&r.descriptor, ri) => 0,
        (Value::Array(_), Array(_)) => 0,
        (Value::Subrange { subrange, .. }, Subrange(s)) if Rc::ptr_eq(&subrange, s) => 0,
        (Value::Subrange { .. }, Primitive(PrimitiveType::Integer)) => 1,
        (Value::Nil, Class(_)) => 0,
        (Value::Object(o), Class(c)) => {
            let dynamic = Rc::clone(&o.borrow().class);
            if Rc::ptr_eq(&dynamic, c) {
                0
            } else if crate::types::ClassInfo::inherits_from(&dynamic, &c.borrow().name) {
                1
            } else {
                2
            }
        }
        (Value::Interface { descriptor, .. }, Interface(i)) if Rc::ptr_eq(&descriptor, i) => 0,
        _ => 2,
    }
}

/// Counts the declared params that have no default (the minimum arity a
/// call must supply).
fn min_arity(params: &[Param]) -> usize {
    params.iter().filter(|p| p.default.is_none()).count()
}

fn arity_matches(params: &[Param], arg_count: usize) -> bool {
    arg_count >= min_arity(params) && arg_count <= params.len()
}

/// Scores one candidate's whole parameter list against the supplied
/// arguments. Parameters left unsupplied (covered by a default) score 0.
fn score_candidate(params: &[Param], args: &[Value], types: &TypeRegistry) -> u32 {
    params
        .iter()
        .zip(args.iter().map(Some).chain(std::iter::repeat(None)))
        .take(params.len())
        .map(|(p, arg)| match (arg, &p.type_expr) {
            (Some(v), Some(te)) => score_value_against_type(v, te, types),
            _ => 0,
        })
        .sum()
}

/// Resolves an overload set down to one candidate per §4.E rules 1-2.
/// Parameterless constructors are preferred when `args` is empty (rule 3);
/// that preference falls naturally out of arity filtering since only the
/// zero-arg candidate(s) survive when `args.len() == 0` and every
/// non-defaulted-param candidate is excluded.
pub fn resolve_overload<'a>(
    candidates: &'a [Rc<MethodEntry>],
    args: &[Value],
    types: &TypeRegistry,
    pos: Position,
    label: &str,
) -> Result<&'a Rc<MethodEntry>, RuntimeError> {
    let eligible: Vec<&Rc<MethodEntry>> = candidates
        .iter()
        .filter(|c| arity_matches(c.params(), args.len()))
        .collect();
    if eligible.is_empty() {
        return Err(RuntimeError::new(
            pos,
            format!("no overload of '{label}' accepts {} argument(s)", args.len()),
        ));
    }
    if eligible.len() == 1 {
        return Ok(eligible[0]);
    }
    let mut scored: Vec<(u32, &Rc<MethodEntry>)> = eligible
        .into_iter()
        .map(|c| (score_candidate(c.params(), args, types), c))
        .collect();
    scored.sort_by_key(|(s, _)| *s);
    let best = scored[0].0;
    let winners: Vec<_> = scored.iter().filter(|(s, _)| *s == best).collect();
    if winners.len() > 1 {
        return Err(RuntimeError::new(pos, format!("ambiguous call to overloaded '{label}'")));
    }
    Ok(scored[0].1)
}
