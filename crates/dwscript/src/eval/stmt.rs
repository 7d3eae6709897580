//! Statement and control-flow evaluation (component D, §4.D) plus
//! top-level declaration binding (`declare_block_decls`), which wires every
//! `Decl` variant into either the Environment (vars/consts/functions) or
//! the Type System Registry (records/classes/interfaces/enums/subranges/
//! arrays/aliases/helpers).

use crate::ast::{Block, CaseMatch, Decl, Stmt};
use crate::coerce::as_integer;
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError, Unwind};
use crate::eval::Evaluator;
use crate::value::{CallableBody, CallableValue, Value};

impl Evaluator {
    /// Binds every top-level (or unit-interface/implementation) declaration
    /// into `env`/the type registry, in source order (§4.C: later decls in
    /// the same block may reference earlier ones, e.g. a class using a
    /// record declared above it).
    pub(crate) fn declare_block_decls(&self, decls: &[Decl], env: &Environment) -> EvalResult<()> {
        for decl in decls {
            self.declare_one(decl, env)?;
        }
        Ok(())
    }

    fn declare_one(&self, decl: &Decl, env: &Environment) -> EvalResult<()> {
        match decl {
            Decl::Var(v) => {
                let value = match &v.initializer {
                    Some(init) => self.eval_expr(init, env)?.deref(),
                    None => match &v.type_expr {
                        Some(te) => {
                            let resolved = self.types.borrow().resolve_type_expr(te, v.pos).map_err(Unwind::Error)?;
                            resolved.zero_value()
                        }
                        None => Value::unassigned_variant(),
                    },
                };
                let static_class = self.named_class_of(v.type_expr.as_ref());
                env.define_typed(&v.name, value, static_class);
                Ok(())
            }
            Decl::Const(c) => {
                let value = self.eval_expr(&c.value, env)?.deref();
                env.define(&c.name, value);
                Ok(())
            }
            Decl::Alias(a) => {
                self.types.borrow_mut().register_alias(&a.name, a.target.clone());
                Ok(())
            }
            Decl::Record(r) => self.declare_record(r),
            Decl::Class(c) => self.declare_class(c),
            Decl::Interface(i) => self.declare_interface(i),
            Decl::Enum(e) => self.declare_enum(e),
            Decl::Subrange(s) => {
                self.types.borrow_mut().register_subrange(
                    &s.name,
                    std::rc::Rc::new(crate::types::SubrangeType {
                        name: s.name.clone(),
                        lo: s.lo,
                        hi: s.hi,
                    }),
                );
                Ok(())
            }
            Decl::ArrayType(a) => {
                self.types.borrow_mut().register_array(
                    &a.name,
                    std::rc::Rc::new(crate::types::ArrayType {
                        element: a.element.clone(),
                        bounds: a.bounds,
                    }),
                );
                Ok(())
            }
            Decl::Function(f) => {
                let callable = Value::Callable(std::rc::Rc::new(CallableValue {
                    name: f.name.clone(),
                    body: CallableBody::Function(std::rc::Rc::new(f.clone())),
                    closure: env.clone(),
                    receiver: None,
                    owner_class: None,
                }));
                env.define(&f.name, callable);
                Ok(())
            }
            Decl::Helper(h) => self.declare_helper(h),
        }
    }

    /// Evaluates a `Block`, threading a fresh child scope so locals
    /// declared inside it (via `VarDecl`/`Const` statements) don't leak
    /// outward. Returns the value of the final bare `Expr` statement, if
    /// any — used only by the top-level `initialization` section (§6).
    pub(crate) fn eval_block(&self, block: &Block, env: &Environment) -> EvalResult<Value> {
        let scope = Environment::new_enclosed(env);
        let mut result = Value::Nil;
        for stmt in block {
            result = self.eval_stmt(stmt, &scope)?;
        }
        Ok(result)
    }

    /// Like [`eval_block`](Self::eval_block) but reuses `env` directly
    /// instead of opening a new scope — used for a routine's top-level body
    /// so its parameters and locals share one frame (§4.D).
    pub(crate) fn eval_block_in(&self, block: &Block, env: &Environment) -> EvalResult<Value> {
        let mut result = Value::Nil;
        for stmt in block {
            result = self.eval_stmt(stmt, env)?;
        }
        Ok(result)
    }

    fn eval_stmt(&self, stmt: &Stmt, env: &Environment) -> EvalResult<Value> {
        match stmt {
            Stmt::Expr(e) => self.eval_expr(e, env),
            Stmt::VarDecl(v) => {
                self.declare_one(&Decl::Var(v.clone()), env)?;
                Ok(Value::Nil)
            }
            Stmt::Assign { target, value, pos } => {
                self.eval_assign(target, value, *pos, env)?;
                Ok(Value::Nil)
            }
            Stmt::Block(b) => self.eval_block(b, env),
            Stmt::If { cond, then_branch, else_branch, pos } => {
                self.note_position(*pos);
                if self.eval_expr(cond, env)?.deref().truthy(*pos)? {
                    self.eval_block(then_branch, env)
                } else if let Some(eb) = else_branch {
                    self.eval_block(eb, env)
                } else {
                    Ok(Value::Nil)
                }
            }
            Stmt::While { cond, body, pos } => {
                while self.eval_expr(cond, env)?.deref().truthy(*pos)? {
                    if let Some(signal) = self.run_loop_body(body, env)? {
                        if signal {
                            break;
                        }
                    }
                }
                Ok(Value::Nil)
            }
            Stmt::Repeat { body, cond, pos } => {
                loop {
                    if let Some(signal) = self.run_loop_body(body, env)? {
                        if signal {
                            break;
                        }
                    }
                    if self.eval_expr(cond, env)?.deref().truthy(*pos)? {
                        break;
                    }
                }
                Ok(Value::Nil)
            }
            Stmt::For { var, from, to, step, down, body, pos } => {
                self.eval_for(var, from, to, step.as_ref(), *down, body, *pos, env)
            }
            Stmt::ForIn { var, iterable, body, pos } => self.eval_for_in(var, iterable, body, *pos, env),
            Stmt::Case { subject, arms, else_branch, pos } => {
                self.eval_case(subject, arms, else_branch.as_ref(), *pos, env)
            }
            Stmt::Try { body, handlers, has_bare_except, finally, pos } => {
                self.eval_try(body, handlers, has_bare_except.as_ref(), finally.as_ref(), *pos, env)
            }
            Stmt::Raise { value, pos } => self.eval_raise(value.as_ref(), *pos, env),
            Stmt::Break(pos) => Err(Unwind::Break(*pos)),
            Stmt::Continue(pos) => Err(Unwind::Continue(*pos)),
            Stmt::Exit(pos) => Err(Unwind::Exit(*pos)),
        }
    }

    /// Runs one loop-body iteration, translating `Break`/`Continue` into
    /// the loop's own control flow instead of propagating them further
    /// (§4.D): `Ok(Some(true))` means "stop the loop", `Ok(Some(false))`
    /// and `Ok(None)` both mean "keep looping" (the distinction is kept for
    /// callers that want to tell a `continue` apart from a plain fallthrough,
    /// though none currently do).
    fn run_loop_body(&self, body: &Block, env: &Environment) -> EvalResult<Option<bool>> {
        match self.eval_block(body, env) {
            Ok(_) => Ok(None),
            Err(Unwind::Break(_)) => Ok(Some(true)),
            Err(Unwind::Continue(_)) => Ok(Some(false)),
            Err(other) => Err(other),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_for(
        &self,
        var: &str,
        from: &crate::ast::Expr,
        to: &crate::ast::Expr,
        step: Option<&crate::ast::Expr>,
        down: bool,
        body: &Block,
        pos: crate::ast::Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let scope = Environment::new_enclosed(env);
        let start = as_integer(&self.eval_expr(from, &scope)?, pos)?;
        let end = as_integer(&self.eval_expr(to, &scope)?, pos)?;
        let step_val = match step {
            Some(e) => {
                let n = as_integer(&self.eval_expr(e, &scope)?, pos)?;
                if n <= 0 {
                    return Err(RuntimeError::new(
                        pos,
                        format!("FOR loop STEP should be strictly positive: {n}"),
                    )
                    .into());
                }
                n
            }
            None => 1,
        };
        scope.define(var, Value::Integer(start));
        let mut i = start;
        loop {
            if down {
                if i < end {
                    break;
                }
            } else if i > end {
                break;
            }
            scope.set(var, Value::Integer(i))?;
            match self.eval_block(body, &scope) {
                Ok(_) => {}
                Err(Unwind::Break(_)) => break,
                Err(Unwind::Continue(_)) => {}
                Err(other) => return Err(other),
            }
            if down {
                i -= step_val;
            } else {
                i += step_val;
            }
        }
        Ok(Value::Nil)
    }

    fn eval_for_in(
        &self,
        var: &str,
        iterable: &crate::ast::Expr,
        body: &Block,
        pos: crate::ast::Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let scope = Environment::new_enclosed(env);
        let subject = self.eval_expr(iterable, &scope)?.deref();
        let items: Vec<Value> = match &subject {
            Value::Array(arr) => arr.borrow().elements.clone(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            // Enum type value (e.g. `for c in TColor do`): sweeps every
            // ordinal from low to high inclusive, gaps included (§9's
            // resolved open question), not just declared names.
            Value::TypeValue(crate::value::TypeDescriptorValue::Enum(e)) => {
                (e.low()..=e.high()).map(|n| Value::new_enum(e.clone(), n)).collect()
            }
            other => {
                return Err(RuntimeError::new(pos, format!("type mismatch: cannot iterate over {}", other.type_name())).into())
            }
        };
        scope.define(var, Value::Nil);
        for item in items {
            scope.set(var, item)?;
            match self.eval_block(body, &scope) {
                Ok(_) => {}
                Err(Unwind::Break(_)) => break,
                Err(Unwind::Continue(_)) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Nil)
    }

    fn eval_case(
        &self,
        subject: &crate::ast::Expr,
        arms: &[crate::ast::CaseArm],
        else_branch: Option<&Block>,
        pos: crate::ast::Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let value = self.eval_expr(subject, env)?.deref();
        for arm in arms {
            for m in &arm.matches {
                let matched = match m {
                    CaseMatch::Value(e) => {
                        let candidate = self.eval_expr(e, env)?.deref();
                        value.values_equal(&candidate, pos)?
                    }
                    CaseMatch::Range(lo, hi) => {
                        let lo_v = self.eval_expr(lo, env)?.deref();
                        let hi_v = self.eval_expr(hi, env)?.deref();
                        value.compare(&lo_v, pos)?.is_ge() && value.compare(&hi_v, pos)?.is_le()
                    }
                };
                if matched {
                    return self.eval_block(&arm.body, env);
                }
            }
        }
        match else_branch {
            Some(b) => self.eval_block(b, env),
            None => Ok(Value::Nil),
        }
    }
}
