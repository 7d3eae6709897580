//! Function/method invocation (component D/G, §4.D rule set for calls,
//! §4.G for the pre/postcondition hooks): parameter binding (by-value,
//! `var`, lazy, default), the `Result`/`Self` bindings, and contract
//! checking around the call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{Expr, Param, Position};
use crate::builtins::Builtin;
use crate::contracts::{collect_old_idents, OldSnapshot};
use crate::contracts::clean_contract_text;
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError, StackFrame, Unwind};
use crate::eval::{ActiveMethod, Evaluator};
use crate::value::{CallableBody, CallableValue, LazyThunk, Value};

/// Pushes an [`ActiveMethod`] frame for the duration of one method body and
/// pops it on every exit path, including an early contract-check error
/// return — plain push/pop pairs around `run_invocation`'s several return
/// points would miss those.
struct MethodGuard<'a> {
    stack: &'a RefCell<Vec<ActiveMethod>>,
    pushed: bool,
}

impl<'a> MethodGuard<'a> {
    fn new(stack: &'a RefCell<Vec<ActiveMethod>>, entry: Option<ActiveMethod>) -> Self {
        let pushed = entry.is_some();
        if let Some(e) = entry {
            stack.borrow_mut().push(e);
        }
        Self { stack, pushed }
    }
}

impl Drop for MethodGuard<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.stack.borrow_mut().pop();
        }
    }
}

impl Evaluator {
    /// `Expr::Call` dispatch (§4.D "Call expression"): a bare identifier
    /// callee first checks the Environment for a user-defined function
    /// value (user declarations shadow built-ins of the same name), then
    /// the Built-in Library, and only then fails; any other callee
    /// expression must evaluate to a `Callable`.
    pub(crate) fn eval_call_expr(
        &self,
        callee: &Expr,
        args: &[Expr],
        pos: Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        if let Expr::Ident(name, _) = callee {
            if let Some(Value::Callable(c)) = env.get(name) {
                return self.call_callable(&c, args, pos, env, None);
            }
            if let Ok(builtin) = name.parse::<Builtin>() {
                return self.call_builtin(builtin, args, pos, env);
            }
            return Err(RuntimeError::new(pos, format!("undefined function: {name}")).into());
        }
        let callee_val = self.eval_expr(callee, env)?.deref();
        match callee_val {
            Value::Callable(c) => self.call_callable(&c, args, pos, env, None),
            other => Err(RuntimeError::new(pos, format!("type mismatch: cannot call {}", other.type_name())).into()),
        }
    }

    /// Forces a value for use: dereferences a `var`-parameter `Reference`
    /// and, distinctly, re-evaluates a `Lazy` thunk's expression fresh in
    /// its captured environment every time (§4.B/§9 — call-by-name, never
    /// memoized).
    pub(crate) fn force(&self, value: Value) -> EvalResult<Value> {
        match value {
            Value::Reference(lv) => self.force(lv.get()),
            Value::Lazy(thunk) => self.eval_expr(&thunk.expr, &thunk.env),
            other => Ok(other),
        }
    }

    pub(crate) fn call_callable(
        &self,
        callable: &Rc<CallableValue>,
        arg_exprs: &[Expr],
        pos: Position,
        caller_env: &Environment,
        receiver_override: Option<Value>,
    ) -> EvalResult<Value> {
        self.enter_call()?;
        self.call_stack.borrow_mut().push(StackFrame {
            function_name: callable.name.clone(),
            call_site: pos,
        });
        let result = self.invoke(callable, arg_exprs, pos, caller_env, receiver_override);
        self.call_stack.borrow_mut().pop();
        self.exit_call();
        result
    }

    /// Like [`call_callable`](Self::call_callable) but the arguments are
    /// already-evaluated `Value`s rather than unevaluated `Expr`s — used by
    /// builtins and operator-overload dispatch, which never need `var`/lazy
    /// binding since their arguments already went through normal evaluation.
    pub(crate) fn call_callable_values(
        &self,
        callable: &Rc<CallableValue>,
        args: &[Value],
        pos: Position,
        receiver_override: Option<Value>,
    ) -> EvalResult<Value> {
        self.enter_call()?;
        self.call_stack.borrow_mut().push(StackFrame {
            function_name: callable.name.clone(),
            call_site: pos,
        });
        let result = self.invoke_with_values(callable, args, pos, receiver_override);
        self.call_stack.borrow_mut().pop();
        self.exit_call();
        result
    }

    fn params_of(callable: &CallableValue) -> (&[Param], bool, &crate::ast::Block, &[Expr], &[Expr]) {
        match &callable.body {
            CallableBody::Function(f) => (&f.params, f.return_type.is_some(), &f.body, &f.requires, &f.ensures),
            CallableBody::Method(m) => (&m.params, m.return_type.is_some(), &m.body, &m.requires, &m.ensures),
        }
    }

    fn invoke(
        &self,
        callable: &Rc<CallableValue>,
        arg_exprs: &[Expr],
        pos: Position,
        caller_env: &Environment,
        receiver_override: Option<Value>,
    ) -> EvalResult<Value> {
        let (params, has_result, body, requires, ensures) = Self::params_of(callable);
        let scope = Environment::new_enclosed(&callable.closure);
        self.bind_params(params, arg_exprs, pos, caller_env, &scope)?;
        self.run_invocation(callable, &scope, has_result, body, requires, ensures, pos, receiver_override)
    }

    fn invoke_with_values(
        &self,
        callable: &Rc<CallableValue>,
        args: &[Value],
        pos: Position,
        receiver_override: Option<Value>,
    ) -> EvalResult<Value> {
        let (params, has_result, body, requires, ensures) = Self::params_of(callable);
        let scope = Environment::new_enclosed(&callable.closure);
        for (p, v) in params.iter().zip(args.iter()) {
            scope.define_typed(&p.name, v.clone(), self.named_class_of(p.type_expr.as_ref()));
        }
        for p in params.iter().skip(args.len()) {
            let default_val = match &p.default {
                Some(e) => self.eval_expr(e, &scope)?.deref(),
                None => return Err(RuntimeError::new(pos, format!("missing argument for parameter '{}'", p.name)).into()),
            };
            scope.define_typed(&p.name, default_val, self.named_class_of(p.type_expr.as_ref()));
        }
        self.run_invocation(callable, &scope, has_result, body, requires, ensures, pos, receiver_override)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_invocation(
        &self,
        callable: &Rc<CallableValue>,
        scope: &Environment,
        has_result: bool,
        body: &crate::ast::Block,
        requires: &[Expr],
        ensures: &[Expr],
        _pos: Position,
        receiver_override: Option<Value>,
    ) -> EvalResult<Value> {
        let receiver = receiver_override.or_else(|| callable.receiver.clone().map(Value::Object));
        if let Some(self_value) = receiver {
            scope.define("self", self_value);
        }
        if has_result {
            scope.define("result", Value::unassigned_variant());
            // §4.D: the function's own name is a second lvalue onto the
            // same return slot (`function Foo: Integer; begin Foo := 42 end`).
            // A `Reference` binding makes `env.set` write through to `result`
            // instead of replacing the alias with a plain value.
            scope.define(&callable.name, Value::Reference(scope.lvalue("result")));
        }

        let method_entry = callable.owner_class.clone().map(|owner| ActiveMethod {
            owner,
            name: callable.name.clone(),
            param_names: Self::params_of(callable).0.iter().map(|p| p.name.clone()).collect(),
        });
        let _guard = MethodGuard::new(&self.method_stack, method_entry);

        let contracts_on = self.contracts_enabled();
        if contracts_on && !requires.is_empty() {
            self.check_requires(&callable.name, requires, scope)?;
        }
        if contracts_on && !ensures.is_empty() {
            self.old_stack.borrow_mut().push(self.capture_old_snapshot(ensures, scope));
        }

        let body_result = self.eval_block_in(body, scope);

        let result_value = match body_result {
            Ok(_) | Err(Unwind::Exit(_)) => scope.get("result").map(|v| v.deref()).unwrap_or(Value::Nil),
            Err(other) => {
                if contracts_on && !ensures.is_empty() {
                    self.old_stack.borrow_mut().pop();
                }
                return Err(other);
            }
        };

        if contracts_on && !ensures.is_empty() {
            scope.define("result", result_value.clone());
            let check = self.check_ensures(&callable.name, ensures, scope);
            self.old_stack.borrow_mut().pop();
            check?;
        }

        Ok(result_value)
    }

    pub(crate) fn contracts_enabled(&self) -> bool {
        self.config.enable_contracts
    }

    fn bind_params(
        &self,
        params: &[Param],
        arg_exprs: &[Expr],
        pos: Position,
        caller_env: &Environment,
        scope: &Environment,
    ) -> EvalResult<()> {
        for (i, p) in params.iter().enumerate() {
            let value = if let Some(expr) = arg_exprs.get(i) {
                if p.by_ref {
                    Value::Reference(self.eval_lvalue(expr, caller_env)?)
                } else if p.lazy {
                    Value::Lazy(Rc::new(LazyThunk {
                        expr: expr.clone(),
                        env: caller_env.clone(),
                    }))
                } else {
                    self.eval_expr(expr, caller_env)?.deref()
                }
            } else if let Some(default) = &p.default {
                self.eval_expr(default, scope)?.deref()
            } else {
                return Err(RuntimeError::new(pos, format!("missing argument for parameter '{}'", p.name)).into());
            };
            scope.define_typed(&p.name, value, self.named_class_of(p.type_expr.as_ref()));
        }
        Ok(())
    }

    /// Message shape pinned by §4.E/§8 scenario 5:
    /// `Pre-condition failed in <Name> [line: L, column: C], <cleaned-text>`.
    fn check_requires(&self, name: &str, requires: &[Expr], scope: &Environment) -> EvalResult<()> {
        for req in requires {
            let req_pos = req.pos();
            if !self.eval_expr(req, scope)?.deref().truthy(req_pos)? {
                let text = clean_contract_text(&req.rendered_text());
                return Err(self.contract_failure(format!(
                    "Pre-condition failed in {name} [line: {}, column: {}], {text}",
                    req_pos.line, req_pos.column
                )));
            }
        }
        Ok(())
    }

    fn check_ensures(&self, name: &str, ensures: &[Expr], scope: &Environment) -> EvalResult<()> {
        for ens in ensures {
            let ens_pos = ens.pos();
            if !self.eval_expr(ens, scope)?.deref().truthy(ens_pos)? {
                let text = clean_contract_text(&ens.rendered_text());
                return Err(self.contract_failure(format!(
                    "Post-condition failed in {name} [line: {}, column: {}], {text}",
                    ens_pos.line, ens_pos.column
                )));
            }
        }
        Ok(())
    }

    fn contract_failure(&self, message: String) -> Unwind {
        self.new_exception_unwind(&self.exceptions.exception.clone(), message)
    }

    fn capture_old_snapshot(&self, ensures: &[Expr], scope: &Environment) -> OldSnapshot {
        let mut idents = Vec::new();
        for e in ensures {
            collect_old_idents(e, &mut idents);
        }
        let mut snap = OldSnapshot::new();
        for name in idents {
            if let Some(v) = scope.get(&name) {
                snap.insert(&name, v.deref());
            }
        }
        snap
    }
}
