//! try/except/finally and raise (component F, §4.F): matches a raised
//! exception against each handler's `on E: TypeName do` clause in order
//! (falling back to a bare `except` block if present), then always runs
//! `finally`, whether the body completed normally, signaled
//! `break`/`continue`/`exit`, or raised.

use std::rc::Rc;

use crate::ast::{Block, ExceptHandler, Position};
use crate::env::Environment;
use crate::errors::{EvalResult, RaisedException, RuntimeError, Unwind};
use crate::eval::Evaluator;
use crate::types::ClassInfo;
use crate::value::Value;

impl Evaluator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn eval_try(
        &self,
        body: &Block,
        handlers: &[ExceptHandler],
        bare_except: Option<&Block>,
        finally: Option<&Block>,
        _pos: Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let body_result = self.eval_block(body, env);
        let after_handlers = match body_result {
            Err(Unwind::Exception(exc)) => self.run_handlers(exc, handlers, bare_except, env),
            other => other,
        };
        match finally {
            None => after_handlers,
            Some(block) => match self.eval_block(block, env) {
                Err(e) => Err(e),
                Ok(_) => after_handlers,
            },
        }
    }

    fn run_handlers(
        &self,
        exc: Rc<RaisedException>,
        handlers: &[ExceptHandler],
        bare_except: Option<&Block>,
        env: &Environment,
    ) -> EvalResult<Value> {
        for handler in handlers {
            let matches = match &exc.instance {
                Value::Object(obj) => ClassInfo::inherits_from(&obj.borrow().class, &handler.type_name),
                _ => false,
            };
            if matches {
                let scope = Environment::new_enclosed(env);
                if let Some(var) = &handler.var {
                    scope.define(var, exc.instance.clone());
                }
                return self.run_handler_body(&handler.body, &scope, &exc);
            }
        }
        if let Some(block) = bare_except {
            let scope = Environment::new_enclosed(env);
            return self.run_handler_body(block, &scope, &exc);
        }
        Err(Unwind::Exception(exc))
    }

    /// Runs a matched handler's body with `current_exception` pointing at
    /// the exception being handled, so a bare `raise` inside it re-throws
    /// (§4.F, §9); restores the previous value (supporting nested
    /// try/except) once the handler completes.
    fn run_handler_body(&self, body: &Block, scope: &Environment, exc: &Rc<RaisedException>) -> EvalResult<Value> {
        let previous = self.current_exception.replace(Some(Rc::clone(exc)));
        let result = self.eval_block_in(body, scope);
        *self.current_exception.borrow_mut() = previous;
        result
    }

    pub(crate) fn eval_raise(&self, value: Option<&crate::ast::Expr>, pos: Position, env: &Environment) -> EvalResult<Value> {
        self.note_position(pos);
        match value {
            Some(expr) => {
                let v = self.eval_expr(expr, env)?.deref();
                match &v {
                    Value::Object(obj) if ClassInfo::inherits_from(&obj.borrow().class, "Exception") => {
                        Err(Unwind::Exception(Rc::new(RaisedException {
                            instance: v.clone(),
                            raise_pos: pos,
                            stack: self.call_stack.borrow().clone(),
                        })))
                    }
                    _ => Err(RuntimeError::new(pos, format!("type mismatch: cannot raise {}", v.type_name())).into()),
                }
            }
            // Bare `raise`: re-throws the exception currently being
            // handled. Outside any handler there is nothing to rethrow —
            // per §9's resolved open question this is a (non-catchable)
            // Runtime error rather than a silent no-op.
            None => match self.current_exception.borrow().clone() {
                Some(exc) => Err(Unwind::Exception(exc)),
                None => Err(RuntimeError::new(pos, "raise outside an exception handler").into()),
            },
        }
    }
}
