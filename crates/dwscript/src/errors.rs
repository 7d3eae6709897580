//! Error Reporter (component J).
//!
//! Three error carriers per the taxonomy: a Runtime error (kinds 1-3, 6-7,
//! uncatchable), a raised Exception (kinds 4-8, catchable via
//! `try/except`), and the non-error control signals (`break`/`continue`/
//! `exit`) that unwind the same `Result` channel without being errors at
//! all. All three travel together as [`Unwind`] so every `eval_*` method has
//! one `?`-friendly return type, mirroring how the teacher's evaluator
//! threads `ExcType` through a single `RunResult`.

use std::fmt;
use std::rc::Rc;

use crate::ast::Position;
use crate::value::Value;

/// An unrecoverable Runtime error (§4.J, §7 kinds 1-3, 6-7). Printed as
/// `ERROR at line L, column C: <message>`.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub pos: Position,
    pub message: String,
}

impl RuntimeError {
    pub fn new(pos: Position, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }

    pub fn type_mismatch(pos: Position, left: &Value, op: &str, right: &Value) -> Self {
        Self::new(
            pos,
            format!("type mismatch: {} {op} {}", left.type_name(), right.type_name()),
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR at {}: {}", self.pos, self.message)
    }
}

/// One frame of the captured call stack attached to a raised exception.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub call_site: Position,
}

/// A caught-or-propagating exception object (§3.1 "Exception Instance").
/// Wraps the thrown Object Instance `Value` (always of a class inheriting
/// from the root `Exception` class) plus the position it was raised at and
/// the call stack captured at that moment.
#[derive(Debug, Clone)]
pub struct RaisedException {
    pub instance: Value,
    pub raise_pos: Position,
    pub stack: Vec<StackFrame>,
}

impl RaisedException {
    pub fn class_name(&self) -> String {
        self.instance
            .as_object()
            .map(|o| o.borrow().class.borrow().name.clone())
            .unwrap_or_else(|| "Exception".to_string())
    }

    pub fn message(&self) -> String {
        self.instance
            .as_object()
            .and_then(|o| o.borrow().fields.get("message").cloned())
            .map(|v| v.display_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name(), self.message())
    }
}

/// Everything that can unwind the evaluator's recursive descent: a fatal
/// Runtime error, a catchable raised exception, or a control-flow signal
/// (`break`/`continue`/`exit`) on its way to the construct that consumes it.
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(RuntimeError),
    Exception(Rc<RaisedException>),
    Break(Position),
    Continue(Position),
    Exit(Position),
}

impl Unwind {
    pub fn error(pos: Position, message: impl Into<String>) -> Self {
        Unwind::Error(RuntimeError::new(pos, message))
    }
}

impl From<RuntimeError> for Unwind {
    fn from(e: RuntimeError) -> Self {
        Unwind::Error(e)
    }
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unwind::Error(e) => write!(f, "{e}"),
            Unwind::Exception(e) => write!(f, "{e}"),
            Unwind::Break(_) => write!(f, "break outside loop"),
            Unwind::Continue(_) => write!(f, "continue outside loop"),
            Unwind::Exit(_) => write!(f, "exit outside routine"),
        }
    }
}

pub type EvalResult<T> = Result<T, Unwind>;
