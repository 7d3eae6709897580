//! Object Model (component E, §4.E) — pure, `Evaluator`-independent pieces:
//! overload resolution and the built-in exception class hierarchy.
//!
//! Instantiation, dynamic dispatch, property access, and operator lookup
//! all need to *run script code* (field initializers, constructor/method
//! bodies, getters/setters, operator methods) so they live as `Evaluator`
//! methods in `crate::eval::object` instead of here — see that module for
//! the rest of component E.

pub mod exceptions;
pub mod overload;

pub use exceptions::{register_builtin_exceptions, BuiltinExceptionClasses};
pub use overload::resolve_overload;
