//! Environment (component B, §3.3/§4.B): a chain of lexically scoped,
//! case-insensitive name→Value frames.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::errors::{EvalResult, Unwind};
use crate::types::ClassInfo;
use crate::value::{LValueOps, Value};

struct Frame {
    vars: AHashMap<String, Value>,
    /// Declared (static) class of object-typed bindings, keyed alongside
    /// `vars`. Only populated for `var`/parameter declarations with an
    /// explicit named class type — used to resolve non-virtual method
    /// calls against the declared type rather than the runtime one (§4.E).
    static_classes: AHashMap<String, Rc<RefCell<ClassInfo>>>,
    parent: Option<Environment>,
}

/// Cheaply `Clone`-able handle to a scope frame. Cloning shares the frame
/// (via `Rc`), which is exactly what capturing an environment in a Lazy
/// Thunk or a Function/Method Pointer closure needs.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    pub fn new_root() -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            vars: AHashMap::default(),
            static_classes: AHashMap::default(),
            parent: None,
        })))
    }

    pub fn new_enclosed(outer: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            vars: AHashMap::default(),
            static_classes: AHashMap::default(),
            parent: Some(outer.clone()),
        })))
    }

    fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Creates or overwrites a binding in the current (innermost) frame.
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(Self::key(name), value);
    }

    /// Like [`define`](Self::define), additionally recording `name`'s
    /// declared class so a later non-virtual method call through this
    /// binding can resolve against it instead of the runtime object's
    /// dynamic class.
    pub fn define_typed(&self, name: &str, value: Value, static_class: Option<Rc<RefCell<ClassInfo>>>) {
        let key = Self::key(name);
        let mut frame = self.0.borrow_mut();
        match static_class {
            Some(c) => {
                frame.static_classes.insert(key.clone(), c);
            }
            None => {
                frame.static_classes.remove(&key);
            }
        }
        frame.vars.insert(key, value);
    }

    /// The declared class recorded by [`define_typed`](Self::define_typed)
    /// for `name`, walking outward through enclosing frames.
    pub fn static_class(&self, name: &str) -> Option<Rc<RefCell<ClassInfo>>> {
        let key = Self::key(name);
        let frame = self.0.borrow();
        if let Some(c) = frame.static_classes.get(&key) {
            return Some(Rc::clone(c));
        }
        if frame.vars.contains_key(&key) {
            return None;
        }
        frame.parent.as_ref().and_then(|p| p.static_class(name))
    }

    /// Looks up `name`, walking outward through enclosing frames.
    pub fn get(&self, name: &str) -> Option<Value> {
        let key = Self::key(name);
        let frame = self.0.borrow();
        if let Some(v) = frame.vars.get(&key) {
            return Some(v.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Examines only the current frame (used for shadow detection), per
    /// §4.B's `GetLocal`.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.borrow().vars.get(&Self::key(name)).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        let key = Self::key(name);
        let frame = self.0.borrow();
        frame.vars.contains_key(&key) || frame.parent.as_ref().is_some_and(|p| p.has(name))
    }

    pub fn size(&self) -> usize {
        self.0.borrow().vars.len()
    }

    /// Mutates the frame in the chain where `name` is already defined.
    /// Errors (as an [`Unwind::Error`]) if `name` is absent everywhere.
    ///
    /// If the slot currently holds a [`Value::Reference`] (a `var`
    /// parameter's binding), the write goes *through* that reference
    /// instead of replacing it — otherwise a second assignment to a `var`
    /// parameter would silently stop propagating to the caller's lvalue
    /// after the first one overwrote the wrapper (§3.3, §9).
    pub fn set(&self, name: &str, value: Value) -> EvalResult<()> {
        let key = Self::key(name);
        let mut frame = self.0.borrow_mut();
        if let Some(existing) = frame.vars.get(&key) {
            if let Value::Reference(lv) = existing {
                let lv = lv.clone();
                drop(frame);
                return lv.set(value);
            }
            frame.vars.insert(key, value);
            return Ok(());
        }
        match &frame.parent {
            Some(p) => {
                let p = p.clone();
                drop(frame);
                p.set(name, value)
            }
            None => Err(Unwind::error(
                crate::ast::Position::default(),
                format!("undefined identifier: {name}"),
            )),
        }
    }

    /// An [`LValueOps`] handle onto the binding slot for `name`, used to
    /// pass identifiers as `var` parameters.
    pub fn lvalue(&self, name: &str) -> Rc<dyn LValueOps> {
        Rc::new(EnvLValue {
            env: self.clone(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug)]
struct EnvLValue {
    env: Environment,
    name: String,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("size", &self.vars.len()).finish()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Environment(size={})", self.size())
    }
}

impl LValueOps for EnvLValue {
    fn get(&self) -> Value {
        self.env.get(&self.name).unwrap_or(Value::Nil).deref()
    }

    fn set(&self, value: Value) -> EvalResult<()> {
        self.env.set(&self.name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_outward_through_enclosing_frames() {
        let root = Environment::new_root();
        root.define("x", Value::Integer(1));
        let inner = Environment::new_enclosed(&root);
        assert_eq!(inner.get("X").unwrap().display_string(), "1");
    }

    #[test]
    fn define_shadows_without_touching_outer_frame() {
        let root = Environment::new_root();
        root.define("x", Value::Integer(1));
        let inner = Environment::new_enclosed(&root);
        inner.define("x", Value::Integer(2));
        assert_eq!(inner.get("x").unwrap().display_string(), "2");
        assert_eq!(root.get("x").unwrap().display_string(), "1");
        assert!(inner.get_local("x").is_some());
    }

    #[test]
    fn set_mutates_the_defining_frame() {
        let root = Environment::new_root();
        root.define("x", Value::Integer(1));
        let inner = Environment::new_enclosed(&root);
        inner.set("x", Value::Integer(42)).unwrap();
        assert_eq!(root.get("x").unwrap().display_string(), "42");
    }

    #[test]
    fn set_on_undefined_name_errors() {
        let root = Environment::new_root();
        assert!(root.set("missing", Value::Integer(1)).is_err());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let root = Environment::new_root();
        root.define("MyVar", Value::Integer(7));
        assert_eq!(root.get("myvar").unwrap().display_string(), "7");
    }
}
