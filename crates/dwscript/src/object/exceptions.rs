//! Built-in exception class hierarchy (§4.F expanded, SPEC_FULL.md §F).
//!
//! DWScript's RTL ships a root `Exception` class and a family of concrete
//! subclasses for the domain errors this interpreter itself raises
//! (`EZeroDivide`, `EAssertionFailed`, `EScriptStackOverflow`) plus the
//! `EHost`/message-constructor compatibility pair from §4.E rule 5. These
//! are ordinary `ClassInfo` entries pre-registered at `Evaluator::new` so
//! `on E: EScriptStackOverflow do` (§8 scenario 6) has a real class to
//! match `InheritsFrom` against.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{ClassFlags, FieldDecl, Position, TypeExpr};
use crate::types::ClassInfo;

/// Handles onto the pre-registered exception classes the Evaluator itself
/// raises, kept so `raise_runtime_exception` doesn't need a name lookup on
/// every raise.
pub struct BuiltinExceptionClasses {
    pub exception: Rc<RefCell<ClassInfo>>,
    pub e_zero_divide: Rc<RefCell<ClassInfo>>,
    pub e_assertion_failed: Rc<RefCell<ClassInfo>>,
    pub e_script_stack_overflow: Rc<RefCell<ClassInfo>>,
    pub e_host: Rc<RefCell<ClassInfo>>,
}

fn message_field() -> FieldDecl {
    FieldDecl {
        name: "Message".to_string(),
        type_expr: TypeExpr::Named("String".to_string()),
        initializer: None,
        pos: Position::default(),
    }
}

fn new_class(name: &str, parent: Option<Rc<RefCell<ClassInfo>>>, fields: Vec<FieldDecl>) -> Rc<RefCell<ClassInfo>> {
    Rc::new(RefCell::new(ClassInfo {
        name: name.to_string(),
        parent,
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields,
        methods: IndexMap::new(),
        properties: IndexMap::new(),
        consts: AHashMap::default(),
        class_vars: RefCell::new(AHashMap::default()),
        operators: AHashMap::default(),
        default_constructor: Some("Create".to_string()),
    }))
}

/// Builds the root `Exception` class plus the handful of concrete
/// subclasses the interpreter itself raises, and registers all of them
/// (by name) into `types`.
pub fn register_builtin_exceptions(types: &mut crate::types::TypeRegistry) -> BuiltinExceptionClasses {
    let exception = new_class("Exception", None, vec![message_field()]);
    let e_zero_divide = new_class("EZeroDivide", Some(Rc::clone(&exception)), vec![]);
    let e_assertion_failed = new_class("EAssertionFailed", Some(Rc::clone(&exception)), vec![]);
    let e_script_stack_overflow = new_class("EScriptStackOverflow", Some(Rc::clone(&exception)), vec![]);
    let e_host = new_class(
        "EHost",
        Some(Rc::clone(&exception)),
        vec![FieldDecl {
            name: "ExceptionClass".to_string(),
            type_expr: TypeExpr::Named("String".to_string()),
            initializer: None,
            pos: Position::default(),
        }],
    );
    // EConvertError / ERangeError / EAssertionFailed's siblings round out
    // the set of named classes a script's `on E: EFoo do` clause might
    // name, even though the interpreter itself only ever constructs the
    // three above plus EHost.
    let e_convert_error = new_class("EConvertError", Some(Rc::clone(&exception)), vec![]);
    let e_range_error = new_class("ERangeError", Some(Rc::clone(&exception)), vec![]);

    for (name, class) in [
        ("Exception", &exception),
        ("EZeroDivide", &e_zero_divide),
        ("EAssertionFailed", &e_assertion_failed),
        ("EScriptStackOverflow", &e_script_stack_overflow),
        ("EHost", &e_host),
        ("EConvertError", &e_convert_error),
        ("ERangeError", &e_range_error),
    ] {
        types.register_class(name, Rc::clone(class));
    }

    BuiltinExceptionClasses {
        exception,
        e_zero_divide,
        e_assertion_failed,
        e_script_stack_overflow,
        e_host,
    }
}
