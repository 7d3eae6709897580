use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{ClassFlags, FieldDecl, OperatorKind};
use crate::types::interface::InterfaceInfo;
use crate::types::method::{OperatorEntry, OverloadSet, PropertyInfo};
use crate::value::Value;

/// `ClassInfo` descriptor (§3.2). Method overload sets, properties, and
/// the operator table are keyed by normalized (lowercased) name so lookups
/// honor the case-insensitive identifier model (§9).
#[derive(Debug)]
pub struct ClassInfo {
    pub name: String,
    pub parent: Option<Rc<RefCell<ClassInfo>>>,
    pub interfaces: Vec<Rc<InterfaceInfo>>,
    pub flags: ClassFlags,
    pub fields: Vec<FieldDecl>,
    pub methods: IndexMap<String, OverloadSet>,
    pub properties: IndexMap<String, PropertyInfo>,
    pub consts: AHashMap<String, Value>,
    pub class_vars: RefCell<AHashMap<String, Value>>,
    pub operators: AHashMap<OperatorKind, OperatorEntry>,
    pub default_constructor: Option<String>,
}

impl ClassInfo {
    /// Walks the parent chain (including `self`) looking for `other` by
    /// normalized name — used both for `InheritsFrom` and for `on E:
    /// TypeName do` exception-handler matching.
    pub fn inherits_from(self_rc: &Rc<RefCell<ClassInfo>>, other_name: &str) -> bool {
        let other_norm = other_name.to_lowercase();
        let mut current = Some(Rc::clone(self_rc));
        while let Some(c) = current {
            if c.borrow().name.to_lowercase() == other_norm {
                return true;
            }
            current = c.borrow().parent.clone();
        }
        false
    }

    /// Collects the overload set for `name`, walking from `self` up through
    /// parents and merging in declaration order (root-most first) so
    /// child overrides are consulted before falling through; callers that
    /// want only the dynamic-dispatch winner should use
    /// `object::dispatch::resolve_virtual` instead, which applies the
    /// override-replaces-parent rule rather than simply concatenating.
    pub fn find_method_owner(
        self_rc: &Rc<RefCell<ClassInfo>>,
        name: &str,
    ) -> Option<Rc<RefCell<ClassInfo>>> {
        let norm = name.to_lowercase();
        let mut current = Some(Rc::clone(self_rc));
        while let Some(c) = current {
            if c.borrow().methods.contains_key(&norm) {
                return Some(c);
            }
            current = c.borrow().parent.clone();
        }
        None
    }

    pub fn find_class_var(self_rc: &Rc<RefCell<ClassInfo>>, name: &str) -> Option<Value> {
        let norm = name.to_lowercase();
        let mut current = Some(Rc::clone(self_rc));
        while let Some(c) = current {
            if let Some(v) = c.borrow().class_vars.borrow().get(&norm) {
                return Some(v.clone());
            }
            if let Some(v) = c.borrow().consts.get(&norm) {
                return Some(v.clone());
            }
            current = c.borrow().parent.clone();
        }
        None
    }

    pub fn set_class_var(self_rc: &Rc<RefCell<ClassInfo>>, name: &str, value: Value) -> bool {
        let norm = name.to_lowercase();
        let mut current = Some(Rc::clone(self_rc));
        while let Some(c) = current {
            let found = c.borrow().class_vars.borrow().contains_key(&norm);
            if found {
                c.borrow().class_vars.borrow_mut().insert(norm, value);
                return true;
            }
            current = c.borrow().parent.clone();
        }
        false
    }
}
