//! Type System Registry (component C, §3.2/§4.C): named metadata for
//! classes, records, interfaces, enums, subranges, aliases, arrays, and
//! function-pointer types, all keyed by normalized (lowercased) name.

pub mod array_type;
pub mod class;
pub mod enum_type;
pub mod helper;
pub mod interface;
pub mod method;
pub mod record;

pub use array_type::{ArrayType, FunctionPointerType, SubrangeType};
pub use class::ClassInfo;
pub use enum_type::EnumType;
pub use helper::HelperInfo;
pub use interface::InterfaceInfo;
pub use method::{MethodEntry, OperatorEntry, OverloadSet, PropertyInfo};
pub use record::RecordInfo;

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::{Position, TypeExpr};
use crate::errors::RuntimeError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Integer,
    Float,
    StringT,
    Boolean,
    Variant,
}

/// The resolved form of a `TypeExpr`, produced by
/// `TypeRegistry::resolve_type_expr` (§4.C).
#[derive(Clone)]
pub enum ResolvedType {
    Primitive(PrimitiveType),
    Enum(Rc<EnumType>),
    Record(Rc<RecordInfo>),
    Array(Rc<ArrayType>),
    Subrange(Rc<SubrangeType>),
    Class(Rc<RefCell<ClassInfo>>),
    Interface(Rc<InterfaceInfo>),
    FunctionPointer(Rc<FunctionPointerType>),
}

impl ResolvedType {
    pub fn zero_value(&self) -> Value {
        match self {
            ResolvedType::Primitive(PrimitiveType::Integer) => Value::Integer(0),
            ResolvedType::Primitive(PrimitiveType::Float) => Value::Float(0.0),
            ResolvedType::Primitive(PrimitiveType::StringT) => Value::Str(String::new()),
            ResolvedType::Primitive(PrimitiveType::Boolean) => Value::Boolean(false),
            ResolvedType::Primitive(PrimitiveType::Variant) => Value::unassigned_variant(),
            ResolvedType::Enum(e) => Value::new_enum(Rc::clone(e), e.low()),
            ResolvedType::Record(r) => Value::default_record(Rc::clone(r)),
            ResolvedType::Array(a) => Value::new_array(Rc::clone(a), Vec::new()),
            ResolvedType::Subrange(s) => Value::Subrange {
                value: s.lo,
                subrange: Rc::clone(s),
            },
            ResolvedType::Class(_) => Value::Nil,
            ResolvedType::Interface(iface) => Value::Interface {
                descriptor: Rc::clone(iface),
                instance: None,
            },
            ResolvedType::FunctionPointer(_) => Value::Nil,
        }
    }
}

/// Central registry for every named type descriptor. Owned by the
/// Evaluator and shared (by `&`/`&mut`) with the object model and builtins.
#[derive(Default)]
pub struct TypeRegistry {
    classes: AHashMap<String, Rc<RefCell<ClassInfo>>>,
    records: AHashMap<String, Rc<RecordInfo>>,
    interfaces: AHashMap<String, Rc<InterfaceInfo>>,
    enums: AHashMap<String, Rc<EnumType>>,
    subranges: AHashMap<String, Rc<SubrangeType>>,
    arrays: AHashMap<String, Rc<ArrayType>>,
    function_pointers: AHashMap<String, Rc<FunctionPointerType>>,
    aliases: AHashMap<String, TypeExpr>,
    /// Helpers keyed by the normalized name of the type they extend, in
    /// declaration order. §4.E/§9: multiple helpers for one type stack in
    /// declaration order; resolution walks this list in *reverse* so the
    /// most-recently-declared helper's methods shadow earlier ones.
    helpers: AHashMap<String, Vec<Rc<HelperInfo>>>,
}

fn norm(name: &str) -> String {
    name.to_lowercase()
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(&mut self, name: &str, class: Rc<RefCell<ClassInfo>>) {
        self.classes.insert(norm(name), class);
    }

    pub fn register_record(&mut self, name: &str, record: Rc<RecordInfo>) {
        self.records.insert(norm(name), record);
    }

    pub fn register_interface(&mut self, name: &str, iface: Rc<InterfaceInfo>) {
        self.interfaces.insert(norm(name), iface);
    }

    pub fn register_enum(&mut self, name: &str, e: Rc<EnumType>) {
        self.enums.insert(norm(name), e);
    }

    pub fn register_subrange(&mut self, name: &str, s: Rc<SubrangeType>) {
        self.subranges.insert(norm(name), s);
    }

    pub fn register_array(&mut self, name: &str, a: Rc<ArrayType>) {
        self.arrays.insert(norm(name), a);
    }

    pub fn register_function_pointer(&mut self, name: &str, f: Rc<FunctionPointerType>) {
        self.function_pointers.insert(norm(name), f);
    }

    pub fn register_alias(&mut self, name: &str, target: TypeExpr) {
        self.aliases.insert(norm(name), target);
    }

    pub fn register_helper(&mut self, helper: Rc<HelperInfo>) {
        self.helpers.entry(norm(&helper.target)).or_default().push(helper);
    }

    /// Helpers for `type_name`, most-recently-declared first — the order
    /// §4.E's resolution rule ("walk helpers in reverse declaration order")
    /// wants callers to consult them in.
    pub fn helpers_for(&self, type_name: &str) -> Vec<Rc<HelperInfo>> {
        let mut out: Vec<Rc<HelperInfo>> = self
            .helpers
            .get(&norm(type_name))
            .map(|v| v.iter().rev().cloned().collect())
            .unwrap_or_default();
        // Parent helpers are consulted after the child helper (§9: "child
        // helper first, then parent").
        if let Some(last) = out.last().cloned() {
            if let Some(parent_name) = &last.parent_helper {
                out.extend(self.helper_chain(parent_name));
            }
        }
        out
    }

    fn helper_chain(&self, helper_name: &str) -> Vec<Rc<HelperInfo>> {
        let mut out = Vec::new();
        // A named parent helper is looked up by its own declared name
        // across every target bucket (helper names are not type names).
        for bucket in self.helpers.values() {
            for h in bucket {
                if h.name.eq_ignore_ascii_case(helper_name) {
                    out.push(Rc::clone(h));
                    if let Some(parent) = &h.parent_helper {
                        out.extend(self.helper_chain(parent));
                    }
                    return out;
                }
            }
        }
        out
    }

    pub fn lookup_class(&self, name: &str) -> Option<Rc<RefCell<ClassInfo>>> {
        self.classes.get(&norm(name)).cloned()
    }

    pub fn lookup_record(&self, name: &str) -> Option<Rc<RecordInfo>> {
        self.records.get(&norm(name)).cloned()
    }

    pub fn lookup_interface(&self, name: &str) -> Option<Rc<InterfaceInfo>> {
        self.interfaces.get(&norm(name)).cloned()
    }

    pub fn lookup_enum(&self, name: &str) -> Option<Rc<EnumType>> {
        self.enums.get(&norm(name)).cloned()
    }

    /// Type-name resolution order (§4.C): primitive keyword → enum →
    /// record → array alias → subrange → alias → class → function-pointer
    /// type. Returns a position-tagged Runtime error for unknown names.
    pub fn resolve_named(&self, name: &str, pos: Position) -> Result<ResolvedType, RuntimeError> {
        let key = norm(name);
        match key.as_str() {
            "integer" => return Ok(ResolvedType::Primitive(PrimitiveType::Integer)),
            "float" | "double" => return Ok(ResolvedType::Primitive(PrimitiveType::Float)),
            "string" => return Ok(ResolvedType::Primitive(PrimitiveType::StringT)),
            "boolean" => return Ok(ResolvedType::Primitive(PrimitiveType::Boolean)),
            "variant" => return Ok(ResolvedType::Primitive(PrimitiveType::Variant)),
            _ => {}
        }
        if let Some(e) = self.enums.get(&key) {
            return Ok(ResolvedType::Enum(Rc::clone(e)));
        }
        if let Some(r) = self.records.get(&key) {
            return Ok(ResolvedType::Record(Rc::clone(r)));
        }
        if let Some(a) = self.arrays.get(&key) {
            return Ok(ResolvedType::Array(Rc::clone(a)));
        }
        if let Some(s) = self.subranges.get(&key) {
            return Ok(ResolvedType::Subrange(Rc::clone(s)));
        }
        if let Some(target) = self.aliases.get(&key).cloned() {
            return self.resolve_type_expr(&target, pos);
        }
        if let Some(c) = self.classes.get(&key) {
            return Ok(ResolvedType::Class(Rc::clone(c)));
        }
        if let Some(iface) = self.interfaces.get(&key) {
            return Ok(ResolvedType::Interface(Rc::clone(iface)));
        }
        if let Some(f) = self.function_pointers.get(&key) {
            return Ok(ResolvedType::FunctionPointer(Rc::clone(f)));
        }
        Err(RuntimeError::new(pos, format!("undefined type: {name}")))
    }

    pub fn resolve_type_expr(&self, expr: &TypeExpr, pos: Position) -> Result<ResolvedType, RuntimeError> {
        match expr {
            TypeExpr::Named(name) => self.resolve_named(name, pos),
            TypeExpr::Array { element, bounds } => Ok(ResolvedType::Array(Rc::new(ArrayType {
                element: (**element).clone(),
                bounds: *bounds,
            }))),
            TypeExpr::FunctionPointer { params, return_type } => {
                Ok(ResolvedType::FunctionPointer(Rc::new(FunctionPointerType {
                    params: params.clone(),
                    return_type: return_type.clone(),
                    is_method: false,
                })))
            }
        }
    }
}
