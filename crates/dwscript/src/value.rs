//! Value Universe (component A, §3.1/§4.A): the tagged-variant runtime
//! value and its primitive operations.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::{Expr, Position};
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError};
use crate::types::{ArrayType, ClassInfo, EnumType, InterfaceInfo, RecordInfo, SubrangeType};

/// The unified lvalue abstraction (§3.3, §9): a pair of operations that
/// read and write some target — an identifier+frame, an array+index, or an
/// object+field slot. `var` parameters, `Inc`/`Dec`, and `SetLength` on a
/// `var` string all go through this one trait instead of each re-deriving
/// their own notion of "a place that can be read and written".
pub trait LValueOps: fmt::Debug {
    fn get(&self) -> Value;
    fn set(&self, value: Value) -> EvalResult<()>;
}

pub type LValue = Rc<dyn LValueOps>;

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub enum_type: Rc<EnumType>,
    pub ordinal: i64,
}

impl EnumValue {
    pub fn name(&self) -> Option<String> {
        self.enum_type.name_for(self.ordinal).map(str::to_string)
    }

    pub fn qualified_name(&self) -> Option<String> {
        self.name().map(|n| format!("{}.{}", self.enum_type.name, n))
    }
}

#[derive(Debug, Clone)]
pub struct VariantData {
    pub declared_type: Option<String>,
    /// `None` models an *unassigned* variant; `Some(Value::Null)` models
    /// the SQL-style null sentinel; any other `Some(v)` is the wrapped
    /// value. `v` is never itself `Value::Variant` — boxing unwraps first.
    pub inner: Option<Value>,
}

#[derive(Debug)]
pub struct ObjectData {
    pub class: Rc<RefCell<ClassInfo>>,
    pub fields: AHashMap<String, Value>,
}

pub type ObjectRef = Rc<RefCell<ObjectData>>;

#[derive(Debug)]
pub struct ArrayData {
    pub descriptor: Rc<ArrayType>,
    pub elements: Vec<Value>,
}

pub type ArrayRef = Rc<RefCell<ArrayData>>;

/// Records carry value semantics: `Clone` deep-copies `fields` (each
/// nested `Value` clone either copies a scalar/record or shares an
/// `Rc`-backed object/array by reference, which is exactly the split §9
/// requires between record-value and object-reference semantics).
#[derive(Debug, Clone)]
pub struct RecordValue {
    pub descriptor: Rc<RecordInfo>,
    pub fields: AHashMap<String, Value>,
}

#[derive(Debug)]
pub struct LazyThunk {
    pub expr: Expr,
    pub env: Environment,
}

#[derive(Debug, Clone)]
pub enum CallableBody {
    Function(Rc<crate::ast::FunctionDecl>),
    Method(Rc<crate::ast::MethodDecl>),
}

#[derive(Debug)]
pub struct CallableValue {
    pub name: String,
    pub body: CallableBody,
    pub closure: Environment,
    pub receiver: Option<ObjectRef>,
    /// The class the body was declared on — `inherited` resolves against
    /// this, not the receiver's dynamic class (§4.E).
    pub owner_class: Option<Rc<RefCell<ClassInfo>>>,
}

/// First-class type descriptor values (§3.1's "Record/Array/Enum Type
/// Value"), used as the receiver of static member access like
/// `TRecord.Create(...)` or `for e in TColor do`.
#[derive(Debug, Clone)]
pub enum TypeDescriptorValue {
    Record(Rc<RecordInfo>),
    Enum(Rc<EnumType>),
    Array(Rc<ArrayType>),
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Nil,
    Variant(Box<VariantData>),
    Null,
    Enum(EnumValue),
    Subrange {
        value: i64,
        subrange: Rc<SubrangeType>,
    },
    Array(ArrayRef),
    Record(RecordValue),
    Object(ObjectRef),
    Interface {
        descriptor: Rc<InterfaceInfo>,
        instance: Option<ObjectRef>,
    },
    Reference(LValue),
    Lazy(Rc<LazyThunk>),
    Callable(Rc<CallableValue>),
    ClassInfo(Rc<RefCell<ClassInfo>>),
    TypeValue(TypeDescriptorValue),
}

impl Value {
    pub fn unassigned_variant() -> Value {
        Value::Variant(Box::new(VariantData {
            declared_type: None,
            inner: None,
        }))
    }

    pub fn boxed_variant(v: Value) -> Value {
        match v {
            Value::Variant(inner) => Value::Variant(inner),
            other => Value::Variant(Box::new(VariantData {
                declared_type: None,
                inner: Some(other),
            })),
        }
    }

    pub fn new_enum(enum_type: Rc<EnumType>, ordinal: i64) -> Value {
        Value::Enum(EnumValue { enum_type, ordinal })
    }

    pub fn new_array(descriptor: Rc<ArrayType>, elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(ArrayData { descriptor, elements })))
    }

    pub fn default_record(descriptor: Rc<RecordInfo>) -> Value {
        let mut fields = AHashMap::default();
        for f in &descriptor.fields {
            fields.insert(f.name.to_lowercase(), Value::Nil);
        }
        Value::Record(RecordValue { descriptor, fields })
    }

    /// Transparently dereferences a `Reference` value for reads; every
    /// other value reads as itself (§4.D "Identifier... if wrapped
    /// Reference, dereference transparently for reads").
    pub fn deref(&self) -> Value {
        match self {
            Value::Reference(lv) => lv.get(),
            other => other.clone(),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Nil => "Nil",
            Value::Variant(_) => "Variant",
            Value::Null => "Null",
            Value::Enum(_) => "Enum",
            Value::Subrange { .. } => "Subrange",
            Value::Array(_) => "Array",
            Value::Record(_) => "Record",
            Value::Object(_) => "Object",
            Value::Interface { .. } => "Interface",
            Value::Reference(_) => "Reference",
            Value::Lazy(_) => "Lazy",
            Value::Callable(_) => "Callable",
            Value::ClassInfo(_) => "ClassInfo",
            Value::TypeValue(_) => "TypeValue",
        }
    }

    /// Truthiness (§4.A): Boolean uses its own value; Variant unwraps and
    /// treats nil/empty/zero as false; no other type is truthy.
    pub fn truthy(&self, pos: Position) -> EvalResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Variant(v) => match &v.inner {
                None => Ok(false),
                Some(Value::Null) => Ok(false),
                Some(inner) => match inner {
                    Value::Integer(0) => Ok(false),
                    Value::Float(f) if *f == 0.0 => Ok(false),
                    Value::Str(s) if s.is_empty() => Ok(false),
                    Value::Boolean(b) => Ok(*b),
                    _ => Ok(true),
                },
            },
            _ => Err(RuntimeError::new(
                pos,
                format!("type mismatch: expected Boolean, found {}", self.type_name()),
            )
            .into()),
        }
    }

    fn unwrap_variant(&self) -> &Value {
        match self {
            Value::Variant(v) => match &v.inner {
                Some(inner) => inner,
                None => &Value::Nil,
            },
            other => other,
        }
    }

    pub fn numeric_binary(&self, op: &str, other: &Value, pos: Position) -> EvalResult<Value> {
        use Value::*;
        match (self, other) {
            (Integer(a), Integer(b)) => match op {
                "+" => Ok(Integer(a + b)),
                "-" => Ok(Integer(a - b)),
                "*" => Ok(Integer(a * b)),
                "/" => {
                    if *b == 0 {
                        Err(RuntimeError::new(pos, "Division by zero").into())
                    } else {
                        Ok(Float(*a as f64 / *b as f64))
                    }
                }
                "div" => {
                    if *b == 0 {
                        Err(RuntimeError::new(pos, "Division by zero").into())
                    } else {
                        Ok(Integer(a.div_euclid(*b)))
                    }
                }
                "mod" => {
                    if *b == 0 {
                        Err(RuntimeError::new(pos, "Division by zero").into())
                    } else {
                        Ok(Integer(a.rem_euclid(*b)))
                    }
                }
                _ => Err(RuntimeError::type_mismatch(pos, self, op, other).into()),
            },
            (Integer(_) | Float(_), Integer(_) | Float(_)) => {
                let a = self.as_f64().unwrap();
                let b = other.as_f64().unwrap();
                match op {
                    "+" => Ok(Float(a + b)),
                    "-" => Ok(Float(a - b)),
                    "*" => Ok(Float(a * b)),
                    "/" => Ok(Float(a / b)),
                    "div" | "mod" => Err(RuntimeError::new(pos, format!("'{op}' requires Integer operands")).into()),
                    _ => Err(RuntimeError::type_mismatch(pos, self, op, other).into()),
                }
            }
            (Str(a), Str(b)) if op == "+" => Ok(Str(format!("{a}{b}"))),
            _ => Err(RuntimeError::type_mismatch(pos, self, op, other).into()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean/bitwise `and`/`or`/`xor`: Boolean-only logical when both
    /// sides are Boolean, bitwise when both are Integer, a type error when
    /// mixed (§4.A).
    pub fn logical_binary(&self, op: &str, other: &Value, pos: Position) -> EvalResult<Value> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
                "and" => *a && *b,
                "or" => *a || *b,
                "xor" => *a != *b,
                _ => unreachable!(),
            })),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(match op {
                "and" => a & b,
                "or" => a | b,
                "xor" => a ^ b,
                _ => unreachable!(),
            })),
            _ => Err(RuntimeError::type_mismatch(pos, self, op, other).into()),
        }
    }

    /// Comparison (`=`,`<>`,`<`,`>`,`<=`,`>=`). Variants unwrap first;
    /// `Null` compares equal only to `Null`.
    pub fn compare(&self, other: &Value, pos: Position) -> EvalResult<Ordering> {
        let a = self.unwrap_variant();
        let b = other.unwrap_variant();
        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                a.as_f64().unwrap().partial_cmp(&b.as_f64().unwrap()).ok_or_else(|| {
                    RuntimeError::new(pos, "comparison with NaN has no ordering").into()
                })
            }
            (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
            (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
            (Value::Enum(x), Value::Enum(y)) if Rc::ptr_eq(&x.enum_type, &y.enum_type) => {
                Ok(x.ordinal.cmp(&y.ordinal))
            }
            _ => Err(RuntimeError::type_mismatch(pos, self, "compare", other).into()),
        }
    }

    pub fn values_equal(&self, other: &Value, pos: Position) -> EvalResult<bool> {
        let a = self.unwrap_variant();
        let b = other.unwrap_variant();
        match (a, b) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Nil, Value::Nil) => Ok(true),
            (Value::Nil, Value::Object(_)) | (Value::Object(_), Value::Nil) => Ok(false),
            (Value::Object(x), Value::Object(y)) => Ok(Rc::ptr_eq(x, y)),
            (Value::Array(x), Value::Array(y)) => Ok(Rc::ptr_eq(x, y)),
            (Value::Record(x), Value::Record(y)) => {
                if !Rc::ptr_eq(&x.descriptor, &y.descriptor) {
                    return Ok(false);
                }
                for (k, v) in &x.fields {
                    match y.fields.get(k) {
                        Some(yv) if v.values_equal(yv, pos)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::Enum(_), Value::Enum(_)) => Ok(self.compare(other, pos)? == Ordering::Equal),
            _ => Err(RuntimeError::type_mismatch(pos, self, "=", other).into()),
        }
    }

    /// `display_string` implements §6's printed formats: `True`/`False`,
    /// shortest round-trip floats with integer-valued floats printed
    /// without a decimal point, bare enum ordinals, and `nil`.
    pub fn display_string(&self) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Nil => "nil".to_string(),
            Value::Null => "Null".to_string(),
            Value::Variant(v) => match &v.inner {
                None => String::new(),
                Some(inner) => inner.display_string(),
            },
            Value::Enum(e) => e.ordinal.to_string(),
            Value::Subrange { value, .. } => value.to_string(),
            Value::Array(a) => {
                let data = a.borrow();
                let parts: Vec<String> = data.elements.iter().map(Value::display_string).collect();
                parts.join(",")
            }
            Value::Record(r) => format!("{}(...)", r.descriptor.name),
            Value::Object(o) => format!("<{}>", o.borrow().class.borrow().name),
            Value::Interface { descriptor, .. } => format!("<{}>", descriptor.name),
            Value::Reference(lv) => lv.get().display_string(),
            Value::Lazy(t) => t.expr.rendered_text(),
            Value::Callable(c) => format!("@{}", c.name),
            Value::ClassInfo(c) => c.borrow().name.clone(),
            Value::TypeValue(t) => match t {
                TypeDescriptorValue::Record(r) => r.name.clone(),
                TypeDescriptorValue::Enum(e) => e.name.clone(),
                TypeDescriptorValue::Array(_) => "array".to_string(),
            },
        }
    }
}

/// Shortest round-trip float formatting with the trailing `.0` stripped
/// for integer-valued floats (§6).
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if f == f.trunc() && f.abs() < 1e15 {
        return format!("{}", f.trunc() as i64);
    }
    let mut s = format!("{f}");
    if s.contains('e') || s.contains('E') {
        return s;
    }
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_string())
    }
}
