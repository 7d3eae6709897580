//! Expression evaluation (component D, §4.D) and the lvalue resolution
//! (§3.3, §9) shared by assignment, `var` parameters, and `Inc`/`Dec`/
//! `SetLength`.

use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, Position, UnaryOp};
use crate::builtins::Builtin;
use crate::coerce::as_integer;
use crate::errors::{EvalResult, RuntimeError, Unwind};
use crate::eval::Evaluator;
use crate::types::{ArrayType, PrimitiveType, ResolvedType};
use crate::value::{ArrayData, ArrayRef, LValue, LValueOps, ObjectRef, TypeDescriptorValue, Value};

/// Read/write handle onto one element of an array (§9: the lvalue
/// abstraction backs `var` parameters and in-place mutation builtins
/// uniformly).
#[derive(Debug)]
struct ArrayIndexLValue {
    arr: ArrayRef,
    logical_index: i64,
    pos: Position,
}

fn array_slot(data: &ArrayData, logical_index: i64) -> Option<usize> {
    match data.descriptor.bounds {
        Some((lo, hi)) => {
            if logical_index < lo || logical_index > hi {
                None
            } else {
                Some((logical_index - lo) as usize)
            }
        }
        None => {
            if logical_index < 0 || logical_index as usize >= data.elements.len() {
                None
            } else {
                Some(logical_index as usize)
            }
        }
    }
}

impl LValueOps for ArrayIndexLValue {
    fn get(&self) -> Value {
        let data = self.arr.borrow();
        array_slot(&data, self.logical_index)
            .and_then(|i| data.elements.get(i).cloned())
            .unwrap_or(Value::Nil)
    }

    fn set(&self, value: Value) -> EvalResult<()> {
        let mut data = self.arr.borrow_mut();
        match array_slot(&data, self.logical_index) {
            Some(i) => {
                data.elements[i] = value;
                Ok(())
            }
            None => Err(Unwind::error(
                self.pos,
                format!("array index out of bounds: {}", self.logical_index),
            )),
        }
    }
}

/// Field slot on a shared object instance — mutates in place since object
/// references share identity (§3.4, §9).
#[derive(Debug)]
struct ObjectFieldLValue {
    obj: ObjectRef,
    field: String,
}

impl LValueOps for ObjectFieldLValue {
    fn get(&self) -> Value {
        self.obj.borrow().fields.get(&self.field.to_lowercase()).cloned().unwrap_or(Value::Nil)
    }

    fn set(&self, value: Value) -> EvalResult<()> {
        self.obj.borrow_mut().fields.insert(self.field.to_lowercase(), value);
        Ok(())
    }
}

/// Field slot on a record value. Records are value types (§3.4, §9): since
/// there's no shared storage to mutate in place, writing a field requires
/// read-modify-write through the *base* lvalue (the variable/slot holding
/// the whole record), which is what actually propagates the mutation back
/// to wherever the record is bound.
#[derive(Debug)]
struct RecordFieldLValue {
    base: LValue,
    field: String,
    pos: Position,
}

impl LValueOps for RecordFieldLValue {
    fn get(&self) -> Value {
        match self.base.get() {
            Value::Record(r) => r.fields.get(&self.field.to_lowercase()).cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }

    fn set(&self, value: Value) -> EvalResult<()> {
        match self.base.get() {
            Value::Record(mut r) => {
                r.fields.insert(self.field.to_lowercase(), value);
                self.base.set(Value::Record(r))
            }
            other => Err(Unwind::error(
                self.pos,
                format!("type mismatch: expected Record, found {}", other.type_name()),
            )),
        }
    }
}

impl Evaluator {
    /// Resolves `expr` to an [`LValue`] handle (§3.3/§9): identifier,
    /// array index, object field, or record field (recursively, through
    /// its own base lvalue). Anything else is not assignable.
    pub(crate) fn eval_lvalue(&self, expr: &Expr, env: &crate::env::Environment) -> EvalResult<LValue> {
        match expr {
            Expr::Ident(name, _) => Ok(env.lvalue(name)),
            Expr::Index { receiver, index, pos } => {
                let recv = self.eval_expr(receiver, env)?.deref();
                let idx_val = self.eval_expr(index, env)?.deref();
                match recv {
                    Value::Array(arr) => {
                        let idx = as_integer(&idx_val, *pos)?;
                        Ok(Rc::new(ArrayIndexLValue {
                            arr,
                            logical_index: idx,
                            pos: *pos,
                        }) as LValue)
                    }
                    other => Err(RuntimeError::new(
                        *pos,
                        format!("type mismatch: cannot index into {}", other.type_name()),
                    )
                    .into()),
                }
            }
            Expr::Member { receiver, name, pos } => {
                let recv_val = self.eval_expr(receiver, env)?.deref();
                match recv_val {
                    Value::Object(obj) => Ok(Rc::new(ObjectFieldLValue {
                        obj,
                        field: name.clone(),
                    }) as LValue),
                    Value::Record(_) => {
                        let base = self.eval_lvalue(receiver, env)?;
                        Ok(Rc::new(RecordFieldLValue {
                            base,
                            field: name.clone(),
                            pos: *pos,
                        }) as LValue)
                    }
                    other => Err(RuntimeError::new(
                        *pos,
                        format!("type mismatch: {} has no member {}", other.type_name(), name),
                    )
                    .into()),
                }
            }
            other => Err(RuntimeError::new(other.pos(), "expression is not assignable").into()),
        }
    }

    pub(crate) fn eval_assign(
        &self,
        target: &Expr,
        value: &Expr,
        pos: Position,
        env: &crate::env::Environment,
    ) -> EvalResult<()> {
        self.note_position(pos);
        let rvalue = self.eval_expr(value, env)?.deref();
        match target {
            Expr::Member { receiver, name, pos } => {
                let recv = self.eval_expr(receiver, env)?.deref();
                if let Value::Object(obj) = &recv {
                    if self.set_property_or_field(obj, name, rvalue.clone(), *pos, env)? {
                        return Ok(());
                    }
                }
            }
            _ => {}
        }
        let lv = self.eval_lvalue(target, env)?;
        lv.set(rvalue)
    }

    pub(crate) fn eval_expr(&self, expr: &Expr, env: &crate::env::Environment) -> EvalResult<Value> {
        self.note_position(expr.pos());
        match expr {
            Expr::IntLit(n, _) => Ok(Value::Integer(*n)),
            Expr::FloatLit(f, _) => Ok(Value::Float(*f)),
            Expr::StringLit(s, _) => Ok(Value::Str(s.clone())),
            Expr::BoolLit(b, _) => Ok(Value::Boolean(*b)),
            Expr::NilLit(_) => Ok(Value::Nil),
            Expr::Ident(name, pos) => self.eval_ident(name, *pos, env),
            Expr::Unary { op, operand, pos } => self.eval_unary(*op, operand, *pos, env),
            Expr::Binary { op, left, right, pos } => self.eval_binary(*op, left, right, *pos, env),
            Expr::Call { callee, args, pos } => self.eval_call_expr(callee, args, *pos, env),
            Expr::MethodCall { receiver, method, args, pos } => {
                self.eval_method_call(receiver, method, args, *pos, env)
            }
            Expr::Member { receiver, name, pos } => self.eval_member(receiver, name, *pos, env),
            Expr::Index { receiver, index, pos } => self.eval_index(receiver, index, *pos, env),
            Expr::New { class_name, args, pos } => self.eval_new(class_name, args, *pos, env),
            Expr::RecordLiteral { type_name, fields, pos } => self.eval_record_literal(type_name, fields, *pos, env),
            Expr::ArrayLiteral { elements, pos } => self.eval_array_literal(elements, *pos, env),
            Expr::Range { lo, hi, .. } => {
                // A bare range expression (outside a `case`/`for` context)
                // evaluates to its lower bound; `Case`/`CaseMatch::Range`
                // interpret `lo`/`hi` directly rather than going through
                // this arm.
                self.eval_expr(lo, env)?;
                self.eval_expr(hi, env)
            }
            Expr::OldRef { ident, pos } => self.eval_old_ref(ident, *pos),
            Expr::Cast { type_expr, expr, pos } => self.eval_cast(type_expr, expr, *pos, env),
            Expr::Inherited { method, args, pos } => self.eval_inherited(method.as_deref(), args.as_deref(), *pos, env),
            Expr::Text(_, inner) => self.eval_expr(inner, env),
        }
    }

    fn eval_ident(&self, name: &str, pos: Position, env: &crate::env::Environment) -> EvalResult<Value> {
        if let Some(v) = env.get(name) {
            return self.force(v);
        }
        if let Some(e) = self.types.borrow().lookup_enum(name) {
            if let Some(ordinal) = e.ordinal_of(name) {
                return Ok(Value::new_enum(e, ordinal));
            }
            return Ok(Value::TypeValue(TypeDescriptorValue::Enum(e)));
        }
        if let Some(r) = self.types.borrow().lookup_record(name) {
            return Ok(Value::TypeValue(TypeDescriptorValue::Record(r)));
        }
        if let Some(c) = self.types.borrow().lookup_class(name) {
            return Ok(Value::ClassInfo(c));
        }
        // `Pi`, `MaxInt`, and the like read as bare identifiers, not
        // calls — §4.H lists them as functions, but nothing else in the
        // language distinguishes a niladic function from a constant.
        if let Ok(builtin) = name.parse::<Builtin>() {
            if builtin.is_niladic_constant() {
                return self.call_builtin(builtin, &[], pos, env);
            }
        }
        Err(RuntimeError::new(pos, format!("undefined identifier: {name}")).into())
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, pos: Position, env: &crate::env::Environment) -> EvalResult<Value> {
        let v = self.eval_expr(operand, env)?.deref();
        match (op, &v) {
            (UnaryOp::Neg, Value::Integer(n)) => Ok(Value::Integer(-n)),
            (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (UnaryOp::Not, Value::Integer(n)) => Ok(Value::Integer(!n)),
            _ => Err(RuntimeError::new(pos, format!("type mismatch: unary op on {}", v.type_name())).into()),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        pos: Position,
        env: &crate::env::Environment,
    ) -> EvalResult<Value> {
        let lhs = self.eval_expr(left, env)?.deref();
        let rhs = self.eval_expr(right, env)?.deref();

        if let Some(result) = self.try_operator_overload(op, &lhs, &rhs, pos, env)? {
            return Ok(result);
        }

        use BinaryOp::*;
        match op {
            Add | Sub | Mul | Div | IntDiv | Modulo => self.eval_numeric(op, &lhs, &rhs, pos),
            And | Or | Xor => lhs.logical_binary(op.symbol(), &rhs, pos),
            Eq => Ok(Value::Boolean(lhs.values_equal(&rhs, pos)?)),
            Ne => Ok(Value::Boolean(!lhs.values_equal(&rhs, pos)?)),
            Lt => Ok(Value::Boolean(lhs.compare(&rhs, pos)?.is_lt())),
            Gt => Ok(Value::Boolean(lhs.compare(&rhs, pos)?.is_gt())),
            Le => Ok(Value::Boolean(lhs.compare(&rhs, pos)?.is_le())),
            Ge => Ok(Value::Boolean(lhs.compare(&rhs, pos)?.is_ge())),
        }
    }

    fn eval_numeric(&self, op: BinaryOp, lhs: &Value, rhs: &Value, pos: Position) -> EvalResult<Value> {
        let sym = op.symbol();
        match op {
            BinaryOp::Div => match (lhs, rhs) {
                (Value::Integer(a), Value::Integer(b)) => {
                    if *b == 0 {
                        Err(self.zero_divide_exception())
                    } else {
                        Ok(Value::Float(*a as f64 / *b as f64))
                    }
                }
                (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                    let b = rhs.as_f64().unwrap();
                    if b == 0.0 {
                        Err(self.zero_divide_exception())
                    } else {
                        Ok(Value::Float(lhs.as_f64().unwrap() / b))
                    }
                }
                _ => Err(RuntimeError::type_mismatch(pos, lhs, sym, rhs).into()),
            },
            BinaryOp::IntDiv | BinaryOp::Modulo => match (lhs, rhs) {
                (Value::Integer(a), Value::Integer(b)) => {
                    if *b == 0 {
                        Err(self.zero_divide_exception())
                    } else if op == BinaryOp::IntDiv {
                        Ok(Value::Integer(a.wrapping_div(*b)))
                    } else {
                        Ok(Value::Integer(a.wrapping_rem(*b)))
                    }
                }
                _ => Err(RuntimeError::new(pos, format!("'{sym}' requires Integer operands")).into()),
            },
            _ => lhs.numeric_binary(sym, rhs, pos),
        }
    }

    pub(crate) fn zero_divide_exception(&self) -> Unwind {
        self.new_exception_unwind(&self.exceptions.e_zero_divide.clone(), "Division by zero".to_string())
    }

    fn eval_member(&self, receiver: &Expr, name: &str, pos: Position, env: &crate::env::Environment) -> EvalResult<Value> {
        let recv = self.eval_expr(receiver, env)?.deref();
        self.get_member(&recv, name, pos, env)
    }

    fn eval_index(&self, receiver: &Expr, index: &Expr, pos: Position, env: &crate::env::Environment) -> EvalResult<Value> {
        let recv = self.eval_expr(receiver, env)?.deref();
        let idx_val = self.eval_expr(index, env)?.deref();
        self.index_value(&recv, &idx_val, pos, env)
    }

    pub(crate) fn index_value(
        &self,
        recv: &Value,
        idx_val: &Value,
        pos: Position,
        env: &crate::env::Environment,
    ) -> EvalResult<Value> {
        match recv {
            Value::Array(arr) => {
                let idx = as_integer(idx_val, pos)?;
                let data = arr.borrow();
                match array_slot(&data, idx) {
                    Some(i) => Ok(data.elements[i].clone()),
                    None => Err(RuntimeError::new(pos, format!("array index out of bounds: {idx}")).into()),
                }
            }
            Value::Str(s) => {
                let idx = as_integer(idx_val, pos)?;
                let chars: Vec<char> = s.chars().collect();
                if idx < 1 || idx as usize > chars.len() {
                    return Err(RuntimeError::new(pos, format!("string index out of bounds: {idx}")).into());
                }
                Ok(Value::Str(chars[(idx - 1) as usize].to_string()))
            }
            Value::Object(_) => self.call_default_property(recv, vec![idx_val.clone()], pos, env),
            other => Err(RuntimeError::new(pos, format!("type mismatch: cannot index into {}", other.type_name())).into()),
        }
    }

    fn eval_record_literal(
        &self,
        type_name: &Option<String>,
        fields: &[(String, Expr)],
        pos: Position,
        env: &crate::env::Environment,
    ) -> EvalResult<Value> {
        let descriptor = match type_name {
            Some(n) => self
                .types
                .borrow()
                .lookup_record(n)
                .ok_or_else(|| RuntimeError::new(pos, format!("undefined record type: {n}")))?,
            None => return Err(RuntimeError::new(pos, "record literal requires a named type").into()),
        };
        let mut value = Value::default_record(descriptor);
        if let Value::Record(r) = &mut value {
            for (name, e) in fields {
                let v = self.eval_expr(e, env)?.deref();
                r.fields.insert(name.to_lowercase(), v);
            }
        }
        Ok(value)
    }

    fn eval_array_literal(&self, elements: &[Expr], pos: Position, env: &crate::env::Environment) -> EvalResult<Value> {
        let mut values = Vec::with_capacity(elements.len());
        for e in elements {
            values.push(self.eval_expr(e, env)?.deref());
        }
        let descriptor = Rc::new(ArrayType {
            element: crate::ast::TypeExpr::Named("Variant".to_string()),
            bounds: None,
        });
        let _ = pos;
        Ok(Value::new_array(descriptor, values))
    }

    fn eval_old_ref(&self, ident: &str, pos: Position) -> EvalResult<Value> {
        self.old_stack
            .borrow()
            .current()
            .and_then(|s| s.get(ident).cloned())
            .ok_or_else(|| RuntimeError::new(pos, format!("old({ident}) used outside a postcondition")).into())
    }

    fn eval_cast(
        &self,
        type_expr: &crate::ast::TypeExpr,
        expr: &Expr,
        pos: Position,
        env: &crate::env::Environment,
    ) -> EvalResult<Value> {
        let v = self.eval_expr(expr, env)?.deref();
        let resolved = self
            .types
            .borrow()
            .resolve_type_expr(type_expr, pos)
            .map_err(Unwind::Error)?;
        self.coerce_to(&v, &resolved, pos)
    }

    /// Explicit-cast coercion (§4.A/§4.D `TypeName(expr)`): widens numerics,
    /// round-trips through `display_string`/parsing for strings, and
    /// otherwise requires the value already match the target type.
    pub(crate) fn coerce_to(&self, value: &Value, target: &ResolvedType, pos: Position) -> EvalResult<Value> {
        match target {
            ResolvedType::Primitive(PrimitiveType::Integer) => Ok(Value::Integer(as_integer(value, pos)?)),
            ResolvedType::Primitive(PrimitiveType::Float) => Ok(Value::Float(crate::coerce::as_float(value, pos)?)),
            ResolvedType::Primitive(PrimitiveType::StringT) => Ok(Value::Str(value.display_string())),
            ResolvedType::Primitive(PrimitiveType::Boolean) => Ok(Value::Boolean(value.truthy(pos)?)),
            ResolvedType::Primitive(PrimitiveType::Variant) => Ok(Value::boxed_variant(value.clone())),
            ResolvedType::Enum(e) => match value {
                Value::Integer(n) if e.name_for(*n).is_some() => Ok(Value::new_enum(e.clone(), *n)),
                Value::Enum(ev) if Rc::ptr_eq(&ev.enum_type, e) => Ok(value.clone()),
                _ => Err(RuntimeError::new(pos, format!("cannot cast {} to {}", value.type_name(), e.name)).into()),
            },
            ResolvedType::Class(c) => match value {
                Value::Object(obj) if self.class_is_or_inherits(&obj.borrow().class, c) => Ok(value.clone()),
                Value::Nil => Ok(Value::Nil),
                _ => Err(RuntimeError::new(pos, format!("cannot cast {} to {}", value.type_name(), c.borrow().name)).into()),
            },
            _ => Ok(value.clone()),
        }
    }
}
