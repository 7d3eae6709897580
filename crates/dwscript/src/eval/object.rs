//! The rest of the Object Model (component E, §4.E): everything that needs
//! to execute script code — instantiation, dynamic dispatch, helper method
//! resolution, property get/set, and operator-overload dispatch — plus the
//! declaration-time construction of `ClassInfo`/`RecordInfo`/`InterfaceInfo`/
//! `EnumType`/`HelperInfo` descriptors from their AST decls.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{
    BinaryOp, ClassDecl, Expr, HelperDecl, InterfaceDecl, MethodKind, OperatorKind, Position, RecordDecl, TypeExpr,
};
use crate::env::Environment;
use crate::errors::{EvalResult, RaisedException, RuntimeError, Unwind};
use crate::eval::Evaluator;
use crate::object::resolve_overload;
use crate::types::{ClassInfo, EnumType, HelperInfo, InterfaceInfo, MethodEntry, OperatorEntry, PropertyInfo, RecordInfo};
use crate::value::{CallableBody, CallableValue, ObjectData, ObjectRef, TypeDescriptorValue, Value};

impl Evaluator {
    pub(crate) fn class_is_or_inherits(&self, class: &Rc<RefCell<ClassInfo>>, target: &Rc<RefCell<ClassInfo>>) -> bool {
        ClassInfo::inherits_from(class, &target.borrow().name)
    }

    /// Resolves a `var`/parameter's declared type annotation to a class
    /// descriptor, when it names one — used to record a binding's static
    /// type for non-virtual method dispatch (§4.E).
    pub(crate) fn named_class_of(&self, type_expr: Option<&TypeExpr>) -> Option<Rc<RefCell<ClassInfo>>> {
        match type_expr {
            Some(TypeExpr::Named(name)) => self.types.borrow().lookup_class(name),
            _ => None,
        }
    }

    /// The static (declared) class of a method-call receiver expression,
    /// when it's statically known: a plain variable or parameter with a
    /// named class type, or `Self` (whose static type is the class the
    /// currently-executing method was declared on, per `inherited`'s own
    /// tracking). Any other receiver expression — a call result, a field
    /// access, an array element — has no declared type available at this
    /// tree-walker's level, so non-virtual dispatch there falls back to
    /// the dynamic class.
    fn static_class_of(&self, receiver: &Expr, env: &Environment) -> Option<Rc<RefCell<ClassInfo>>> {
        if let Expr::Ident(name, _) = receiver {
            if name.eq_ignore_ascii_case("self") {
                return self.method_stack.borrow().last().map(|m| Rc::clone(&m.owner));
            }
            return env.static_class(name);
        }
        None
    }

    /// Builds a fresh, catchable exception object of `class` carrying
    /// `message` in its `Message` field and the currently-captured call
    /// stack (§4.F, §4.J). Used both by the Evaluator's own Runtime
    /// conditions that are catchable exceptions (division by zero, stack
    /// overflow, failed contracts) and by `raise EFoo.Create(...)`.
    pub(crate) fn new_exception_unwind(&self, class: &Rc<RefCell<ClassInfo>>, message: String) -> Unwind {
        let mut fields = AHashMap::default();
        fields.insert("message".to_string(), Value::Str(message));
        let obj: ObjectRef = Rc::new(RefCell::new(ObjectData {
            class: Rc::clone(class),
            fields,
        }));
        Unwind::Exception(Rc::new(RaisedException {
            instance: Value::Object(obj),
            raise_pos: self.current_position.get(),
            stack: self.call_stack.borrow().clone(),
        }))
    }

    // ---- declaration-time descriptor construction -------------------

    pub(crate) fn declare_record(&self, decl: &RecordDecl) -> EvalResult<()> {
        let mut methods: IndexMap<String, crate::types::OverloadSet> = IndexMap::new();
        for m in &decl.methods {
            methods
                .entry(m.name.to_lowercase())
                .or_default()
                .push(Rc::new(MethodEntry {
                    decl: Rc::new(m.clone()),
                    owner_class: decl.name.clone(),
                }));
        }
        let mut properties = IndexMap::new();
        for p in &decl.properties {
            properties.insert(p.name.to_lowercase(), property_info(p));
        }
        let mut consts = AHashMap::default();
        for c in &decl.consts {
            consts.insert(c.name.to_lowercase(), self.eval_expr(&c.value, &self.globals)?.deref());
        }
        let mut class_vars = AHashMap::default();
        for v in &decl.class_vars {
            class_vars.insert(v.name.to_lowercase(), self.declared_var_initial(v)?);
        }
        let mut operators = AHashMap::default();
        for op in &decl.operators {
            operators.insert(
                op.op,
                OperatorEntry {
                    decl: Rc::new(op.clone()),
                    owner_class: decl.name.clone(),
                },
            );
        }
        let record = Rc::new(RecordInfo {
            name: decl.name.clone(),
            fields: decl.fields.clone(),
            methods,
            properties,
            consts,
            class_vars: RefCell::new(class_vars),
            operators,
        });
        self.types.borrow_mut().register_record(&decl.name, record);
        Ok(())
    }

    pub(crate) fn declare_class(&self, decl: &ClassDecl) -> EvalResult<()> {
        let parent = match &decl.parent {
            Some(name) => Some(
                self.types
                    .borrow()
                    .lookup_class(name)
                    .ok_or_else(|| RuntimeError::new(decl.pos, format!("undefined parent class: {name}")))?,
            ),
            None => None,
        };
        let mut interfaces = Vec::new();
        for name in &decl.interfaces {
            let iface = self
                .types
                .borrow()
                .lookup_interface(name)
                .ok_or_else(|| RuntimeError::new(decl.pos, format!("undefined interface: {name}")))?;
            interfaces.push(iface);
        }
        let mut methods: IndexMap<String, crate::types::OverloadSet> = IndexMap::new();
        for m in &decl.methods {
            methods
                .entry(m.name.to_lowercase())
                .or_default()
                .push(Rc::new(MethodEntry {
                    decl: Rc::new(m.clone()),
                    owner_class: decl.name.clone(),
                }));
        }
        let mut properties = IndexMap::new();
        for p in &decl.properties {
            properties.insert(p.name.to_lowercase(), property_info(p));
        }
        let mut consts = AHashMap::default();
        for c in &decl.consts {
            consts.insert(c.name.to_lowercase(), self.eval_expr(&c.value, &self.globals)?.deref());
        }
        let mut class_vars = AHashMap::default();
        for v in &decl.class_vars {
            class_vars.insert(v.name.to_lowercase(), self.declared_var_initial(v)?);
        }
        let mut operators = AHashMap::default();
        for op in &decl.operators {
            operators.insert(
                op.op,
                OperatorEntry {
                    decl: Rc::new(op.clone()),
                    owner_class: decl.name.clone(),
                },
            );
        }
        let class = Rc::new(RefCell::new(ClassInfo {
            name: decl.name.clone(),
            parent,
            interfaces,
            flags: decl.flags.clone(),
            fields: decl.fields.clone(),
            methods,
            properties,
            consts,
            class_vars: RefCell::new(class_vars),
            operators,
            default_constructor: Some(decl.default_constructor.clone().unwrap_or_else(|| "Create".to_string())),
        }));
        self.types.borrow_mut().register_class(&decl.name, class);
        Ok(())
    }

    pub(crate) fn declare_interface(&self, decl: &InterfaceDecl) -> EvalResult<()> {
        let iface = Rc::new(InterfaceInfo {
            name: decl.name.clone(),
            parent: decl.parent.clone(),
            methods: decl.methods.clone(),
        });
        self.types.borrow_mut().register_interface(&decl.name, iface);
        Ok(())
    }

    pub(crate) fn declare_enum(&self, decl: &crate::ast::EnumDecl) -> EvalResult<()> {
        let e = Rc::new(EnumType::new(decl.name.clone(), &decl.values));
        // Each declared value name resolves as a bare identifier (`Red`),
        // not only through its type (`TColor.Red`) — §4.A/§4.C.
        for name in &e.ordered_names {
            if let Some(ordinal) = e.ordinal_of(name) {
                self.globals.define(name, Value::new_enum(Rc::clone(&e), ordinal));
            }
        }
        self.types.borrow_mut().register_enum(&decl.name, e);
        Ok(())
    }

    pub(crate) fn declare_helper(&self, decl: &HelperDecl) -> EvalResult<()> {
        let mut methods: IndexMap<String, crate::types::OverloadSet> = IndexMap::new();
        for m in &decl.methods {
            methods
                .entry(m.name.to_lowercase())
                .or_default()
                .push(Rc::new(MethodEntry {
                    decl: Rc::new(m.clone()),
                    owner_class: decl.name.clone(),
                }));
        }
        let mut properties = IndexMap::new();
        for p in &decl.properties {
            properties.insert(p.name.to_lowercase(), property_info(p));
        }
        let mut consts = AHashMap::default();
        for c in &decl.consts {
            consts.insert(c.name.to_lowercase(), self.eval_expr(&c.value, &self.globals)?.deref());
        }
        let mut class_vars = AHashMap::default();
        for v in &decl.class_vars {
            class_vars.insert(v.name.to_lowercase(), self.declared_var_initial(v)?);
        }
        let helper = Rc::new(HelperInfo {
            name: decl.name.clone(),
            target: decl.target.clone(),
            parent_helper: decl.parent_helper.clone(),
            methods,
            properties,
            consts,
            class_vars: RefCell::new(class_vars),
        });
        self.types.borrow_mut().register_helper(helper);
        Ok(())
    }

    fn declared_var_initial(&self, v: &crate::ast::VarDecl) -> EvalResult<Value> {
        match &v.initializer {
            Some(e) => Ok(self.eval_expr(e, &self.globals)?.deref()),
            None => match &v.type_expr {
                Some(te) => Ok(self
                    .types
                    .borrow()
                    .resolve_type_expr(te, v.pos)
                    .map_err(Unwind::Error)?
                    .zero_value()),
                None => Ok(Value::unassigned_variant()),
            },
        }
    }

    // ---- instantiation -------------------------------------------------

    pub(crate) fn eval_new(&self, class_name: &str, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
        let class = match self.types.borrow().lookup_class(class_name) {
            Some(c) => c,
            // §4.E rule 1: no such class — if a record of that name exists,
            // rewrite as a static method call on the record (e.g.
            // `TPoint.Create(1, 2)` spelled `new TPoint(1, 2)`).
            None => {
                let record = self
                    .types
                    .borrow()
                    .lookup_record(class_name)
                    .ok_or_else(|| RuntimeError::new(pos, format!("undefined class: {class_name}")))?;
                let arg_values = self.eval_args(args, pos, env)?;
                return self.call_record_static_method(&record, "Create", &arg_values, pos);
            }
        };
        {
            let c = class.borrow();
            if c.flags.is_abstract {
                return Err(RuntimeError::new(pos, format!("cannot instantiate abstract class {}", c.name)).into());
            }
            if c.flags.is_external {
                return Err(RuntimeError::new(pos, format!("cannot instantiate external class {}", c.name)).into());
            }
        }
        let arg_values = self.eval_args(args, pos, env)?;
        let ctor_name = class.borrow().default_constructor.clone().unwrap_or_else(|| "Create".to_string());
        self.instantiate_with_values(&class, &ctor_name, &arg_values, pos)
    }

    /// `TRecord.Create(...)` (§4.H "enum properties (method-like)" sibling
    /// rule for records, §4.E rule 1): a plain static call, no `Self`
    /// binding — the method body is expected to build and return its own
    /// `RecordLiteral`.
    pub(crate) fn call_record_static_method(
        &self,
        record: &Rc<RecordInfo>,
        method: &str,
        args: &[Value],
        pos: Position,
    ) -> EvalResult<Value> {
        let set = record
            .methods
            .get(&method.to_lowercase())
            .ok_or_else(|| RuntimeError::new(pos, format!("undefined method: {method} on {}", record.name)))?;
        let chosen = resolve_overload(&set.entries, args, &self.types.borrow(), pos, method)
            .map_err(Unwind::Error)?
            .clone();
        let callable = Rc::new(CallableValue {
            name: chosen.name().to_string(),
            body: CallableBody::Method(Rc::clone(&chosen.decl)),
            closure: self.globals.clone(),
            receiver: None,
            owner_class: None,
        });
        self.call_callable_values(&callable, args, pos, None)
    }

    fn eval_args(&self, args: &[Expr], _pos: Position, env: &Environment) -> EvalResult<Vec<Value>> {
        args.iter().map(|a| Ok(self.eval_expr(a, env)?.deref())).collect()
    }

    /// Allocates a blank instance, walking the field-initializer chain
    /// root-to-leaf so an overriding field declaration's own initializer
    /// wins (§4.E), then runs the named constructor if one exists.
    pub(crate) fn instantiate_with_values(
        &self,
        class: &Rc<RefCell<ClassInfo>>,
        ctor_name: &str,
        args: &[Value],
        pos: Position,
    ) -> EvalResult<Value> {
        let obj = self.new_blank_instance(class)?;
        match ClassInfo::find_method_owner(class, ctor_name) {
            Some(owner) => {
                let has_zero_arg_overload = owner
                    .borrow()
                    .methods
                    .get(&ctor_name.to_lowercase())
                    .map(|set| set.entries.iter().any(|e| e.params().iter().all(|p| p.default.is_some())))
                    .unwrap_or(false);
                // §4.E rule 4: zero args and no parameterless overload —
                // skip constructor execution entirely, the blank instance
                // (default field values) is the result.
                if !(args.is_empty() && !has_zero_arg_overload) {
                    let (owner, chosen) = self.resolve_method_entry(&owner, None, ctor_name, args, pos)?;
                    let callable = Rc::new(CallableValue {
                        name: chosen.name().to_string(),
                        body: CallableBody::Method(Rc::clone(&chosen.decl)),
                        closure: self.globals.clone(),
                        receiver: Some(Rc::clone(&obj)),
                        owner_class: Some(owner),
                    });
                    self.call_callable_values(&callable, args, pos, Some(Value::Object(Rc::clone(&obj))))?;
                }
            }
            // §4.E rule 5: no explicit constructor declared anywhere in the
            // hierarchy — `EHost.Create(className, msg)` sets both fields
            // directly; any other Exception-derived class accepts a single
            // message string the same way.
            None => {
                if ClassInfo::inherits_from(class, "EHost") && args.len() == 2 {
                    if let (Value::Str(class_name), Value::Str(msg)) = (&args[0], &args[1]) {
                        let mut data = obj.borrow_mut();
                        data.fields.insert("exceptionclass".to_string(), Value::Str(class_name.clone()));
                        data.fields.insert("message".to_string(), Value::Str(msg.clone()));
                    }
                } else if ClassInfo::inherits_from(class, "Exception") && args.len() == 1 {
                    if let Value::Str(msg) = &args[0] {
                        obj.borrow_mut().fields.insert("message".to_string(), Value::Str(msg.clone()));
                    }
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn new_blank_instance(&self, class: &Rc<RefCell<ClassInfo>>) -> EvalResult<ObjectRef> {
        let mut chain = Vec::new();
        let mut cur = Some(Rc::clone(class));
        while let Some(c) = cur {
            let parent = c.borrow().parent.clone();
            chain.push(c);
            cur = parent;
        }
        chain.reverse();
        let mut fields = AHashMap::default();
        for c in &chain {
            let field_decls = c.borrow().fields.clone();
            for f in &field_decls {
                let value = match &f.initializer {
                    Some(e) => self.eval_expr(e, &self.globals)?.deref(),
                    None => self
                        .types
                        .borrow()
                        .resolve_type_expr(&f.type_expr, f.pos)
                        .map(|r| r.zero_value())
                        .unwrap_or(Value::unassigned_variant()),
                };
                fields.insert(f.name.to_lowercase(), value);
            }
        }
        Ok(Rc::new(RefCell::new(ObjectData {
            class: Rc::clone(class),
            fields,
        })))
    }

    /// Resolves `name` to its declaring class and the winning overload
    /// (§4.E rules 1-2). `static_class`, when known, is the receiver's
    /// declared type: a non-virtual `name` (no `virtual`/`override` on any
    /// overload found there) resolves against that declared owner instead
    /// of `class` (the receiver's dynamic type) — a non-virtual method
    /// always runs the static type's body. Only a method found with
    /// `virtual`/`override` set, or no static type at all, dispatches
    /// dynamically from `class`.
    fn resolve_method_entry(
        &self,
        class: &Rc<RefCell<ClassInfo>>,
        static_class: Option<&Rc<RefCell<ClassInfo>>>,
        name: &str,
        args: &[Value],
        pos: Position,
    ) -> EvalResult<(Rc<RefCell<ClassInfo>>, Rc<MethodEntry>)> {
        let dynamic_owner = ClassInfo::find_method_owner(class, name);
        let owner = match static_class.and_then(|sc| ClassInfo::find_method_owner(sc, name)) {
            Some(static_owner) => {
                let is_virtual = static_owner
                    .borrow()
                    .methods
                    .get(&name.to_lowercase())
                    .map(|set| set.entries.iter().any(|e| e.flags().is_virtual || e.flags().is_override))
                    .unwrap_or(false);
                if is_virtual { dynamic_owner } else { Some(static_owner) }
            }
            None => dynamic_owner,
        }
        .ok_or_else(|| RuntimeError::new(pos, format!("undefined method: {name}")))?;
        let entries = owner.borrow().methods.get(&name.to_lowercase()).unwrap().entries.clone();
        let chosen = resolve_overload(&entries, args, &self.types.borrow(), pos, name)
            .map_err(Unwind::Error)?
            .clone();
        Ok((owner, chosen))
    }

    /// `inherited` / `inherited Name(args)` (§4.E): resolves statically
    /// against the class the currently-executing method was *declared*
    /// on, never the receiver's dynamic class — that's what makes it safe
    /// to call from inside an override without recursing back into the
    /// override itself. A bare `inherited;` reuses the enclosing method's
    /// own name and forwards its parameters unchanged, the same as Object
    /// Pascal's own sugar.
    pub(crate) fn eval_inherited(
        &self,
        method: Option<&str>,
        args: Option<&[Expr]>,
        pos: Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let (current_owner, current_name, param_names) = {
            let stack = self.method_stack.borrow();
            let top = stack
                .last()
                .ok_or_else(|| RuntimeError::new(pos, "inherited used outside a method body"))?;
            (Rc::clone(&top.owner), top.name.clone(), top.param_names.clone())
        };
        let parent = current_owner.borrow().parent.clone().ok_or_else(|| {
            RuntimeError::new(pos, format!("{} has no parent class", current_owner.borrow().name))
        })?;
        let method_name = method.unwrap_or(&current_name);
        let arg_values = match args {
            Some(exprs) => self.eval_args(exprs, pos, env)?,
            None => param_names
                .iter()
                .map(|name| {
                    env.get(name)
                        .map(|v| v.deref())
                        .ok_or_else(|| RuntimeError::new(pos, format!("undefined identifier: {name}")).into())
                })
                .collect::<EvalResult<Vec<_>>>()?,
        };
        let self_obj = match env.get("self").map(|v| v.deref()) {
            Some(Value::Object(o)) => o,
            _ => return Err(RuntimeError::new(pos, "inherited called without an object Self").into()),
        };
        let (owner, chosen) = self.resolve_method_entry(&parent, Some(&parent), method_name, &arg_values, pos)?;
        let callable = Rc::new(CallableValue {
            name: chosen.name().to_string(),
            body: CallableBody::Method(Rc::clone(&chosen.decl)),
            closure: self.globals.clone(),
            receiver: Some(Rc::clone(&self_obj)),
            owner_class: Some(owner),
        });
        self.call_callable_values(&callable, &arg_values, pos, Some(Value::Object(self_obj)))
    }

    // ---- method call dispatch -------------------------------------------

    pub(crate) fn eval_method_call(
        &self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        pos: Position,
        env: &Environment,
    ) -> EvalResult<Value> {
        let recv_val = self.eval_expr(receiver, env)?.deref();
        let arg_values = self.eval_args(args, pos, env)?;
        match &recv_val {
            Value::ClassInfo(c) => {
                if ClassInfo::find_method_owner(c, method).is_none() {
                    match method.to_lowercase().as_str() {
                        "inheritsfrom" => {
                            let target = crate::coerce::as_string(
                                arg_values.first().ok_or_else(|| RuntimeError::new(pos, "InheritsFrom requires one argument"))?,
                                pos,
                            )?;
                            return Ok(Value::Boolean(ClassInfo::inherits_from(c, &target)));
                        }
                        "byname" => {
                            let target = crate::coerce::as_string(
                                arg_values.first().ok_or_else(|| RuntimeError::new(pos, "ByName requires one argument"))?,
                                pos,
                            )?;
                            return self
                                .types
                                .borrow()
                                .lookup_class(&target)
                                .map(Value::ClassInfo)
                                .ok_or_else(|| RuntimeError::new(pos, format!("no class registered named {target}")).into());
                        }
                        _ => {}
                    }
                }
                let default_ctor = c.borrow().default_constructor.clone().unwrap_or_else(|| "Create".to_string());
                if let Some(owner) = ClassInfo::find_method_owner(c, method) {
                    let is_ctor = owner
                        .borrow()
                        .methods
                        .get(&method.to_lowercase())
                        .map(|s| s.entries.iter().any(|e| e.kind() == MethodKind::Constructor))
                        .unwrap_or(false);
                    if is_ctor || method.eq_ignore_ascii_case(&default_ctor) {
                        return self.instantiate_with_values(c, method, &arg_values, pos);
                    }
                    let (owner, chosen) = self.resolve_method_entry(c, Some(c), method, &arg_values, pos)?;
                    let callable = Rc::new(CallableValue {
                        name: chosen.name().to_string(),
                        body: CallableBody::Method(Rc::clone(&chosen.decl)),
                        closure: self.globals.clone(),
                        receiver: None,
                        owner_class: Some(owner),
                    });
                    return self.call_callable_values(&callable, &arg_values, pos, None);
                }
                Err(RuntimeError::new(pos, format!("undefined method: {method}")).into())
            }
            Value::Object(obj) => {
                let class = Rc::clone(&obj.borrow().class);
                if ClassInfo::find_method_owner(&class, method).is_none() && method.eq_ignore_ascii_case("inheritsfrom") {
                    let target = crate::coerce::as_string(
                        arg_values.first().ok_or_else(|| RuntimeError::new(pos, "InheritsFrom requires one argument"))?,
                        pos,
                    )?;
                    return Ok(Value::Boolean(ClassInfo::inherits_from(&class, &target)));
                }
                let static_class = self.static_class_of(receiver, env);
                let (owner, chosen) = self.resolve_method_entry(&class, static_class.as_ref(), method, &arg_values, pos)?;
                let callable = Rc::new(CallableValue {
                    name: chosen.name().to_string(),
                    body: CallableBody::Method(Rc::clone(&chosen.decl)),
                    closure: self.globals.clone(),
                    receiver: Some(Rc::clone(obj)),
                    owner_class: Some(owner),
                });
                self.call_callable_values(&callable, &arg_values, pos, Some(Value::Object(Rc::clone(obj))))
            }
            Value::Record(r) => {
                if let Some(set) = r.descriptor.methods.get(&method.to_lowercase()) {
                    let chosen = resolve_overload(&set.entries, &arg_values, &self.types.borrow(), pos, method)
                        .map_err(Unwind::Error)?
                        .clone();
                    let self_binding = self.record_self_binding(receiver, &recv_val, env);
                    let callable = Rc::new(CallableValue {
                        name: chosen.name().to_string(),
                        body: CallableBody::Method(Rc::clone(&chosen.decl)),
                        closure: self.globals.clone(),
                        receiver: None,
                        owner_class: None,
                    });
                    self.call_callable_values(&callable, &arg_values, pos, Some(self_binding))
                } else {
                    self.try_helper_method(&recv_val, method, &arg_values, pos)
                }
            }
            // Intrinsic members (§4.E "Intrinsic members take precedence
            // on primitive types for fixed names") — checked before
            // falling back to user-declared helpers.
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Subrange { .. } | Value::Enum(_)
                if method.eq_ignore_ascii_case("tostring") =>
            {
                Ok(Value::Str(recv_val.display_string()))
            }
            Value::Array(a) if method.eq_ignore_ascii_case("join") => {
                let sep = match arg_values.first() {
                    Some(v) => crate::coerce::as_string(v, pos)?,
                    None => String::new(),
                };
                let parts: Vec<String> = a.borrow().elements.iter().map(Value::display_string).collect();
                Ok(Value::Str(parts.join(&sep)))
            }
            Value::Array(a) if method.eq_ignore_ascii_case("length") => Ok(Value::Integer(a.borrow().elements.len() as i64)),
            Value::Array(a) if method.eq_ignore_ascii_case("low") => Ok(Value::Integer(array_low(&a.borrow()))),
            Value::Array(a) if method.eq_ignore_ascii_case("high") => Ok(Value::Integer(array_high(&a.borrow()))),
            Value::TypeValue(TypeDescriptorValue::Enum(e)) if method.eq_ignore_ascii_case("byname") => {
                let name = crate::coerce::as_string(
                    arg_values
                        .first()
                        .ok_or_else(|| RuntimeError::new(pos, "ByName requires one argument"))?,
                    pos,
                )?;
                e.ordinal_of(&name)
                    .map(Value::Integer)
                    .ok_or_else(|| RuntimeError::new(pos, format!("{} has no value named {name}", e.name)).into())
            }
            Value::TypeValue(TypeDescriptorValue::Record(r)) => self.call_record_static_method(r, method, &arg_values, pos),
            other => self.try_helper_method(other, method, &arg_values, pos),
        }
    }

    /// Binds a record method's implicit `Self`: when the receiver
    /// expression is itself assignable, `Self` is bound as a `Reference`
    /// routed through that base lvalue, so field mutation inside the
    /// method writes back to the caller's variable (§3.4, §9 — records are
    /// value types, so there is no shared identity to mutate through
    /// except the place the value currently lives). A non-assignable
    /// receiver (e.g. a function's return value) binds a plain snapshot —
    /// any mutation only affects the discarded temporary.
    fn record_self_binding(&self, receiver: &Expr, recv_val: &Value, env: &Environment) -> Value {
        match self.eval_lvalue(receiver, env) {
            Ok(lv) => Value::Reference(lv),
            Err(_) => recv_val.clone(),
        }
    }

    /// Helper-method resolution (§4.E, §9): walks the helpers registered
    /// for the value's runtime type, most-recently-declared first, and
    /// calls the first matching overload it finds.
    fn try_helper_method(&self, recv_val: &Value, method: &str, args: &[Value], pos: Position) -> EvalResult<Value> {
        let type_key = helper_type_key(recv_val);
        let helpers = self.types.borrow().helpers_for(&type_key);
        for helper in &helpers {
            if let Some(set) = helper.methods.get(&method.to_lowercase()) {
                let chosen = resolve_overload(&set.entries, args, &self.types.borrow(), pos, method)
                    .map_err(Unwind::Error)?
                    .clone();
                let callable = Rc::new(CallableValue {
                    name: chosen.name().to_string(),
                    body: CallableBody::Method(Rc::clone(&chosen.decl)),
                    closure: self.globals.clone(),
                    receiver: None,
                    owner_class: None,
                });
                return self.call_callable_values(&callable, args, pos, Some(recv_val.clone()));
            }
        }
        Err(RuntimeError::new(pos, format!("undefined method: {method} on {}", recv_val.type_name())).into())
    }

    // ---- member/property access -----------------------------------------

    pub(crate) fn get_member(&self, recv: &Value, name: &str, pos: Position, env: &Environment) -> EvalResult<Value> {
        match recv {
            Value::Object(obj) => {
                let class = Rc::clone(&obj.borrow().class);
                if let Some(prop) = find_property(&class, name) {
                    return self.read_property(&prop, Value::Object(Rc::clone(obj)), pos, env);
                }
                let key = name.to_lowercase();
                if let Some(v) = obj.borrow().fields.get(&key).cloned() {
                    return Ok(v);
                }
                if let Some(v) = ClassInfo::find_class_var(&class, name) {
                    return Ok(v);
                }
                if ClassInfo::find_method_owner(&class, name).is_some() {
                    return self.eval_method_call_on_value(recv, name, &[], pos);
                }
                if name.eq_ignore_ascii_case("classname") {
                    return Ok(Value::Str(class.borrow().name.clone()));
                }
                if name.eq_ignore_ascii_case("classtype") {
                    return Ok(Value::ClassInfo(class));
                }
                Err(RuntimeError::new(pos, format!("{} has no member {name}", class.borrow().name)).into())
            }
            Value::Record(r) => {
                if let Some(prop) = r.descriptor.properties.get(&name.to_lowercase()).cloned() {
                    return self.read_property_record(r, &prop, pos);
                }
                let key = name.to_lowercase();
                if let Some(v) = r.fields.get(&key).cloned() {
                    return Ok(v);
                }
                if let Some(v) = r.descriptor.consts.get(&key).cloned() {
                    return Ok(v);
                }
                Err(RuntimeError::new(pos, format!("{} has no member {name}", r.descriptor.name)).into())
            }
            Value::ClassInfo(c) => {
                if let Some(v) = ClassInfo::find_class_var(c, name) {
                    return Ok(v);
                }
                if name.eq_ignore_ascii_case("classname") {
                    return Ok(Value::Str(c.borrow().name.clone()));
                }
                if name.eq_ignore_ascii_case("classparent") {
                    return Ok(c.borrow().parent.clone().map(Value::ClassInfo).unwrap_or(Value::Nil));
                }
                Err(RuntimeError::new(pos, format!("{} has no class member {name}", c.borrow().name)).into())
            }
            Value::TypeValue(TypeDescriptorValue::Enum(e)) => {
                if let Some(ordinal) = e.ordinal_of(name) {
                    return Ok(Value::new_enum(e.clone(), ordinal));
                }
                Err(RuntimeError::new(pos, format!("{} has no value {name}", e.name)).into())
            }
            Value::Array(a) if name.eq_ignore_ascii_case("length") => Ok(Value::Integer(a.borrow().elements.len() as i64)),
            Value::Array(a) if name.eq_ignore_ascii_case("low") => Ok(Value::Integer(array_low(&a.borrow()))),
            Value::Array(a) if name.eq_ignore_ascii_case("high") => Ok(Value::Integer(array_high(&a.borrow()))),
            Value::Enum(e) if name.eq_ignore_ascii_case("value") => Ok(Value::Integer(e.ordinal)),
            Value::Enum(e) if name.eq_ignore_ascii_case("name") => e
                .name()
                .map(Value::Str)
                .ok_or_else(|| RuntimeError::new(pos, format!("{} has no name for ordinal {}", e.enum_type.name, e.ordinal)).into()),
            Value::Enum(e) if name.eq_ignore_ascii_case("qualifiedname") => e
                .qualified_name()
                .map(Value::Str)
                .ok_or_else(|| RuntimeError::new(pos, format!("{} has no name for ordinal {}", e.enum_type.name, e.ordinal)).into()),
            other => self.try_helper_method(other, name, &[], pos),
        }
    }

    fn eval_method_call_on_value(&self, recv: &Value, method: &str, args: &[Value], pos: Position) -> EvalResult<Value> {
        match recv {
            Value::Object(obj) => {
                let class = Rc::clone(&obj.borrow().class);
                let (owner, chosen) = self.resolve_method_entry(&class, None, method, args, pos)?;
                let callable = Rc::new(CallableValue {
                    name: chosen.name().to_string(),
                    body: CallableBody::Method(Rc::clone(&chosen.decl)),
                    closure: self.globals.clone(),
                    receiver: Some(Rc::clone(obj)),
                    owner_class: Some(owner),
                });
                self.call_callable_values(&callable, args, pos, Some(Value::Object(Rc::clone(obj))))
            }
            _ => Err(RuntimeError::new(pos, "not an object").into()),
        }
    }

    fn read_property(&self, prop: &PropertyInfo, recv: Value, pos: Position, _env: &Environment) -> EvalResult<Value> {
        match &prop.getter {
            Some(name) => {
                if let Value::Object(obj) = &recv {
                    let key = name.to_lowercase();
                    if obj.borrow().fields.contains_key(&key) {
                        return Ok(obj.borrow().fields.get(&key).cloned().unwrap());
                    }
                }
                self.eval_method_call_on_value(&recv, name, &[], pos)
            }
            None => Err(RuntimeError::new(pos, format!("property {} has no getter", prop.name)).into()),
        }
    }

    fn read_property_record(&self, r: &crate::value::RecordValue, prop: &PropertyInfo, pos: Position) -> EvalResult<Value> {
        match &prop.getter {
            Some(name) => {
                let key = name.to_lowercase();
                if let Some(v) = r.fields.get(&key) {
                    return Ok(v.clone());
                }
                if let Some(set) = r.descriptor.methods.get(&key) {
                    let chosen = resolve_overload(&set.entries, &[], &self.types.borrow(), pos, name)
                        .map_err(Unwind::Error)?
                        .clone();
                    let callable = Rc::new(CallableValue {
                        name: chosen.name().to_string(),
                        body: CallableBody::Method(Rc::clone(&chosen.decl)),
                        closure: self.globals.clone(),
                        receiver: None,
                        owner_class: None,
                    });
                    return self.call_callable_values(&callable, &[], pos, Some(Value::Record(r.clone())));
                }
                Err(RuntimeError::new(pos, format!("property {} has no getter", prop.name)).into())
            }
            None => Err(RuntimeError::new(pos, format!("property {} has no getter", prop.name)).into()),
        }
    }

    /// Assignment-side property/field routing for `obj.Name := value`
    /// (§4.E). Returns `Ok(true)` when a property setter or plain field
    /// handled the write; `Ok(false)` tells the caller to fall back to the
    /// generic lvalue path (plain field with no property of that name).
    pub(crate) fn set_property_or_field(
        &self,
        obj: &ObjectRef,
        name: &str,
        value: Value,
        pos: Position,
        _env: &Environment,
    ) -> EvalResult<bool> {
        let class = Rc::clone(&obj.borrow().class);
        if let Some(prop) = find_property(&class, name) {
            match &prop.setter {
                Some(setter_name) => {
                    let key = setter_name.to_lowercase();
                    if obj.borrow().fields.contains_key(&key) {
                        obj.borrow_mut().fields.insert(key, value);
                        return Ok(true);
                    }
                    self.eval_method_call_on_value(&Value::Object(Rc::clone(obj)), setter_name, &[value], pos)?;
                    return Ok(true);
                }
                None => return Err(RuntimeError::new(pos, format!("property {} has no setter", prop.name)).into()),
            }
        }
        Ok(false)
    }

    /// `obj[idx]` default-indexed-property sugar (§4.E): dispatches to the
    /// class's `is_default` property's getter method with `idx` as its
    /// index argument.
    pub(crate) fn call_default_property(
        &self,
        recv: &Value,
        args: Vec<Value>,
        pos: Position,
        _env: &Environment,
    ) -> EvalResult<Value> {
        if let Value::Object(obj) = recv {
            let class = Rc::clone(&obj.borrow().class);
            if let Some(prop) = find_default_property(&class) {
                if let Some(getter) = &prop.getter {
                    return self.eval_method_call_on_value(recv, getter, &args, pos);
                }
            }
        }
        Err(RuntimeError::new(pos, format!("type mismatch: cannot index into {}", recv.type_name())).into())
    }

    /// Operator-overload dispatch (§4.E): looks for a matching `operator`
    /// declaration on either operand's class/record/helper before falling
    /// back to the built-in numeric/comparison rules. Returns `Ok(None)`
    /// when no overload applies so the caller proceeds with builtin
    /// semantics.
    pub(crate) fn try_operator_overload(
        &self,
        op: BinaryOp,
        lhs: &Value,
        rhs: &Value,
        pos: Position,
        _env: &Environment,
    ) -> EvalResult<Option<Value>> {
        let kind = match op_to_kind(op) {
            Some(k) => k,
            None => return Ok(None),
        };
        if let Value::Record(r) = lhs {
            if let Some(entry) = r.descriptor.operators.get(&kind) {
                return Ok(Some(self.call_operator_method(entry, lhs.clone(), rhs.clone(), pos)?));
            }
        }
        if let Value::Object(obj) = lhs {
            let class = Rc::clone(&obj.borrow().class);
            if let Some(entry) = find_operator(&class, kind) {
                return Ok(Some(self.call_operator_method(&entry, lhs.clone(), rhs.clone(), pos)?));
            }
        }
        // §4.E "If not found, the right operand's class is consulted
        // symmetrically."
        if let Value::Record(r) = rhs {
            if let Some(entry) = r.descriptor.operators.get(&kind) {
                return Ok(Some(self.call_operator_method(entry, lhs.clone(), rhs.clone(), pos)?));
            }
        }
        if let Value::Object(obj) = rhs {
            let class = Rc::clone(&obj.borrow().class);
            if let Some(entry) = find_operator(&class, kind) {
                return Ok(Some(self.call_operator_method(&entry, lhs.clone(), rhs.clone(), pos)?));
            }
        }
        Ok(None)
    }

    fn call_operator_method(&self, entry: &OperatorEntry, lhs: Value, rhs: Value, pos: Position) -> EvalResult<Value> {
        let callable = Rc::new(CallableValue {
            name: format!("operator {:?}", entry.decl.op),
            body: CallableBody::Method(Rc::new(crate::ast::MethodDecl {
                name: format!("operator_{:?}", entry.decl.op),
                kind: MethodKind::Static,
                flags: crate::ast::MethodFlags::default(),
                params: entry.decl.params.clone(),
                return_type: entry.decl.return_type.clone(),
                body: entry.decl.body.clone(),
                requires: Vec::new(),
                ensures: Vec::new(),
                pos: entry.decl.pos,
            })),
            closure: self.globals.clone(),
            receiver: None,
            owner_class: None,
        });
        self.call_callable_values(&callable, &[lhs, rhs], pos, None)
    }
}

fn op_to_kind(op: BinaryOp) -> Option<OperatorKind> {
    Some(match op {
        BinaryOp::Add => OperatorKind::Add,
        BinaryOp::Sub => OperatorKind::Sub,
        BinaryOp::Mul => OperatorKind::Mul,
        BinaryOp::Div => OperatorKind::Div,
        BinaryOp::IntDiv => OperatorKind::IntDiv,
        BinaryOp::Modulo => OperatorKind::Modulo,
        BinaryOp::And => OperatorKind::And,
        BinaryOp::Or => OperatorKind::Or,
        BinaryOp::Xor => OperatorKind::Xor,
        BinaryOp::Eq => OperatorKind::Eq,
        BinaryOp::Ne => OperatorKind::Ne,
        BinaryOp::Lt => OperatorKind::Lt,
        BinaryOp::Gt => OperatorKind::Gt,
        BinaryOp::Le => OperatorKind::Le,
        BinaryOp::Ge => OperatorKind::Ge,
    })
}

fn find_property(class: &Rc<RefCell<ClassInfo>>, name: &str) -> Option<PropertyInfo> {
    let key = name.to_lowercase();
    let mut current = Some(Rc::clone(class));
    while let Some(c) = current {
        if let Some(p) = c.borrow().properties.get(&key) {
            return Some(p.clone());
        }
        current = c.borrow().parent.clone();
    }
    None
}

fn find_default_property(class: &Rc<RefCell<ClassInfo>>) -> Option<PropertyInfo> {
    let mut current = Some(Rc::clone(class));
    while let Some(c) = current {
        if let Some(p) = c.borrow().properties.values().find(|p| p.is_default) {
            return Some(p.clone());
        }
        current = c.borrow().parent.clone();
    }
    None
}

fn find_operator(class: &Rc<RefCell<ClassInfo>>, kind: OperatorKind) -> Option<OperatorEntry> {
    let mut current = Some(Rc::clone(class));
    while let Some(c) = current {
        if let Some(e) = c.borrow().operators.get(&kind) {
            return Some(OperatorEntry {
                decl: Rc::clone(&e.decl),
                owner_class: e.owner_class.clone(),
            });
        }
        current = c.borrow().parent.clone();
    }
    None
}

fn property_info(p: &crate::ast::PropertyDecl) -> PropertyInfo {
    PropertyInfo {
        name: p.name.clone(),
        type_expr: p.type_expr.clone(),
        index_param: p.index_param.clone(),
        getter: p.getter.clone(),
        setter: p.setter.clone(),
        is_default: p.is_default,
    }
}

/// The registry key a value's runtime type is filed under for helper
/// resolution (§4.E/§9): primitive type-name keywords for scalars, the
/// record/class's own declared name otherwise.
fn helper_type_key(value: &Value) -> String {
    match value {
        Value::Integer(_) | Value::Subrange { .. } => "integer".to_string(),
        Value::Float(_) => "float".to_string(),
        Value::Str(_) => "string".to_string(),
        Value::Boolean(_) => "boolean".to_string(),
        Value::Variant(_) => "variant".to_string(),
        Value::Array(a) => a.borrow().descriptor.element.to_string(),
        Value::Record(r) => r.descriptor.name.clone(),
        Value::Object(o) => o.borrow().class.borrow().name.clone(),
        Value::Enum(e) => e.enum_type.name.clone(),
        _ => String::new(),
    }
}

/// `Low(arr)`/array `.Low` (§4.H): a static array's declared lower bound;
/// a dynamic array is always 0-based.
pub(crate) fn array_low(data: &crate::value::ArrayData) -> i64 {
    data.descriptor.bounds.map(|(lo, _)| lo).unwrap_or(0)
}

/// `High(arr)`/array `.High` (§4.H): a static array's declared upper
/// bound; a dynamic array's upper bound is `Length - 1`.
pub(crate) fn array_high(data: &crate::value::ArrayData) -> i64 {
    match data.descriptor.bounds {
        Some((_, hi)) => hi,
        None => data.elements.len() as i64 - 1,
    }
}
