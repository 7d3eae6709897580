use ahash::AHashMap;
use indexmap::IndexMap;

use crate::ast::{FieldDecl, OperatorKind};
use crate::types::method::{OperatorEntry, OverloadSet, PropertyInfo};
use crate::value::Value;

/// `RecordInfo` descriptor (§3.2). Records have value semantics, so unlike
/// `ClassInfo` there is no parent chain to walk for method lookup.
#[derive(Debug)]
pub struct RecordInfo {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: IndexMap<String, OverloadSet>,
    pub properties: IndexMap<String, PropertyInfo>,
    pub consts: AHashMap<String, Value>,
    pub class_vars: std::cell::RefCell<AHashMap<String, Value>>,
    pub operators: AHashMap<OperatorKind, OperatorEntry>,
}
