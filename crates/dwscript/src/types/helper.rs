use ahash::AHashMap;
use indexmap::IndexMap;

use crate::types::method::{OverloadSet, PropertyInfo};
use crate::value::Value;

/// A `helper(TParent) for T` declaration (§3.2's helper extension, §9).
/// Helpers are not stored on `ClassInfo`/`RecordInfo` — a helper can
/// retrofit a primitive type that has no descriptor at all — so the
/// registry keeps them in their own table, keyed by the normalized name of
/// the type they extend, with multiple helpers for one type stacking in
/// declaration order (§4.E, §9).
#[derive(Debug)]
pub struct HelperInfo {
    pub name: String,
    pub target: String,
    pub parent_helper: Option<String>,
    pub methods: IndexMap<String, OverloadSet>,
    pub properties: IndexMap<String, PropertyInfo>,
    pub consts: AHashMap<String, Value>,
    pub class_vars: std::cell::RefCell<AHashMap<String, Value>>,
}
