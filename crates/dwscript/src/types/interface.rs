use crate::ast::MethodSignature;

/// `InterfaceInfo` descriptor (§3.2).
#[derive(Debug)]
pub struct InterfaceInfo {
    pub name: String,
    pub parent: Option<String>,
    pub methods: Vec<MethodSignature>,
}
