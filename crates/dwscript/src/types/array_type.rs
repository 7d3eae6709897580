use crate::ast::TypeExpr;

/// `ArrayType` descriptor (§3.2): static arrays carry inclusive bounds,
/// dynamic arrays do not.
#[derive(Debug)]
pub struct ArrayType {
    pub element: TypeExpr,
    pub bounds: Option<(i64, i64)>,
}

impl ArrayType {
    pub fn is_dynamic(&self) -> bool {
        self.bounds.is_none()
    }
}

/// `SubrangeType` descriptor (§3.2): an integer base restricted to `[lo, hi]`.
#[derive(Debug)]
pub struct SubrangeType {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
}

impl SubrangeType {
    pub fn contains(&self, n: i64) -> bool {
        n >= self.lo && n <= self.hi
    }
}

/// `FunctionPointerType` descriptor (§3.2).
#[derive(Debug)]
pub struct FunctionPointerType {
    pub params: Vec<TypeExpr>,
    pub return_type: Option<Box<TypeExpr>>,
    pub is_method: bool,
}
