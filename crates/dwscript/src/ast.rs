//! The AST contract this crate consumes.
//!
//! The lexer, parser, and semantic analyzer are external collaborators: this
//! module only defines the closed set of node shapes a front end must
//! produce. Every node carries a [`Position`] and, where a runtime message
//! needs to quote source text back to the user (contract failures), a
//! rendered [`Expr::text`].

use std::fmt;

/// A source location, `(line, column)`, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line: {}, column: {}", self.line, self.column)
    }
}

/// A whole compilation unit handed to the evaluator: top-level declarations
/// plus the optional `initialization`/`finalization` blocks.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub uses: Vec<String>,
    pub decls: Vec<Decl>,
    pub init_section: Option<Block>,
    pub final_section: Option<Block>,
}

pub type Block = Vec<Stmt>;

/// Top-level and nested declarations.
#[derive(Debug, Clone)]
pub enum Decl {
    Var(VarDecl),
    Const(ConstDecl),
    Alias(AliasDecl),
    Record(RecordDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    Subrange(SubrangeDecl),
    ArrayType(ArrayTypeDecl),
    Function(FunctionDecl),
    Helper(HelperDecl),
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub type_expr: Option<TypeExpr>,
    pub initializer: Option<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub type_expr: Option<TypeExpr>,
    pub value: Expr,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: String,
    pub target: TypeExpr,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_expr: TypeExpr,
    pub initializer: Option<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub consts: Vec<ConstDecl>,
    pub class_vars: Vec<VarDecl>,
    pub operators: Vec<OperatorDecl>,
    pub pos: Position,
}

#[derive(Debug, Clone, Default)]
pub struct ClassFlags {
    pub is_abstract: bool,
    pub is_external: bool,
    pub is_sealed: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub flags: ClassFlags,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub consts: Vec<ConstDecl>,
    pub class_vars: Vec<VarDecl>,
    pub operators: Vec<OperatorDecl>,
    /// Name of the constructor used for the parameterless `new ClassName`
    /// sugar; defaults to `"Create"` when absent.
    pub default_constructor: Option<String>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub parent: Option<String>,
    pub methods: Vec<MethodSignature>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    /// Declared `(name, explicit ordinal)` pairs in source order. When no
    /// ordinal is given the value is one more than the previous entry's
    /// (or zero for the first).
    pub values: Vec<(String, Option<i64>)>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct SubrangeDecl {
    pub name: String,
    pub lo: i64,
    pub hi: i64,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct ArrayTypeDecl {
    pub name: String,
    pub element: TypeExpr,
    /// `Some((lo, hi))` for a static array, `None` for dynamic.
    pub bounds: Option<(i64, i64)>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Constructor,
    Destructor,
    Instance,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodFlags {
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub kind: MethodKind,
    pub flags: MethodFlags,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub requires: Vec<Expr>,
    pub ensures: Vec<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub requires: Vec<Expr>,
    pub ensures: Vec<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub type_expr: TypeExpr,
    pub index_param: Option<Param>,
    /// Identifier naming either a field (read directly) or a zero/one-arg
    /// method (called) that backs the getter.
    pub getter: Option<String>,
    /// Identifier naming either a field (written directly) or a one-arg
    /// method (called with the rvalue) that backs the setter.
    pub setter: Option<String>,
    pub is_default: bool,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Modulo,
    And,
    Or,
    Xor,
    Index,
    Implicit,
}

#[derive(Debug, Clone)]
pub struct OperatorDecl {
    pub op: OperatorKind,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct HelperDecl {
    pub name: String,
    /// The type name being retrofitted (primitive, record, or class name).
    pub target: String,
    pub parent_helper: Option<String>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub consts: Vec<ConstDecl>,
    pub class_vars: Vec<VarDecl>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_expr: Option<TypeExpr>,
    pub by_ref: bool,
    pub lazy: bool,
    pub default: Option<Expr>,
}

/// A parsed (but unresolved) type reference; the Type System Registry
/// resolves these against its descriptors (§4.C name-resolution order).
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(String),
    Array {
        element: Box<TypeExpr>,
        bounds: Option<(i64, i64)>,
    },
    FunctionPointer {
        params: Vec<TypeExpr>,
        return_type: Option<Box<TypeExpr>>,
    },
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Array { element, bounds } => match bounds {
                Some((lo, hi)) => write!(f, "array[{lo}..{hi}] of {element}"),
                None => write!(f, "array of {element}"),
            },
            TypeExpr::FunctionPointer { params, return_type } => {
                write!(f, "function(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")?;
                if let Some(rt) = return_type {
                    write!(f, ": {rt}")?;
                }
                Ok(())
            }
        }
    }
}

/// Statements. Every variant that can fail carries its own [`Position`]
/// (rather than wrapping every `Stmt` uniformly) so the evaluator can report
/// the most specific location available, matching the AST contract's
/// "every node carries a position" rule at the statement granularity that
/// actually needs one.
#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    VarDecl(VarDecl),
    Assign {
        target: Expr,
        value: Expr,
        pos: Position,
    },
    Block(Block),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
        pos: Position,
    },
    While {
        cond: Expr,
        body: Block,
        pos: Position,
    },
    Repeat {
        body: Block,
        cond: Expr,
        pos: Position,
    },
    For {
        var: String,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        down: bool,
        body: Block,
        pos: Position,
    },
    ForIn {
        var: String,
        iterable: Expr,
        body: Block,
        pos: Position,
    },
    Case {
        subject: Expr,
        arms: Vec<CaseArm>,
        else_branch: Option<Block>,
        pos: Position,
    },
    Try {
        body: Block,
        handlers: Vec<ExceptHandler>,
        has_bare_except: Option<Block>,
        finally: Option<Block>,
        pos: Position,
    },
    Raise {
        value: Option<Expr>,
        pos: Position,
    },
    Break(Position),
    Continue(Position),
    Exit(Position),
}

#[derive(Debug, Clone)]
pub struct CaseArm {
    pub matches: Vec<CaseMatch>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum CaseMatch {
    Value(Expr),
    Range(Expr, Expr),
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub var: Option<String>,
    pub type_name: String,
    pub body: Block,
}

/// Expressions. `text` is the original-source rendering used verbatim for
/// contract-failure message cleanup (§9); AST constructors built outside a
/// real parser should still populate it with a reasonable rendering of the
/// expression so `clean_contract_text` has something to clean.
#[derive(Debug, Clone)]
pub enum Expr {
    IntLit(i64, Position),
    FloatLit(f64, Position),
    StringLit(String, Position),
    BoolLit(bool, Position),
    NilLit(Position),
    Ident(String, Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Position,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Position,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        pos: Position,
    },
    Member {
        receiver: Box<Expr>,
        name: String,
        pos: Position,
    },
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
        pos: Position,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        pos: Position,
    },
    RecordLiteral {
        type_name: Option<String>,
        fields: Vec<(String, Expr)>,
        pos: Position,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        pos: Position,
    },
    Range {
        lo: Box<Expr>,
        hi: Box<Expr>,
        pos: Position,
    },
    OldRef {
        ident: String,
        pos: Position,
    },
    Cast {
        type_expr: TypeExpr,
        expr: Box<Expr>,
        pos: Position,
    },
    /// `inherited` / `inherited Name(args)` (§4.E). `method: None` means
    /// the bare form — same name as the enclosing method, `args: None`
    /// forwards the enclosing method's own parameters unchanged.
    Inherited {
        method: Option<String>,
        args: Option<Vec<Expr>>,
        pos: Position,
    },
    /// Pre-rendered source text for this node, used only by
    /// `clean_contract_text`/`Display` when a caller wants an exact literal
    /// rendering rather than the structural re-print `Display` produces.
    Text(String, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Modulo,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Modulo => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }
}

impl Expr {
    pub fn pos(&self) -> Position {
        match self {
            Expr::IntLit(_, p)
            | Expr::FloatLit(_, p)
            | Expr::StringLit(_, p)
            | Expr::BoolLit(_, p)
            | Expr::NilLit(p)
            | Expr::Ident(_, p)
            | Expr::Unary { pos: p, .. }
            | Expr::Binary { pos: p, .. }
            | Expr::Call { pos: p, .. }
            | Expr::MethodCall { pos: p, .. }
            | Expr::Member { pos: p, .. }
            | Expr::Index { pos: p, .. }
            | Expr::New { pos: p, .. }
            | Expr::RecordLiteral { pos: p, .. }
            | Expr::ArrayLiteral { pos: p, .. }
            | Expr::Range { pos: p, .. }
            | Expr::OldRef { pos: p, .. }
            | Expr::Cast { pos: p, .. }
            | Expr::Inherited { pos: p, .. } => *p,
            Expr::Text(_, inner) => inner.pos(),
        }
    }

    /// The source-text rendering used by contract message cleanup. Falls
    /// back to a structural re-print (`Display`) when no literal `Text`
    /// wrapper was supplied by the front end.
    pub fn rendered_text(&self) -> String {
        match self {
            Expr::Text(text, _) => text.clone(),
            other => format!("{other}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLit(n, _) => write!(f, "{n}"),
            Expr::FloatLit(n, _) => write!(f, "{n}"),
            Expr::StringLit(s, _) => write!(f, "'{s}'"),
            Expr::BoolLit(b, _) => write!(f, "{}", if *b { "True" } else { "False" }),
            Expr::NilLit(_) => write!(f, "nil"),
            Expr::Ident(name, _) => write!(f, "{name}"),
            Expr::Unary { op, operand, .. } => {
                let sym = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "not ",
                };
                write!(f, "{sym}{operand}")
            }
            Expr::Binary { op, left, right, .. } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expr::Call { callee, args, .. } => {
                write!(f, "{callee}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::MethodCall { receiver, method, args, .. } => {
                write!(f, "{receiver}.{method}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::Member { receiver, name, .. } => write!(f, "{receiver}.{name}"),
            Expr::Index { receiver, index, .. } => write!(f, "{receiver}[{index}]"),
            Expr::New { class_name, args, .. } => {
                write!(f, "{class_name}.Create(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::RecordLiteral { type_name, fields, .. } => {
                if let Some(name) = type_name {
                    write!(f, "{name}")?;
                }
                write!(f, "(")?;
                for (i, (name, expr)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name}: {expr}")?;
                }
                write!(f, ")")
            }
            Expr::ArrayLiteral { elements, .. } => {
                write!(f, "[")?;
                write_args(f, elements)?;
                write!(f, "]")
            }
            Expr::Range { lo, hi, .. } => write!(f, "{lo}..{hi}"),
            Expr::OldRef { ident, .. } => write!(f, "old({ident})"),
            Expr::Cast { type_expr, expr, .. } => write!(f, "{type_expr}({expr})"),
            Expr::Inherited { method, args, .. } => {
                write!(f, "inherited")?;
                if let Some(name) = method {
                    write!(f, " {name}")?;
                }
                if let Some(args) = args {
                    write!(f, "(")?;
                    write_args(f, args)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
            Expr::Text(text, _) => write!(f, "{text}"),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}")?;
    }
    Ok(())
}
