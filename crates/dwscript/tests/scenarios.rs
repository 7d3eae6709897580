//! End-to-end scenarios, built by hand since this crate takes an
//! already-parsed AST rather than owning a lexer/parser. Each test plays
//! the role a front end would: constructs a small `ast::Program` and
//! hands it to an `Evaluator`.

use std::cell::RefCell;
use std::rc::Rc;

use dwscript::ast::{
    BinaryOp, ClassDecl, ClassFlags, Decl, EnumDecl, Expr, FunctionDecl, MethodDecl, MethodFlags, MethodKind, Param,
    Position, Program, Stmt, TypeExpr, VarDecl,
};
use dwscript::eval::OutputWriter;
use dwscript::{Evaluator, EvaluatorConfig, Unwind, Value};

fn pos() -> Position {
    Position::new(1, 1)
}

fn ident(name: &str) -> Expr {
    Expr::Ident(name.to_string(), pos())
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call { callee: Box::new(ident(name)), args, pos: pos() }
}

fn int(n: i64) -> Expr {
    Expr::IntLit(n, pos())
}

#[derive(Clone, Default)]
struct SharedWriter(Rc<RefCell<String>>);

impl OutputWriter for SharedWriter {
    fn write_str(&mut self, s: &str) {
        self.0.borrow_mut().push_str(s);
    }
}

fn run(program: &Program) -> (Result<Value, Unwind>, String) {
    run_with_config(program, EvaluatorConfig::new())
}

fn run_with_config(program: &Program, config: EvaluatorConfig) -> (Result<Value, Unwind>, String) {
    let buf = Rc::new(RefCell::new(String::new()));
    let writer = SharedWriter(Rc::clone(&buf));
    let evaluator = Evaluator::with_config(writer, config);
    let result = evaluator.eval(program);
    let output = buf.borrow().clone();
    (result, output)
}

fn simple_param(name: &str) -> Param {
    Param { name: name.to_string(), type_expr: Some(TypeExpr::Named("Integer".into())), by_ref: false, lazy: false, default: None }
}

/// Scenario 1: `PrintLn(Factorial(5)); PrintLn(Factorial(20));` and the
/// out-of-range errors at -1 and 21.
#[test]
fn factorial_builtin() {
    let program = Program {
        uses: Vec::new(),
        decls: Vec::new(),
        init_section: Some(vec![
            Stmt::Expr(call("PrintLn", vec![call("Factorial", vec![int(5)])])),
            Stmt::Expr(call("PrintLn", vec![call("Factorial", vec![int(20)])])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "120\n2432902008176640000\n");

    for bad in [-1, 21] {
        let program = Program {
            uses: Vec::new(),
            decls: Vec::new(),
            init_section: Some(vec![Stmt::Expr(call("Factorial", vec![int(bad)]))]),
            final_section: None,
        };
        let (result, _) = run(&program);
        assert!(result.is_err(), "Factorial({bad}) should be a runtime error");
    }
}

/// Scenario 2: `for var c in TColor do PrintLn(c);` sweeps ordinals
/// 0..2 for a plain enum, and sweeps the full declared range (gaps
/// included) for an enum with explicit, non-contiguous starting ordinals.
#[test]
fn enum_for_in_sweep() {
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Enum(EnumDecl {
            name: "TColor".into(),
            values: vec![("Red".into(), None), ("Green".into(), None), ("Blue".into(), None)],
            pos: pos(),
        })],
        init_section: Some(vec![Stmt::ForIn {
            var: "c".into(),
            iterable: ident("TColor"),
            body: vec![Stmt::Expr(call("PrintLn", vec![call("Ord", vec![ident("c")])]))],
            pos: pos(),
        }]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "0\n1\n2\n");

    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Enum(EnumDecl {
            name: "TRange".into(),
            values: vec![("Low".into(), Some(2)), ("High".into(), Some(10))],
            pos: pos(),
        })],
        init_section: Some(vec![Stmt::ForIn {
            var: "e".into(),
            iterable: ident("TRange"),
            body: vec![Stmt::Expr(call("PrintLn", vec![call("Ord", vec![ident("e")])]))],
            pos: pos(),
        }]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "2\n3\n4\n5\n6\n7\n8\n9\n10\n");
}

/// Scenario 3: a Jensen's-device style lazy parameter re-evaluates its
/// actual expression on every read inside the callee.
#[test]
fn jensens_device_lazy_param() {
    let sum_body = vec![
        Stmt::Assign { target: ident("Result"), value: int(0), pos: pos() },
        Stmt::Assign { target: ident("globalI"), value: ident("lo"), pos: pos() },
        Stmt::While {
            cond: Expr::Binary { op: BinaryOp::Le, left: Box::new(ident("globalI")), right: Box::new(ident("hi")), pos: pos() },
            body: vec![
                Stmt::Assign {
                    target: ident("Result"),
                    value: Expr::Binary { op: BinaryOp::Add, left: Box::new(ident("Result")), right: Box::new(ident("term")), pos: pos() },
                    pos: pos(),
                },
                Stmt::Assign {
                    target: ident("globalI"),
                    value: Expr::Binary { op: BinaryOp::Add, left: Box::new(ident("globalI")), right: Box::new(int(1)), pos: pos() },
                    pos: pos(),
                },
            ],
            pos: pos(),
        },
    ];
    let program = Program {
        uses: Vec::new(),
        decls: vec![
            Decl::Var(VarDecl { name: "globalI".into(), type_expr: Some(TypeExpr::Named("Integer".into())), initializer: Some(int(0)), pos: pos() }),
            Decl::Function(FunctionDecl {
                name: "sum".into(),
                params: vec![
                    simple_param("lo"),
                    simple_param("hi"),
                    Param { name: "term".into(), type_expr: Some(TypeExpr::Named("Integer".into())), by_ref: false, lazy: true, default: None },
                ],
                return_type: Some(TypeExpr::Named("Integer".into())),
                body: sum_body,
                requires: Vec::new(),
                ensures: Vec::new(),
                pos: pos(),
            }),
        ],
        init_section: Some(vec![Stmt::Expr(call(
            "PrintLn",
            vec![call(
                "sum",
                vec![int(1), int(4), Expr::Binary { op: BinaryOp::Mul, left: Box::new(ident("globalI")), right: Box::new(ident("globalI")), pos: pos() }],
            )],
        ))]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "30\n");
}

/// Scenario 4: virtual dispatch picks the dynamic type's override.
#[test]
fn virtual_dispatch_override() {
    let compute_param = || vec![simple_param("a")];
    let base = ClassDecl {
        name: "TBase".into(),
        parent: None,
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        methods: vec![MethodDecl {
            name: "Compute".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: true, is_override: false, is_abstract: false },
            params: compute_param(),
            return_type: Some(TypeExpr::Named("Integer".into())),
            body: vec![Stmt::Assign {
                target: ident("Result"),
                value: Expr::Binary { op: BinaryOp::Mul, left: Box::new(ident("a")), right: Box::new(int(2)), pos: pos() },
                pos: pos(),
            }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let child = ClassDecl {
        name: "TChild".into(),
        parent: Some("TBase".into()),
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        methods: vec![MethodDecl {
            name: "Compute".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: false, is_override: true, is_abstract: false },
            params: compute_param(),
            return_type: Some(TypeExpr::Named("Integer".into())),
            body: vec![Stmt::Assign {
                target: ident("Result"),
                value: Expr::Binary { op: BinaryOp::Mul, left: Box::new(ident("a")), right: Box::new(int(3)), pos: pos() },
                pos: pos(),
            }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Class(base), Decl::Class(child)],
        init_section: Some(vec![
            Stmt::VarDecl(VarDecl { name: "b".into(), type_expr: Some(TypeExpr::Named("TBase".into())), initializer: Some(Expr::New { class_name: "TChild".into(), args: Vec::new(), pos: pos() }), pos: pos() }),
            Stmt::Expr(call("PrintLn", vec![Expr::MethodCall { receiver: Box::new(ident("b")), method: "Compute".into(), args: vec![int(5)], pos: pos() }])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "15\n");
}

/// `inherited` resolves against the statically-declared owner of the
/// currently-executing method, not the receiver's dynamic class, so an
/// override can call its parent's implementation without recursing into
/// itself.
#[test]
fn inherited_calls_parent_implementation() {
    let base = ClassDecl {
        name: "TBase".into(),
        parent: None,
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        methods: vec![MethodDecl {
            name: "Greet".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: true, is_override: false, is_abstract: false },
            params: Vec::new(),
            return_type: Some(TypeExpr::Named("String".into())),
            body: vec![Stmt::Assign { target: ident("Result"), value: Expr::StringLit("base".into(), pos()), pos: pos() }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let child = ClassDecl {
        name: "TChild".into(),
        parent: Some("TBase".into()),
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        methods: vec![MethodDecl {
            name: "Greet".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: false, is_override: true, is_abstract: false },
            params: Vec::new(),
            return_type: Some(TypeExpr::Named("String".into())),
            body: vec![Stmt::Assign {
                target: ident("Result"),
                value: Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(Expr::Inherited { method: None, args: None, pos: pos() }),
                    right: Box::new(Expr::StringLit("+child".into(), pos())),
                    pos: pos(),
                },
                pos: pos(),
            }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Class(base), Decl::Class(child)],
        init_section: Some(vec![
            Stmt::VarDecl(VarDecl { name: "c".into(), type_expr: Some(TypeExpr::Named("TChild".into())), initializer: Some(Expr::New { class_name: "TChild".into(), args: Vec::new(), pos: pos() }), pos: pos() }),
            Stmt::Expr(call("PrintLn", vec![Expr::MethodCall { receiver: Box::new(ident("c")), method: "Greet".into(), args: Vec::new(), pos: pos() }])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "base+child\n");
}

/// Scenario 5: a failing pre-condition raises a catchable exception whose
/// message starts with the cleaned `Pre-condition failed in ...` text.
#[test]
fn contract_precondition_failure_message() {
    let inv = FunctionDecl {
        name: "Inv".into(),
        params: vec![simple_param("x")],
        return_type: None,
        body: Vec::new(),
        requires: vec![Expr::Binary { op: BinaryOp::Gt, left: Box::new(ident("x")), right: Box::new(int(0)), pos: pos() }],
        ensures: Vec::new(),
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Function(inv)],
        init_section: Some(vec![Stmt::Try {
            body: vec![Stmt::Expr(call("Inv", vec![int(0)]))],
            handlers: vec![dwscript::ast::ExceptHandler {
                var: Some("E".into()),
                type_name: "Exception".into(),
                body: vec![Stmt::Expr(call("PrintLn", vec![Expr::Member { receiver: Box::new(ident("E")), name: "Message".into(), pos: pos() }]))],
            }],
            has_bare_except: None,
            finally: None,
            pos: pos(),
        }]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert!(output.starts_with("Pre-condition failed in Inv"), "unexpected message: {output}");
    assert!(output.contains("x > 0") || output.contains("x>0"), "message should quote the cleaned condition: {output}");
}

/// Scenario 6: unconditional recursion trips the recursion budget with a
/// catchable `EScriptStackOverflow`.
#[test]
fn recursion_overflow_is_catchable() {
    let loop_fn = FunctionDecl {
        name: "Loop".into(),
        params: Vec::new(),
        return_type: None,
        body: vec![Stmt::Expr(call("Loop", Vec::new()))],
        requires: Vec::new(),
        ensures: Vec::new(),
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Function(loop_fn)],
        init_section: Some(vec![Stmt::Try {
            body: vec![Stmt::Expr(call("Loop", Vec::new()))],
            handlers: vec![dwscript::ast::ExceptHandler {
                var: Some("E".into()),
                type_name: "EScriptStackOverflow".into(),
                body: vec![Stmt::Expr(call("PrintLn", vec![Expr::BoolLit(true, pos())]))],
            }],
            has_bare_except: None,
            finally: None,
            pos: pos(),
        }]),
        final_section: None,
    };
    let (result, output) = run_with_config(&program, EvaluatorConfig::new().recursion_limit(1024));
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "True\n");
}

/// A few of §8's universal built-in invariants, exercised directly.
#[test]
fn builtin_round_trips() {
    let program = Program {
        uses: Vec::new(),
        decls: Vec::new(),
        init_section: Some(vec![Stmt::Expr(call(
            "PrintLn",
            vec![call("StrToInt", vec![call("IntToStr", vec![int(42)])])],
        ))]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "42\n");
}

/// §4.D: the function's own name is an alternate lvalue onto the return
/// slot, not just `Result`.
#[test]
fn function_name_return_alias() {
    let double_it = FunctionDecl {
        name: "DoubleIt".into(),
        params: vec![simple_param("a")],
        return_type: Some(TypeExpr::Named("Integer".into())),
        body: vec![Stmt::Assign {
            target: ident("DoubleIt"),
            value: Expr::Binary { op: BinaryOp::Mul, left: Box::new(ident("a")), right: Box::new(int(2)), pos: pos() },
            pos: pos(),
        }],
        requires: Vec::new(),
        ensures: Vec::new(),
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Function(double_it)],
        init_section: Some(vec![Stmt::Expr(call("PrintLn", vec![call("DoubleIt", vec![int(21)])]))]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "42\n");
}

/// DWScript's `Round` is banker's rounding, not round-half-away-from-zero.
#[test]
fn round_is_banker_rounding() {
    let program = Program {
        uses: Vec::new(),
        decls: Vec::new(),
        init_section: Some(vec![
            Stmt::Expr(call("PrintLn", vec![call("Round", vec![Expr::FloatLit(2.5, pos())])])),
            Stmt::Expr(call("PrintLn", vec![call("Round", vec![Expr::FloatLit(0.5, pos())])])),
            Stmt::Expr(call("PrintLn", vec![call("Round", vec![Expr::FloatLit(3.5, pos())])])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "2\n0\n4\n");
}

/// A non-virtual method runs the body declared on the receiver's static
/// (declared) type, even when the variable holds a more-derived instance.
#[test]
fn non_virtual_method_binds_to_static_type() {
    let base = ClassDecl {
        name: "TBase".into(),
        parent: None,
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        methods: vec![MethodDecl {
            name: "Tag".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: false, is_override: false, is_abstract: false },
            params: Vec::new(),
            return_type: Some(TypeExpr::Named("String".into())),
            body: vec![Stmt::Assign { target: ident("Result"), value: Expr::StringLit("base".into(), pos()), pos: pos() }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let child = ClassDecl {
        name: "TChild".into(),
        parent: Some("TBase".into()),
        interfaces: Vec::new(),
        flags: ClassFlags::default(),
        fields: Vec::new(),
        // Hides (does not override) TBase's non-virtual `Tag` with an
        // unrelated non-virtual method of the same name.
        methods: vec![MethodDecl {
            name: "Tag".into(),
            kind: MethodKind::Instance,
            flags: MethodFlags { is_virtual: false, is_override: false, is_abstract: false },
            params: Vec::new(),
            return_type: Some(TypeExpr::Named("String".into())),
            body: vec![Stmt::Assign { target: ident("Result"), value: Expr::StringLit("child".into(), pos()), pos: pos() }],
            requires: Vec::new(),
            ensures: Vec::new(),
            pos: pos(),
        }],
        properties: Vec::new(),
        consts: Vec::new(),
        class_vars: Vec::new(),
        operators: Vec::new(),
        default_constructor: None,
        pos: pos(),
    };
    let program = Program {
        uses: Vec::new(),
        decls: vec![Decl::Class(base), Decl::Class(child)],
        init_section: Some(vec![
            Stmt::VarDecl(VarDecl {
                name: "b".into(),
                type_expr: Some(TypeExpr::Named("TBase".into())),
                initializer: Some(Expr::New { class_name: "TChild".into(), args: Vec::new(), pos: pos() }),
                pos: pos(),
            }),
            Stmt::Expr(call("PrintLn", vec![Expr::MethodCall { receiver: Box::new(ident("b")), method: "Tag".into(), args: Vec::new(), pos: pos() }])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "base\n");
}

#[test]
fn dynamic_array_add_and_delete() {
    let arr_decl = Stmt::VarDecl(VarDecl {
        name: "xs".into(),
        type_expr: Some(TypeExpr::Array { element: Box::new(TypeExpr::Named("Integer".into())), bounds: None }),
        initializer: Some(Expr::ArrayLiteral { elements: vec![int(1), int(2), int(3)], pos: pos() }),
        pos: pos(),
    });
    let program = Program {
        uses: Vec::new(),
        decls: Vec::new(),
        init_section: Some(vec![
            arr_decl,
            Stmt::Expr(call("Add", vec![ident("xs"), int(4)])),
            Stmt::Expr(call("Delete", vec![ident("xs"), int(0), int(1)])),
            Stmt::Expr(call("PrintLn", vec![call("Join", vec![ident("xs"), Expr::StringLit(",".into(), pos())])])),
        ]),
        final_section: None,
    };
    let (result, output) = run(&program);
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(output, "2,3,4\n");
}
