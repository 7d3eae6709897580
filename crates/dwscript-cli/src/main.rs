use std::process::ExitCode;
use std::time::Instant;

use dwscript::ast::{Decl, Expr, FunctionDecl, Param, Position, Program, Stmt, TypeExpr};
use dwscript::{EvalResult, Evaluator, EvaluatorConfig, Value};

/// This crate ships no lexer or parser; front-end concerns are out of this
/// interpreter's scope. What follows builds one small [`Program`] by hand to
/// exercise the embedding surface end to end, the way a host application
/// would after its own parser had produced an AST.
fn demo_program() -> Program {
    let pos = Position::new(1, 1);
    let main_body = vec![
        Stmt::Expr(Expr::Call {
            callee: Box::new(Expr::Ident("PrintLn".into(), pos)),
            args: vec![Expr::StringLit("Hello from the embedded interpreter".into(), pos)],
            pos,
        }),
        Stmt::Expr(Expr::Call {
            callee: Box::new(Expr::Ident("PrintLn".into(), pos)),
            args: vec![Expr::Call {
                callee: Box::new(Expr::Ident("IntToStr".into(), pos)),
                args: vec![Expr::Call {
                    callee: Box::new(Expr::Ident("Factorial".into(), pos)),
                    args: vec![Expr::IntLit(10, pos)],
                    pos,
                }],
                pos,
            }],
            pos,
        }),
    ];

    Program {
        uses: Vec::new(),
        decls: vec![Decl::Function(FunctionDecl {
            name: "Main".into(),
            params: Vec::<Param>::new(),
            return_type: None::<TypeExpr>,
            body: main_body,
            requires: Vec::new(),
            ensures: Vec::new(),
            pos,
        })],
        init_section: Some(vec![Stmt::Expr(Expr::Call {
            callee: Box::new(Expr::Ident("Main".into(), pos)),
            args: Vec::new(),
            pos,
        })]),
        final_section: None,
    }
}

fn run(program: &Program) -> EvalResult<Value> {
    let evaluator = Evaluator::with_config(std::io::stdout(), EvaluatorConfig::new().recursion_limit(4096));
    evaluator.eval(program)
}

fn main() -> ExitCode {
    let program = demo_program();
    let start = Instant::now();
    match run(&program) {
        Ok(_) => {
            eprintln!("success after: {:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error after: {:?}\n{err}", start.elapsed());
            ExitCode::FAILURE
        }
    }
}
