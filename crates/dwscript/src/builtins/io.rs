//! Console output built-ins (§4.H): `Print` writes as-is, `PrintLn`
//! appends a trailing newline. Both route through the Evaluator's
//! [`crate::eval::OutputWriter`] so a host embedding the interpreter can
//! capture output instead of letting it hit stdout.

use crate::ast::Position;
use crate::errors::EvalResult;
use crate::eval::Evaluator;
use crate::value::Value;

use super::Builtin;

pub(crate) fn dispatch(ev: &Evaluator, b: Builtin, args: &[Value], _pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    let text = args.first().map(Value::display_string).unwrap_or_default();
    match b {
        Print => ev.print(&text),
        PrintLn => {
            ev.print(&text);
            ev.print("\n");
        }
        _ => unreachable!("io::dispatch called with a non-IO builtin"),
    }
    Ok(Value::Nil)
}
