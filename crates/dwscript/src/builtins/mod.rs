//! The Built-in Library (component H, §4.H): the closed set of RTL-style
//! function names the Evaluator recognizes when a bare-identifier `Call`
//! doesn't resolve to a user-defined function (§4.D "built-ins are checked
//! only after the Environment").
//!
//! One `Builtin` enum carries every recognized name (`strum`-derived,
//! case-insensitive, the same shape the teacher uses for its own
//! dispatch-by-name enum in `os.rs`); dispatch itself is split one
//! submodule per family, mirroring how `eval/` splits the rest of the
//! Evaluator by concern.

mod arrays;
mod datetime;
mod io;
mod math;
mod ordinal;
mod strings;
mod variant;

use crate::ast::{Expr, Position};
use crate::env::Environment;
use crate::errors::EvalResult;
use crate::eval::Evaluator;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
#[strum(ascii_case_insensitive)]
pub enum Builtin {
    // ---- math/ordinal (§4.H) ----
    Abs,
    Min,
    Max,
    Sqr,
    Sqrt,
    Power,
    Exp,
    Ln,
    Log2,
    Log10,
    LogN,
    Pi,
    Infinity,
    NaN,
    IsNaN,
    IsFinite,
    IsInfinite,
    Sign,
    Odd,
    Random,
    RandomInt,
    Randomize,
    SetRandSeed,
    RandSeed,
    RandG,
    Unsigned32,
    MaxInt,
    MinInt,
    Sin,
    Cos,
    Tan,
    Round,
    Factorial,
    Gcd,
    Lcm,
    IsPrime,
    LeastFactor,
    PopCount,
    TestBit,
    Haversine,
    CompareNum,
    Inc,
    Dec,
    Succ,
    Pred,
    Ord,
    Assert,

    // ---- strings (§4.H, supplemented per SPEC_FULL.md §H) ----
    Length,
    SetLength,
    IntToStr,
    FloatToStr,
    StrToInt,
    StrToFloat,
    StrToIntDef,
    StrToFloatDef,
    HexToInt,
    BinToInt,
    Copy,
    Pos,
    UpperCase,
    LowerCase,
    Trim,

    // ---- arrays (§4.H) ----
    Low,
    High,
    Add,
    Delete,
    Join,

    // ---- variant (§4.H) ----
    VarType,
    VarIsNull,
    VarIsEmpty,
    VarIsNumeric,
    VarToStr,
    VarToInt,
    VarToFloat,
    VarAsType,
    VarClear,
    VarToIntDef,
    VarToFloatDef,

    // ---- date/time (§4.H) ----
    Now,
    Date,
    Time,
    UTCDateTime,
    YearOf,
    MonthOf,
    DayOf,
    HourOf,
    MinuteOf,
    SecondOf,
    DayOfWeek,
    DayOfTheWeek,
    DayOfYear,
    WeekNumber,
    YearOfWeek,
    IsLeapYear,
    FirstDayOfYear,
    FirstDayOfMonth,
    FirstDayOfWeek,
    FirstDayOfNextYear,
    FirstDayOfNextMonth,

    // ---- IO (§4.H) ----
    Print,
    PrintLn,
}

impl Builtin {
    /// Names that read as bare constants (`Pi`, `MaxInt`, ...) rather than
    /// calls — §4.H lists them among the functions, but the language gives
    /// the caller no parentheses to distinguish the two (§9).
    pub fn is_niladic_constant(self) -> bool {
        use Builtin::*;
        matches!(self, Pi | Infinity | NaN | MaxInt | MinInt | RandSeed | Now | Date | Time | UTCDateTime)
    }

    fn takes_lvalue_args(self) -> bool {
        use Builtin::*;
        matches!(self, Inc | Dec | SetLength | VarClear | Add | Delete)
    }
}

impl Evaluator {
    /// `Expr::Call` landing point for a name that parsed as a [`Builtin`]
    /// (§4.D). Most built-ins evaluate their arguments up front and
    /// dispatch on plain `Value`s; the handful that mutate their first
    /// argument in place (`Inc`/`Dec`/`SetLength`/`VarClear`/array
    /// `Add`/`Delete`) need the raw lvalue instead and are routed to their
    /// own unevaluated-`Expr` entry points before that happens.
    pub(crate) fn call_builtin(&self, builtin: Builtin, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
        use Builtin::*;
        if builtin.takes_lvalue_args() {
            return match builtin {
                Inc | Dec => ordinal::eval_inc_dec(self, builtin, args, pos, env),
                SetLength => strings::eval_set_length(self, args, pos, env),
                VarClear => variant::eval_var_clear(self, args, pos, env),
                Add => arrays::eval_add(self, args, pos, env),
                Delete => arrays::eval_delete(self, args, pos, env),
                _ => unreachable!(),
            };
        }
        let values: Vec<Value> = args
            .iter()
            .map(|a| Ok(self.eval_expr(a, env)?.deref()))
            .collect::<EvalResult<_>>()?;
        self.dispatch_pure(builtin, &values, pos)
    }

    fn dispatch_pure(&self, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
        use Builtin::*;
        match b {
            Abs | Min | Max | Sqr | Sqrt | Power | Exp | Ln | Log2 | Log10 | LogN | Pi | Infinity | NaN | IsNaN
            | IsFinite | IsInfinite | Sign | Odd | Random | RandomInt | Randomize | SetRandSeed | RandSeed | RandG
            | Unsigned32 | MaxInt | MinInt | Sin | Cos | Tan | Round | Factorial | Gcd | Lcm | IsPrime | LeastFactor
            | PopCount | TestBit | Haversine | CompareNum => math::dispatch(self, b, args, pos),

            Succ | Pred | Ord | Assert => ordinal::dispatch(self, b, args, pos),

            Length | IntToStr | FloatToStr | StrToInt | StrToFloat | StrToIntDef | StrToFloatDef | HexToInt
            | BinToInt | Copy | Pos | UpperCase | LowerCase | Trim => strings::dispatch(self, b, args, pos),

            Low | High | Join => arrays::dispatch(self, b, args, pos),

            VarType | VarIsNull | VarIsEmpty | VarIsNumeric | VarToStr | VarToInt | VarToFloat | VarAsType
            | VarToIntDef | VarToFloatDef => variant::dispatch(self, b, args, pos),

            Now | Date | Time | UTCDateTime | YearOf | MonthOf | DayOf | HourOf | MinuteOf | SecondOf | DayOfWeek
            | DayOfTheWeek | DayOfYear | WeekNumber | YearOfWeek | IsLeapYear | FirstDayOfYear | FirstDayOfMonth
            | FirstDayOfWeek | FirstDayOfNextYear | FirstDayOfNextMonth => datetime::dispatch(self, b, args, pos),

            Print | PrintLn => io::dispatch(self, b, args, pos),

            Inc | Dec | SetLength | VarClear | Add | Delete => {
                unreachable!("lvalue-taking builtins are routed before dispatch_pure")
            }
        }
    }
}
