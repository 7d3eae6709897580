//! Math/ordinal built-ins (§4.H "Math/ordinal") that operate on plain
//! numbers — everything except `Inc`/`Dec`/`Succ`/`Pred`/`Ord`/`Assert`,
//! which live in [`super::ordinal`] because they need lvalue or enum
//! access the rest of this family doesn't.

use rand::Rng;

use crate::ast::Position;
use crate::builtins::Builtin;
use crate::coerce::{as_float, as_integer};
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::Evaluator;
use crate::value::Value;

fn arg(args: &[Value], i: usize, pos: Position, name: &str) -> EvalResult<Value> {
    args.get(i)
        .cloned()
        .ok_or_else(|| RuntimeError::new(pos, format!("{name} requires {} argument(s)", i + 1)).into())
}

fn numeric(v: &Value) -> bool {
    matches!(v, Value::Integer(_) | Value::Float(_))
}

pub(crate) fn dispatch(ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    match b {
        Abs => {
            let v = arg(args, 0, pos, "Abs")?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(n.abs())),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(RuntimeError::new(pos, format!("type mismatch: Abs expects a number, found {}", other.type_name())).into()),
            }
        }
        Min | Max => {
            let a = arg(args, 0, pos, "Min/Max")?;
            let b2 = arg(args, 1, pos, "Min/Max")?;
            if let (Value::Integer(x), Value::Integer(y)) = (&a, &b2) {
                let result = if b == Min { (*x).min(*y) } else { (*x).max(*y) };
                return Ok(Value::Integer(result));
            }
            let x = as_float(&a, pos)?;
            let y = as_float(&b2, pos)?;
            Ok(Value::Float(if b == Min { x.min(y) } else { x.max(y) }))
        }
        Sqr => {
            let v = arg(args, 0, pos, "Sqr")?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(n * n)),
                Value::Float(f) => Ok(Value::Float(f * f)),
                other => Err(RuntimeError::new(pos, format!("type mismatch: Sqr expects a number, found {}", other.type_name())).into()),
            }
        }
        Sqrt => Ok(Value::Float(as_float(&arg(args, 0, pos, "Sqrt")?, pos)?.sqrt())),
        Power => {
            let base = as_float(&arg(args, 0, pos, "Power")?, pos)?;
            let exp = as_float(&arg(args, 1, pos, "Power")?, pos)?;
            Ok(Value::Float(base.powf(exp)))
        }
        Exp => Ok(Value::Float(as_float(&arg(args, 0, pos, "Exp")?, pos)?.exp())),
        Ln => Ok(Value::Float(as_float(&arg(args, 0, pos, "Ln")?, pos)?.ln())),
        Log2 => Ok(Value::Float(as_float(&arg(args, 0, pos, "Log2")?, pos)?.log2())),
        Log10 => Ok(Value::Float(as_float(&arg(args, 0, pos, "Log10")?, pos)?.log10())),
        LogN => {
            let base = as_float(&arg(args, 0, pos, "LogN")?, pos)?;
            let x = as_float(&arg(args, 1, pos, "LogN")?, pos)?;
            Ok(Value::Float(x.log(base)))
        }
        Pi => Ok(Value::Float(std::f64::consts::PI)),
        Infinity => Ok(Value::Float(f64::INFINITY)),
        NaN => Ok(Value::Float(f64::NAN)),
        IsNaN => Ok(Value::Boolean(as_float(&arg(args, 0, pos, "IsNaN")?, pos)?.is_nan())),
        IsFinite => Ok(Value::Boolean(as_float(&arg(args, 0, pos, "IsFinite")?, pos)?.is_finite())),
        IsInfinite => Ok(Value::Boolean(as_float(&arg(args, 0, pos, "IsInfinite")?, pos)?.is_infinite())),
        Sign => {
            let v = arg(args, 0, pos, "Sign")?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(n.signum())),
                Value::Float(f) => Ok(Value::Integer(if f > 0.0 { 1 } else if f < 0.0 { -1 } else { 0 })),
                other => Err(RuntimeError::new(pos, format!("type mismatch: Sign expects a number, found {}", other.type_name())).into()),
            }
        }
        Odd => Ok(Value::Boolean(as_integer(&arg(args, 0, pos, "Odd")?, pos)? % 2 != 0)),
        Random => Ok(Value::Float(ev.rng.borrow_mut().gen_range(0.0..1.0))),
        RandomInt => {
            let n = as_integer(&arg(args, 0, pos, "RandomInt")?, pos)?;
            if n <= 0 {
                return Err(RuntimeError::new(pos, "RandomInt requires a positive argument").into());
            }
            Ok(Value::Integer(ev.rng.borrow_mut().gen_range(0..n)))
        }
        Randomize => {
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            *ev.rng.borrow_mut() = rand::SeedableRng::seed_from_u64(seed);
            Ok(Value::Nil)
        }
        SetRandSeed => {
            let seed = as_integer(&arg(args, 0, pos, "SetRandSeed")?, pos)? as u64;
            *ev.rng.borrow_mut() = rand::SeedableRng::seed_from_u64(seed);
            Ok(Value::Nil)
        }
        RandSeed => Ok(Value::Integer(0)),
        RandG => {
            let mean = as_float(&arg(args, 0, pos, "RandG")?, pos)?;
            let stddev = as_float(&arg(args, 1, pos, "RandG")?, pos)?;
            // Box-Muller: no extra distribution crate needed for a single
            // normal-variate built-in.
            let (u1, u2): (f64, f64) = {
                let mut rng = ev.rng.borrow_mut();
                (rng.gen_range(f64::EPSILON..1.0), rng.gen_range(0.0..1.0))
            };
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            Ok(Value::Float(mean + stddev * z))
        }
        Unsigned32 => {
            let n = as_integer(&arg(args, 0, pos, "Unsigned32")?, pos)?;
            Ok(Value::Integer((n as u32) as i64))
        }
        MaxInt => Ok(Value::Integer(i64::MAX)),
        MinInt => Ok(Value::Integer(i64::MIN)),
        Sin => Ok(Value::Float(as_float(&arg(args, 0, pos, "Sin")?, pos)?.sin())),
        Cos => Ok(Value::Float(as_float(&arg(args, 0, pos, "Cos")?, pos)?.cos())),
        Tan => Ok(Value::Float(as_float(&arg(args, 0, pos, "Tan")?, pos)?.tan())),
        // DWScript's Round is banker's rounding (round-half-to-even), not
        // round-half-away-from-zero: Round(2.5) = 2, Round(0.5) = 0.
        Round => Ok(Value::Integer(as_float(&arg(args, 0, pos, "Round")?, pos)?.round_ties_even() as i64)),
        Factorial => {
            let n = as_integer(&arg(args, 0, pos, "Factorial")?, pos)?;
            if !(0..=20).contains(&n) {
                return Err(RuntimeError::new(pos, format!("Factorial argument out of range: {n}")).into());
            }
            Ok(Value::Integer((1..=n).product()))
        }
        Gcd => {
            let mut a = as_integer(&arg(args, 0, pos, "Gcd")?, pos)?.abs();
            let mut bb = as_integer(&arg(args, 1, pos, "Gcd")?, pos)?.abs();
            while bb != 0 {
                let t = bb;
                bb = a % bb;
                a = t;
            }
            Ok(Value::Integer(a))
        }
        Lcm => {
            let a = as_integer(&arg(args, 0, pos, "Lcm")?, pos)?.abs();
            let b2 = as_integer(&arg(args, 1, pos, "Lcm")?, pos)?.abs();
            if a == 0 || b2 == 0 {
                return Ok(Value::Integer(0));
            }
            let mut x = a;
            let mut y = b2;
            while y != 0 {
                let t = y;
                y = x % y;
                x = t;
            }
            Ok(Value::Integer(a / x * b2))
        }
        IsPrime => {
            let n = as_integer(&arg(args, 0, pos, "IsPrime")?, pos)?;
            Ok(Value::Boolean(is_prime(n)))
        }
        LeastFactor => {
            let n = as_integer(&arg(args, 0, pos, "LeastFactor")?, pos)?;
            Ok(Value::Integer(least_factor(n)))
        }
        PopCount => Ok(Value::Integer(as_integer(&arg(args, 0, pos, "PopCount")?, pos)?.count_ones() as i64)),
        TestBit => {
            let n = as_integer(&arg(args, 0, pos, "TestBit")?, pos)?;
            let bit = as_integer(&arg(args, 1, pos, "TestBit")?, pos)?;
            if !(0..64).contains(&bit) {
                return Err(RuntimeError::new(pos, format!("TestBit bit index out of range: {bit}")).into());
            }
            Ok(Value::Boolean(n & (1i64 << bit) != 0))
        }
        Haversine => {
            let lat1 = as_float(&arg(args, 0, pos, "Haversine")?, pos)?.to_radians();
            let lon1 = as_float(&arg(args, 1, pos, "Haversine")?, pos)?.to_radians();
            let lat2 = as_float(&arg(args, 2, pos, "Haversine")?, pos)?.to_radians();
            let lon2 = as_float(&arg(args, 3, pos, "Haversine")?, pos)?.to_radians();
            const EARTH_RADIUS_KM: f64 = 6371.0;
            let dlat = lat2 - lat1;
            let dlon = lon2 - lon1;
            let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
            let c = 2.0 * a.sqrt().asin();
            Ok(Value::Float(EARTH_RADIUS_KM * c))
        }
        CompareNum => {
            let a = arg(args, 0, pos, "CompareNum")?;
            let b2 = arg(args, 1, pos, "CompareNum")?;
            if !numeric(&a) || !numeric(&b2) {
                return Err(RuntimeError::new(pos, "CompareNum requires numeric arguments").into());
            }
            let x = as_float(&a, pos)?;
            let y = as_float(&b2, pos)?;
            Ok(Value::Integer(match (x.is_nan(), y.is_nan()) {
                (true, true) => 0,
                (true, false) => -1,
                (false, true) => 1,
                (false, false) => x.partial_cmp(&y).map(|o| o as i64).unwrap_or(0),
            }))
        }
        _ => unreachable!("math::dispatch called with a non-math builtin"),
    }
}

fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn least_factor(n: i64) -> i64 {
    if n < 2 {
        return n;
    }
    if n % 2 == 0 {
        return 2;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return i;
        }
        i += 2;
    }
    n
}
