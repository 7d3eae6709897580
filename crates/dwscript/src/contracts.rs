//! Contracts Subsystem (component G, §4.G/§9): the `old`-snapshot stack and
//! the cosmetic contract-message text cleanup §9 pins the exact output of.

use ahash::AHashMap;

use crate::ast::Expr;
use crate::value::Value;

/// One function-entry snapshot: every `old(ident)` reference in the
/// function's postconditions, resolved against the entry environment and
/// dereferenced if the identifier was bound to a `Reference` (§4.G).
#[derive(Debug, Default)]
pub struct OldSnapshot {
    values: AHashMap<String, Value>,
}

impl OldSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&name.to_lowercase())
    }
}

/// A stack of `old` snapshots, one pushed per function/method call that
/// carries postconditions (§3.4/§4.G). The Evaluator owns one of these;
/// `old(ident)` expressions read the top frame.
#[derive(Debug, Default)]
pub struct OldStack(Vec<OldSnapshot>);

impl OldStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: OldSnapshot) {
        self.0.push(snapshot);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    pub fn current(&self) -> Option<&OldSnapshot> {
        self.0.last()
    }
}

/// Walks `expr` collecting every identifier named inside an `old(...)`
/// reference (§4.G: "walk the post-condition expressions to find every
/// `old(ident)` reference").
pub fn collect_old_idents(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::OldRef { ident, .. } => out.push(ident.clone()),
        Expr::Unary { operand, .. } => collect_old_idents(operand, out),
        Expr::Binary { left, right, .. } => {
            collect_old_idents(left, out);
            collect_old_idents(right, out);
        }
        Expr::Call { callee, args, .. } => {
            collect_old_idents(callee, out);
            for a in args {
                collect_old_idents(a, out);
            }
        }
        Expr::MethodCall { receiver, args, .. } => {
            collect_old_idents(receiver, out);
            for a in args {
                collect_old_idents(a, out);
            }
        }
        Expr::Member { receiver, .. } => collect_old_idents(receiver, out),
        Expr::Index { receiver, index, .. } => {
            collect_old_idents(receiver, out);
            collect_old_idents(index, out);
        }
        Expr::New { args, .. } => {
            for a in args {
                collect_old_idents(a, out);
            }
        }
        Expr::RecordLiteral { fields, .. } => {
            for (_, e) in fields {
                collect_old_idents(e, out);
            }
        }
        Expr::ArrayLiteral { elements, .. } => {
            for e in elements {
                collect_old_idents(e, out);
            }
        }
        Expr::Range { lo, hi, .. } => {
            collect_old_idents(lo, out);
            collect_old_idents(hi, out);
        }
        Expr::Cast { expr, .. } => collect_old_idents(expr, out),
        Expr::Text(_, inner) => collect_old_idents(inner, out),
        Expr::IntLit(..)
        | Expr::FloatLit(..)
        | Expr::StringLit(..)
        | Expr::BoolLit(..)
        | Expr::NilLit(..)
        | Expr::Ident(..)
        | Expr::OldRef { .. } => {}
    }
}

/// Strips the outer paren pair `String()` adds plus the curated list of
/// paren patterns that follow binary operators (§9 "Contract message
/// cleanup"). Cosmetic but observable: §8 scenario 5 pins the exact
/// cleaned text of `x > 0`.
pub fn clean_contract_text(raw: &str) -> String {
    let mut s = raw.trim().to_string();
    // Strip one outer paren pair, if the whole expression is wrapped.
    if s.starts_with('(') && s.ends_with(')') && parens_balanced_whole(&s) {
        s = s[1..s.len() - 1].trim().to_string();
    }
    // `Display` for Binary always wraps in its own parens: "(a op b)" — strip
    // recursively so nested binary expressions read as plain infix text.
    while s.starts_with('(') && s.ends_with(')') && parens_balanced_whole(&s) {
        s = s[1..s.len() - 1].trim().to_string();
    }
    const PATTERNS: &[&str] = &[
        " = (", " <> (", " < (", " > (", " <= (", " >= (", " + (", " - (", " * (", " / (", " div (", " mod (",
        " and (", " or (",
    ];
    for pat in PATTERNS {
        if let Some(idx) = s.find(pat) {
            // Only strip a matching close paren that ends the string —
            // this pattern only fires for the common "binop (subexpr)"
            // shape these messages actually take.
            if s.ends_with(')') {
                let open_idx = idx + pat.len() - 1;
                let inner_start = open_idx + 1;
                let inner_end = s.len() - 1;
                if inner_end > inner_start {
                    let mut cleaned = s[..open_idx].to_string();
                    cleaned.push_str(&s[inner_start..inner_end]);
                    s = cleaned;
                }
            }
        }
    }
    s
}

fn parens_balanced_whole(s: &str) -> bool {
    if s.len() < 2 {
        return false;
    }
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_outer_paren_pair() {
        assert_eq!(clean_contract_text("(x > 0)"), "x > 0");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(clean_contract_text("x > 0"), "x > 0");
    }
}
