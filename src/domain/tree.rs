// ============================================================
// Layer 3 — Expression Tree Post-processing
// ============================================================
// Decoded MWP answers are linearised expression trees such as
//
//     x = ( 3 + 5 ) * 2
//
// Two things happen to them before scoring:
//
//   1. repair_parentheses — best-effort balancing of "(" / ")"
//   2. tree_accuracy      — exact symbol match, or equal value
//                           when both sides are `x = expr`
//
// Downstream scoring must accept structurally invalid trees:
// the repair does not guarantee well-formedness.

use crate::domain::vocab::Vocab;

pub const OPEN_PAREN: &str = "(";
pub const CLOSE_PAREN: &str = ")";

/// Tolerance for treating two evaluated equations as equal.
const SOLUTION_EPSILON: f64 = 1e-4;

/// Balance parentheses in a decoded index sequence.
///
/// * more opens than closes → append the missing `close_idx` symbols
/// * more closes than opens → drop the excess count from the end
///
/// The truncation removes trailing symbols whatever they are, so a
/// large deficit can remove operands along with the stray closes;
/// when the excess exceeds the length the result is empty.
pub fn repair_parentheses(
    mut candidate: Vec<usize>,
    open_idx:      usize,
    close_idx:     usize,
) -> Vec<usize> {
    let opens  = candidate.iter().filter(|&&c| c == open_idx).count();
    let closes = candidate.iter().filter(|&&c| c == close_idx).count();

    if opens > closes {
        candidate.extend(std::iter::repeat(close_idx).take(opens - closes));
    } else if closes > opens {
        let keep = candidate.len().saturating_sub(closes - opens);
        candidate.truncate(keep);
    }
    candidate
}

/// [`repair_parentheses`] with the paren indices resolved through
/// `vocab`. A vocabulary without both symbols leaves the candidate
/// untouched.
pub fn repair_with_vocab(candidate: Vec<usize>, vocab: &Vocab) -> Vec<usize> {
    match (vocab.index_of(OPEN_PAREN), vocab.index_of(CLOSE_PAREN)) {
        (Some(open), Some(close)) => repair_parentheses(candidate, open, close),
        _ => candidate,
    }
}

/// Fraction of candidates that match their reference.
pub fn tree_accuracy(candidates: &[Vec<usize>], references: &[Vec<usize>], vocab: &Vocab) -> f64 {
    let total = candidates.len().min(references.len());
    if total == 0 {
        return 0.0;
    }
    let correct = candidates
        .iter()
        .zip(references)
        .filter(|(c, r)| is_same_tree(c, r, vocab))
        .count();
    correct as f64 / total as f64
}

/// Identical symbol sequences, or equations with the same solution.
pub fn is_same_tree(candidate: &[usize], reference: &[usize], vocab: &Vocab) -> bool {
    if candidate == reference {
        return true;
    }
    let c = vocab.symbols_for(candidate);
    let r = vocab.symbols_for(reference);
    match (solve_for_variable(&c), solve_for_variable(&r)) {
        (Some(a), Some(b)) => (a - b).abs() < SOLUTION_EPSILON,
        _ => false,
    }
}

/// Value of the unknown in `x = expr` or `expr = x`.
pub fn solve_for_variable(tokens: &[&str]) -> Option<f64> {
    let tokens = strip_outer_parens(tokens);
    let eq = tokens.iter().position(|&t| t == "=")?;
    let (lhs, rhs) = (&tokens[..eq], &tokens[eq + 1..]);

    let expr = match (strip_outer_parens(lhs), strip_outer_parens(rhs)) {
        ([var], expr) if is_variable(var) => expr,
        (expr, [var]) if is_variable(var) => expr,
        _ => return None,
    };
    let value = ExprParser::new(expr).parse()?;
    value.is_finite().then_some(value)
}

fn is_variable(token: &str) -> bool {
    token.len() == 1 && token.chars().all(|c| c.is_ascii_alphabetic())
}

/// Remove parentheses that wrap the entire slice.
fn strip_outer_parens<'a, 'b>(mut tokens: &'b [&'a str]) -> &'b [&'a str] {
    while tokens.len() >= 2
        && tokens[0] == OPEN_PAREN
        && tokens[tokens.len() - 1] == CLOSE_PAREN
        && closing_index(tokens) == Some(tokens.len() - 1)
    {
        tokens = &tokens[1..tokens.len() - 1];
    }
    tokens
}

/// Index of the ")" matching the "(" at position 0.
fn closing_index(tokens: &[&str]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &t) in tokens.iter().enumerate() {
        match t {
            OPEN_PAREN => depth += 1,
            CLOSE_PAREN => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ─── Arithmetic evaluation ───────────────────────────────────────────────────
// Recursive descent over infix tokens:
//   expr   := term (("+" | "-") term)*
//   term   := power (("*" | "/") power)*
//   power  := unary ("^" power)?
//   unary  := "-" unary | atom
//   atom   := number | "(" expr ")"
struct ExprParser<'a> {
    tokens: &'a [&'a str],
    pos:    usize,
}

impl<'a> ExprParser<'a> {
    fn new(tokens: &'a [&'a str]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> Option<f64> {
        let value = self.expr()?;
        (self.pos == self.tokens.len()).then_some(value)
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<&'a str> {
        let t = self.peek()?;
        self.pos += 1;
        Some(t)
    }

    fn expr(&mut self) -> Option<f64> {
        let mut acc = self.term()?;
        while let Some(op @ ("+" | "-")) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == "+" { acc + rhs } else { acc - rhs };
        }
        Some(acc)
    }

    fn term(&mut self) -> Option<f64> {
        let mut acc = self.power()?;
        while let Some(op @ ("*" | "/")) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            acc = if op == "*" { acc * rhs } else { acc / rhs };
        }
        Some(acc)
    }

    fn power(&mut self) -> Option<f64> {
        let base = self.unary()?;
        if self.peek() == Some("^") {
            self.pos += 1;
            let exp = self.power()?;
            return Some(base.powf(exp));
        }
        Some(base)
    }

    fn unary(&mut self) -> Option<f64> {
        if self.peek() == Some("-") {
            self.pos += 1;
            return Some(-self.unary()?);
        }
        self.atom()
    }

    fn atom(&mut self) -> Option<f64> {
        match self.next()? {
            OPEN_PAREN => {
                let value = self.expr()?;
                (self.next()? == CLOSE_PAREN).then_some(value)
            }
            token => token.parse::<f64>().ok(),
        }
    }
}
