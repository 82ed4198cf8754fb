//! Recursive-descent parser producing the formula AST.
//!
//! Grammar:
//! ```text
//! expr       := additive (cmp_op additive)?
//! additive   := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := ('-' | '+') unary | primary
//! primary    := NUMBER | IDENT '(' args ')' | IDENT | '(' expr ')'
//! ```
//! Comparisons do not chain; function names must be on the whitelist.

use std::collections::BTreeSet;

use crate::traits::OpError;

use super::lexer::Token;

/// Deepest nesting the parser accepts.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

/// Whitelisted numeric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Abs,
    Sqrt,
    Log,
    Log1p,
    Exp,
    Min,
    Max,
    Round,
    Floor,
    Ceil,
    Pow,
}

impl Func {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "log" => Func::Log,
            "log1p" => Func::Log1p,
            "exp" => Func::Exp,
            "min" => Func::Min,
            "max" => Func::Max,
            "round" => Func::Round,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "pow" => Func::Pow,
            _ => return None,
        })
    }

    /// Accepted argument counts (inclusive).
    fn arity(self) -> (usize, usize) {
        match self {
            Func::Min | Func::Max | Func::Pow => (2, 2),
            Func::Round => (1, 2),
            _ => (1, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Column(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Column names referenced anywhere in the expression.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Call { args, .. } => {
                for a in args {
                    a.collect_columns(out);
                }
            }
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, Expr::Compare { .. })
    }
}

pub fn parse(tokens: &[Token]) -> Result<Expr, OpError> {
    if tokens.is_empty() {
        return Err(OpError::InvalidExpression("empty formula".into()));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(OpError::InvalidExpression(format!(
            "unexpected {tok:?} after end of expression"
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), OpError> {
        match self.next() {
            Some(tok) if *tok == want => Ok(()),
            Some(tok) => Err(OpError::InvalidExpression(format!(
                "expected {want:?}, found {tok:?}"
            ))),
            None => Err(OpError::InvalidExpression(format!(
                "expected {want:?}, found end of formula"
            ))),
        }
    }

    fn descend(&mut self) -> Result<(), OpError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(OpError::InvalidExpression(format!(
                "formula nests deeper than {MAX_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, OpError> {
        self.descend()?;
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::EqEq) => Some(CmpOp::Eq),
            Some(Token::NotEq) => Some(CmpOp::Ne),
            _ => None,
        };
        let expr = match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.parse_additive()?;
                if matches!(
                    self.peek(),
                    Some(Token::Gt | Token::Lt | Token::Ge | Token::Le | Token::EqEq | Token::NotEq)
                ) {
                    return Err(OpError::InvalidExpression(
                        "comparisons cannot be chained".into(),
                    ));
                }
                Expr::Compare {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            None => lhs,
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, OpError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, OpError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, OpError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_unary();
                self.depth -= 1;
                inner
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, OpError> {
        match self.next().cloned() {
            Some(Token::Number(v)) => Ok(Expr::Number(v)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Column(name));
                }
                let func = Func::lookup(&name).ok_or_else(|| {
                    OpError::InvalidExpression(format!("function '{name}' is not allowed"))
                })?;
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                let (lo, hi) = func.arity();
                if args.len() < lo || args.len() > hi {
                    return Err(OpError::InvalidExpression(format!(
                        "function '{name}' takes {lo}..={hi} arguments, got {}",
                        args.len()
                    )));
                }
                Ok(Expr::Call { func, args })
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(tok) => Err(OpError::InvalidExpression(format!("unexpected {tok:?}"))),
            None => Err(OpError::InvalidExpression("formula ends unexpectedly".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_str(src: &str) -> Result<Expr, OpError> {
        parse(&tokenize(src)?)
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = parse_str("`A` + `B` * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Column("A".into())),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(Expr::Column("B".into())),
                    rhs: Box::new(Expr::Number(2.0)),
                }),
            }
        );
    }

    #[test]
    fn whitelisted_calls_and_columns() {
        let expr = parse_str("max(abs(x - y), 0) > threshold").unwrap();
        assert!(expr.is_comparison());
        let cols: Vec<String> = expr.columns().into_iter().collect();
        assert_eq!(cols, vec!["threshold", "x", "y"]);
    }

    #[test]
    fn rejects_disallowed_constructs() {
        for src in [
            "__import__(os)",
            "eval(x)",
            "a < b < c",
            "sqrt(x, y)",
            "(a + b",
            "a b",
            "",
            "pow(2)",
        ] {
            assert!(
                matches!(parse_str(src), Err(OpError::InvalidExpression(_))),
                "{src} should be rejected"
            );
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(parse_str(&deep).is_err());
        let unary = format!("{}1", "-".repeat(MAX_DEPTH + 1));
        assert!(parse_str(&unary).is_err());
    }
}
