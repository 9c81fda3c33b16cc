//! Recursive-descent parser and evaluator for `#if` conditions.
//!
//! Operator precedence (lowest → highest):
//!   `||`  →  `&&`  →  `==` `!=`  →  `<` `>` `<=` `>=`  →  unary `!` `-`  →  primary
//!
//! All binary operators are left-associative. Equality is coercive and
//! relational operators compare strings lexicographically and everything
//! else numerically, the way dynamic languages do.

use super::lexer::{tokenize, Token};
use crate::context::Scope;
use crate::error::{Error, Result};
use crate::ext::{number_value, ValueExt};
use serde_json::Value;

/// Resolves identifiers while an expression is evaluated.
pub trait Lookup {
    /// Resolves a property path. `None` means undefined.
    fn resolve(&self, path: &str) -> Option<Value>;
}

impl Lookup for Scope<'_> {
    fn resolve(&self, path: &str) -> Option<Value> {
        Scope::resolve(self, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn syntax(&self, message: &str) -> Error {
        Error::Syntax(format!("{message} in '{}'", self.source))
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Boolean(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Identifier(path)) => Ok(Expr::Path(path)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.syntax("expected ')'")),
                }
            }
            Some(token) => Err(self.syntax(&format!("unexpected token {token:?}"))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }
}

/// Parses a condition into an expression tree.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(Error::Syntax("empty expression".to_string()));
    }
    let mut parser = Parser { source, tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.syntax(&format!("unexpected trailing token {token:?}")));
    }
    Ok(expr)
}

impl Expr {
    /// Evaluates the expression. `None` is the undefined value.
    pub fn eval(&self, lookup: &dyn Lookup) -> Option<Value> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::Path(path) => lookup.resolve(path),
            Expr::Unary(UnaryOp::Not, operand) => {
                Some(Value::Bool(!truthy(operand.eval(lookup).as_ref())))
            }
            Expr::Unary(UnaryOp::Neg, operand) => {
                let n = operand.eval(lookup).map_or(f64::NAN, |v| v.to_number());
                Some(number_value(-n))
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = lhs.eval(lookup);
                let right = || rhs.eval(lookup);
                let result = match op {
                    BinaryOp::Or if truthy(left.as_ref()) => return left,
                    BinaryOp::Or => return right(),
                    BinaryOp::And if truthy(left.as_ref()) => return right(),
                    BinaryOp::And => return left,
                    BinaryOp::Eq => loose_eq(left.as_ref(), right().as_ref()),
                    BinaryOp::Ne => !loose_eq(left.as_ref(), right().as_ref()),
                    BinaryOp::Lt => less_than(left.as_ref(), right().as_ref()),
                    BinaryOp::Gt => less_than(right().as_ref(), left.as_ref()),
                    BinaryOp::Le => less_or_equal(left.as_ref(), right().as_ref()),
                    BinaryOp::Ge => less_or_equal(right().as_ref(), left.as_ref()),
                };
                Some(Value::Bool(result))
            }
        }
    }

    /// Evaluates the expression and reduces the result to a boolean.
    pub fn is_true(&self, lookup: &dyn Lookup) -> bool {
        truthy(self.eval(lookup).as_ref())
    }
}

/// Parses and evaluates a condition against a lookup.
pub fn evaluate(source: &str, lookup: &dyn Lookup) -> Result<bool> {
    Ok(parse(source)?.is_true(lookup))
}

fn truthy(value: Option<&Value>) -> bool {
    value.is_some_and(ValueExt::is_truthy)
}

/// Reduces arrays and objects to their primitive (string) form.
fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_display_string()),
        other => other.clone(),
    }
}

fn number_of(value: Option<&Value>) -> f64 {
    value.map_or(f64::NAN, ValueExt::to_number)
}

/// Coercive equality.
///
/// `null` and undefined only equal each other; a boolean compares as `0`/`1`;
/// a number against a string compares numerically; arrays and objects compare
/// structurally with each other and by their string form against primitives.
pub fn loose_eq(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (None | Some(Value::Null), _) | (_, None | Some(Value::Null)) => false,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(_), Value::Number(_)) => a.to_number() == b.to_number(),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a == b,
            (Value::Bool(_), _) => loose_eq(Some(&number_value(a.to_number())), Some(b)),
            (_, Value::Bool(_)) => loose_eq(Some(a), Some(&number_value(b.to_number()))),
            (Value::Array(_) | Value::Object(_), _) => loose_eq(Some(&to_primitive(a)), Some(b)),
            (_, Value::Array(_) | Value::Object(_)) => loose_eq(Some(a), Some(&to_primitive(b))),
            _ => a.to_number() == b.to_number(),
        },
    }
}

fn less_than(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    let lhs = lhs.map(to_primitive);
    let rhs = rhs.map(to_primitive);
    match (&lhs, &rhs) {
        (Some(Value::String(a)), Some(Value::String(b))) => a < b,
        _ => number_of(lhs.as_ref()) < number_of(rhs.as_ref()),
    }
}

fn less_or_equal(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    let lhs = lhs.map(to_primitive);
    let rhs = rhs.map(to_primitive);
    match (&lhs, &rhs) {
        (Some(Value::String(a)), Some(Value::String(b))) => a <= b,
        _ => number_of(lhs.as_ref()) <= number_of(rhs.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateContext;
    use serde_json::json;

    fn eval_with(expr: &str, ctx: Value) -> bool {
        let ctx = TemplateContext::from_value(ctx).unwrap();
        evaluate(expr, &Scope::new(&ctx)).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert!(eval_with("true || false && false", json!({})));
        assert!(!eval_with("(true || false) && false", json!({})));
        assert!(eval_with("!false == true", json!({})));
        assert!(eval_with("1 < 2 == true", json!({})));
    }

    #[test]
    fn compares_context_values() {
        let ctx = json!({"score": 60, "name": "bob", "tags": ["a"], "user": {"age": "21"}});
        assert!(eval_with("score > 50", ctx.clone()));
        assert!(!eval_with("score < 50", ctx.clone()));
        assert!(eval_with("name == 'bob' && score >= 60", ctx.clone()));
        assert!(eval_with("user.age == 21", ctx.clone()));
        assert!(eval_with("tags[0] == \"a\"", ctx.clone()));
        assert!(eval_with("tags.length > 0", ctx.clone()));
        assert!(eval_with("-score < 0", ctx));
    }

    #[test]
    fn coercive_equality() {
        assert!(loose_eq(Some(&json!("1")), Some(&json!(1))));
        assert!(loose_eq(Some(&json!(true)), Some(&json!(1))));
        assert!(loose_eq(Some(&json!("")), Some(&json!(0))));
        assert!(loose_eq(None, Some(&Value::Null)));
        assert!(!loose_eq(Some(&json!(0)), Some(&Value::Null)));
        assert!(loose_eq(Some(&json!([1, 2])), Some(&json!("1,2"))));
        assert!(!loose_eq(Some(&json!("abc")), Some(&json!(0))));
    }

    #[test]
    fn relational_rules() {
        assert!(less_than(Some(&json!("apple")), Some(&json!("banana"))));
        assert!(!less_than(Some(&json!("10")), Some(&json!(9))));
        assert!(less_than(Some(&json!("10")), Some(&json!("9"))));
        assert!(!less_than(None, Some(&json!(1))));
        assert!(!less_or_equal(Some(&json!("x")), Some(&json!(1))));
        assert!(less_or_equal(Some(&Value::Null), Some(&json!(0))));
    }

    #[test]
    fn missing_values_are_falsy() {
        assert!(!eval_with("missing", json!({})));
        assert!(eval_with("!missing.deep", json!({})));
        assert!(eval_with("missing == null", json!({})));
    }

    #[test]
    fn logical_operators_yield_operands() {
        let ctx = TemplateContext::from_value(json!({"name": "bob", "zero": 0})).unwrap();
        let scope = Scope::new(&ctx);
        assert_eq!(parse("missing || name").unwrap().eval(&scope), Some(json!("bob")));
        assert_eq!(parse("name || missing").unwrap().eval(&scope), Some(json!("bob")));
        assert_eq!(parse("zero && name").unwrap().eval(&scope), Some(json!(0)));
        assert_eq!(parse("name && zero").unwrap().eval(&scope), Some(json!(0)));
        assert_eq!(parse("missing && name").unwrap().eval(&scope), None);
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(parse("(a == 1"), Err(Error::Syntax(_))));
        assert!(matches!(parse("a == 1 b"), Err(Error::Syntax(_))));
        assert!(matches!(parse("a =="), Err(Error::Syntax(_))));
        assert!(matches!(parse(""), Err(Error::Syntax(_))));
        assert!(matches!(parse("a @ b"), Err(Error::Lexical { .. })));
    }
}
