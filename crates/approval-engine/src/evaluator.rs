//! Condition evaluator: a small expression language over instance context
//!
//! Expressions support comparison operators, `&&` / `||`, parentheses,
//! literals and dotted-path lookups into the contract attributes,
//! instance metadata and countersign tally. An unresolvable path yields
//! a typed absent value, and any comparison against it makes the
//! predicate false rather than erroring — optional contract attributes
//! must never crash a transition. Malformed syntax is an `EvalError`;
//! callers treat the condition as not satisfied.

use approval_types::{ContractSummary, EvalError, GroupTally};

// ── Context ──────────────────────────────────────────────────────────

/// Everything an expression can see
#[derive(Clone, Debug)]
pub struct EvalContext<'a> {
    contract: &'a ContractSummary,
    initiator_org_level: Option<u32>,
    tally: Option<GroupTally>,
    condition_result: Option<bool>,
}

impl<'a> EvalContext<'a> {
    pub fn new(contract: &'a ContractSummary) -> Self {
        Self {
            contract,
            initiator_org_level: None,
            tally: None,
            condition_result: None,
        }
    }

    pub fn with_org_level(mut self, level: u32) -> Self {
        self.initiator_org_level = Some(level);
        self
    }

    /// Expose a countersign tally (post-countersign transitions only)
    pub fn with_tally(mut self, tally: GroupTally) -> Self {
        self.tally = Some(tally);
        self
    }

    /// Expose the boolean a condition node just evaluated to
    pub fn with_condition_result(mut self, result: bool) -> Self {
        self.condition_result = Some(result);
        self
    }

    fn lookup(&self, path: &str) -> Value {
        match path {
            "amount" => Value::Number(self.contract.amount),
            "type" => Value::Str(self.contract.contract_type.clone()),
            "subtype" => match &self.contract.subtype {
                Some(subtype) => Value::Str(subtype.clone()),
                None => Value::Absent,
            },
            "initiator.orgLevel" => match self.initiator_org_level {
                Some(level) => Value::Number(level as f64),
                None => Value::Absent,
            },
            "condition.result" => match self.condition_result {
                Some(result) => Value::Bool(result),
                None => Value::Absent,
            },
            "tally.approvedCount" => self.tally_field(|t| t.approved),
            "tally.rejectedCount" => self.tally_field(|t| t.rejected),
            "tally.totalVoters" => self.tally_field(|t| t.total()),
            _ => match path.strip_prefix("attributes.") {
                Some(rest) => match self.contract.attribute(rest) {
                    Some(value) => Value::from_json(value),
                    None => Value::Absent,
                },
                None => Value::Absent,
            },
        }
    }

    fn tally_field(&self, field: impl Fn(&GroupTally) -> u32) -> Value {
        match &self.tally {
            Some(tally) => Value::Number(field(tally) as f64),
            None => Value::Absent,
        }
    }
}

// ── Values ───────────────────────────────────────────────────────────

/// A value an operand evaluates to
#[derive(Clone, Debug, PartialEq)]
enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    /// An unresolvable path. Distinct from null/false: any comparison
    /// against it is false.
    Absent,
}

impl Value {
    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Value::Number(f),
                None => Value::Absent,
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            _ => Value::Absent,
        }
    }

    fn truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }
}

// ── Public entry point ───────────────────────────────────────────────

/// Evaluate an expression against a context
pub fn evaluate(expression: &str, context: &EvalContext<'_>) -> Result<bool, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError("empty expression".into()));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        context,
    };
    let result = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return Err(EvalError(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(result)
}

// ── Tokenizer ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Bool(bool),
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            c if c.is_ascii_digit() => {
                let mut literal = String::new();
                let mut seen_dot = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                        seen_dot |= c == '.';
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| EvalError(format!("invalid number literal '{}'", literal)))?;
                tokens.push(Token::Number(number));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    literal.push(c);
                }
                if !closed {
                    return Err(EvalError("unterminated string literal".into()));
                }
                tokens.push(Token::Str(literal));
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err(EvalError("expected '&&'".into()));
                }
                tokens.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err(EvalError("expected '||'".into()));
                }
                tokens.push(Token::OrOr);
            }
            '=' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(EvalError("expected '=='".into()));
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(EvalError("expected '!='".into()));
                }
                tokens.push(Token::Ne);
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => {
                return Err(EvalError(format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

// ── Parser / evaluator ───────────────────────────────────────────────

struct Parser<'t, 'c> {
    tokens: &'t [Token],
    pos: usize,
    context: &'t EvalContext<'c>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<bool, EvalError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let right = self.parse_and()?;
            left = left || right;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<bool, EvalError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let right = self.parse_comparison()?;
            left = left && right;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<bool, EvalError> {
        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Eq) => Cmp::Eq,
            Some(Token::Ne) => Cmp::Ne,
            Some(Token::Gt) => Cmp::Gt,
            Some(Token::Ge) => Cmp::Ge,
            Some(Token::Lt) => Cmp::Lt,
            Some(Token::Le) => Cmp::Le,
            _ => return Ok(left.truthy()),
        };
        self.next();
        let right = self.parse_operand()?;
        Ok(compare(&left, op, &right))
    }

    fn parse_operand(&mut self) -> Result<Value, EvalError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(Value::Bool(inner)),
                    _ => Err(EvalError("expected ')'".into())),
                }
            }
            Some(Token::Number(n)) => Ok(Value::Number(n)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::Ident(path)) => Ok(self.context.lookup(&path)),
            Some(other) => Err(EvalError(format!("unexpected token {:?}", other))),
            None => Err(EvalError("unexpected end of expression".into())),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Cmp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

fn compare(left: &Value, op: Cmp, right: &Value) -> bool {
    // absent fails every comparison, including inequality
    if matches!(left, Value::Absent) || matches!(right, Value::Absent) {
        return false;
    }
    match op {
        Cmp::Eq => left == right,
        Cmp::Ne => left != right,
        Cmp::Gt | Cmp::Ge | Cmp::Lt | Cmp::Le => match (left, right) {
            (Value::Number(a), Value::Number(b)) => match op {
                Cmp::Gt => a > b,
                Cmp::Ge => a >= b,
                Cmp::Lt => a < b,
                Cmp::Le => a <= b,
                _ => false,
            },
            // ordering is numeric-only
            _ => false,
        },
    }
}
