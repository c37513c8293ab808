//! Path context collaborator
//!
//! A path context evaluates selector strings against a subject. The engine only
//! needs the [`PathContext`] contract; [`SimplePath`] is a small evaluator that
//! satisfies it for embedders without a richer expression language.
//!
//! `SimplePath` grammar:
//!
//! ```text
//! expr  := '.' | literal | var ('/' step)* | call | step ('/' step)*
//! var   := '$' qname
//! call  := qname '(' [expr (',' expr)*] ')'
//! literal := 'text' | "text" | number | true | false | null
//! ```

use crate::runtime::value::Value;
use std::rc::Rc;
use thiserror::Error;

/// Selector evaluation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("syntax error in selector '{selector}' at offset {offset}: {message}")]
    Syntax {
        selector: String,
        offset: usize,
        message: String,
    },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("no value for '{step}' in {found}")]
    NoSuchStep { step: String, found: &'static str },

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("function '{function}' expects {expected} argument(s), found {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("bad argument to '{function}': {message}")]
    BadArgument { function: String, message: String },

    #[error("cannot create a relative context for a non-existent node")]
    NullSubject,

    #[error("variable resolution failed: {0}")]
    Resolution(String),
}

/// Variable and function lookups available while a selector is evaluated.
pub trait PathEnv {
    /// Resolve a textual variable name; `Ok(None)` when nothing is bound.
    fn variable(
        &self,
        name: &str,
    ) -> Result<Option<Value>, PathError>;

    /// Call a function by textual name.
    fn call(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<Value, PathError>;
}

/// Evaluates selectors against one subject.
pub trait PathContext {
    /// The subject selectors are evaluated against.
    fn subject(&self) -> &Value;

    /// Evaluate `selector` with variables and functions from `env`.
    fn evaluate(
        &self,
        selector: &str,
        env: &dyn PathEnv,
    ) -> Result<Value, PathError>;

    /// A context for a different subject.
    fn relative(
        &self,
        subject: Value,
    ) -> Result<Rc<dyn PathContext>, PathError>;
}

/// Minimal selector evaluator.
#[derive(Debug, Clone, Default)]
pub struct SimplePath {
    subject: Value,
}

impl SimplePath {
    pub fn new(subject: impl Into<Value>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Shared handle, the form scope contexts hold.
    pub fn shared(subject: impl Into<Value>) -> Rc<dyn PathContext> {
        Rc::new(Self::new(subject))
    }
}

impl PathContext for SimplePath {
    fn subject(&self) -> &Value {
        &self.subject
    }

    fn evaluate(
        &self,
        selector: &str,
        env: &dyn PathEnv,
    ) -> Result<Value, PathError> {
        let mut parser = Parser {
            selector,
            pos: 0,
            subject: &self.subject,
            env,
        };
        let value = parser.expr()?;
        parser.skip_ws();
        if parser.pos < selector.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(value)
    }

    fn relative(
        &self,
        subject: Value,
    ) -> Result<Rc<dyn PathContext>, PathError> {
        if subject.is_null() {
            return Err(PathError::NullSubject);
        }
        Ok(Rc::new(SimplePath { subject }))
    }
}

struct Parser<'a> {
    selector: &'a str,
    pos: usize,
    subject: &'a Value,
    env: &'a dyn PathEnv,
}

impl<'a> Parser<'a> {
    fn error(
        &self,
        message: &str,
    ) -> PathError {
        PathError::Syntax {
            selector: self.selector.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.selector[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(
        &mut self,
        expected: char,
    ) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            self.bump();
        }
        &self.selector[start..self.pos]
    }

    /// `name` or `prefix:name`
    fn qname(&mut self) -> Result<&'a str, PathError> {
        let start = self.pos;
        if self.name().is_empty() {
            return Err(self.error("expected a name"));
        }
        if self.peek() == Some(':') {
            self.bump();
            if self.name().is_empty() {
                return Err(self.error("expected a local name after ':'"));
            }
        }
        Ok(&self.selector[start..self.pos])
    }

    fn expr(&mut self) -> Result<Value, PathError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("empty selector")),
            Some('.') => {
                self.bump();
                let subject = self.subject.clone();
                if self.eat('/') {
                    self.steps_from(subject, true)
                } else {
                    Ok(subject)
                }
            }
            Some('$') => {
                self.bump();
                let name = self.qname()?;
                let value = self
                    .env
                    .variable(name)?
                    .ok_or_else(|| PathError::UndefinedVariable(name.to_string()))?;
                self.steps_from(value, false)
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                let start = self.pos;
                while let Some(c) = self.bump() {
                    if c == quote {
                        let text = &self.selector[start..self.pos - 1];
                        return Ok(Value::from(text));
                    }
                }
                Err(self.error("unterminated string literal"))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(_) => {
                let start = self.pos;
                let name = self.qname()?;
                self.skip_ws();
                if self.eat('(') {
                    let args = self.arguments()?;
                    return self.env.call(name, &args);
                }
                match name {
                    "true" => return Ok(Value::Bool(true)),
                    "false" => return Ok(Value::Bool(false)),
                    "null" => return Ok(Value::Null),
                    _ => {}
                }
                self.pos = start;
                let subject = self.subject.clone();
                self.steps_from(subject, true)
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Value>, PathError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            if self.eat(')') {
                return Ok(args);
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or ')'"));
            }
        }
    }

    fn number(&mut self) -> Result<Value, PathError> {
        let start = self.pos;
        self.eat('-');
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let text = &self.selector[start..self.pos];
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| self.error("malformed number"))
    }

    /// Navigate `/step/step` from `value`; `leading` means a step is already due.
    fn steps_from(
        &mut self,
        mut value: Value,
        mut leading: bool,
    ) -> Result<Value, PathError> {
        loop {
            if !leading && !self.eat('/') {
                return Ok(value);
            }
            leading = false;
            let step = self.name();
            if step.is_empty() {
                return Err(self.error("expected a path step"));
            }
            value = navigate(&value, step)?;
        }
    }
}

fn navigate(
    value: &Value,
    step: &str,
) -> Result<Value, PathError> {
    let found = match value {
        Value::Map(map) => map.get(step).cloned(),
        Value::List(items) => step.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        _ => None,
    };
    found.ok_or_else(|| PathError::NoSuchStep {
        step: step.to_string(),
        found: value.type_name(),
    })
}
