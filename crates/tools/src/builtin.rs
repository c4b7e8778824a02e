//! Reference tools used to exercise the plan executor end to end without
//! any external dependency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::error::{Error, Result};

use crate::registry::{Tool, ToolDefinition};

/// Pure, idempotent arithmetic evaluator. The one tool named in the
/// duplicate guard's `repeat_allowed_tools` default — safe to call
/// repeatedly with the same arguments because it has no side effects.
pub struct CalcTool;

#[async_trait]
impl Tool for CalcTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calc".into(),
            description: "Evaluate a simple arithmetic expression (+ - * / and parentheses)".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "expression": { "type": "string" } },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> Result<String> {
        let expr = args
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Input("calc requires a string \"expression\" argument".into()))?;
        let value = eval_expression(expr)
            .map_err(|e| Error::Input(format!("invalid expression \"{expr}\": {e}")))?;
        Ok(value.to_string())
    }
}

/// Returns its `text` argument unchanged. Used to exercise placeholder
/// resolution in tests.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".into(),
            description: "Return the given text argument unchanged".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        }
    }

    async fn execute(&self, args: &HashMap<String, Value>) -> Result<String> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Input("echo requires a string \"text\" argument".into()))?;
        Ok(text.to_owned())
    }
}

/// Fails on its first invocation, succeeds on every call after. Exercises
/// the schema-violation-to-elicitation path in tests; not a reference
/// tool meant for production use.
#[derive(Default)]
pub struct FailOnceTool {
    calls: AtomicUsize,
}

impl FailOnceTool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tool for FailOnceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fail_once".into(),
            description: "Fails on the first call, succeeds thereafter (test-only)".into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _args: &HashMap<String, Value>) -> Result<String> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst);
        if calls == 0 {
            Err(Error::Schema("fail_once: simulated failure on first call".into()))
        } else {
            Ok("ok".into())
        }
    }
}

/// A minimal recursive-descent evaluator for `+ - * / ( )` over f64
/// literals — enough to make `calc` genuinely pure/idempotent without
/// reaching for a full expression-parser crate.
fn eval_expression(input: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(input)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err("unexpected trailing input".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| format!("bad number \"{text}\""))?;
                tokens.push(Token::Number(n));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> std::result::Result<f64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Plus) => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            Some(Token::Minus) => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> std::result::Result<f64, String> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Star) => {
                *pos += 1;
                value *= parse_factor(tokens, pos)?;
            }
            Some(Token::Slash) => {
                *pos += 1;
                let divisor = parse_factor(tokens, pos)?;
                if divisor == 0.0 {
                    return Err("division by zero".into());
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_factor(tokens: &[Token], pos: &mut usize) -> std::result::Result<f64, String> {
    match tokens.get(*pos) {
        Some(Token::Number(n)) => {
            *pos += 1;
            Ok(*n)
        }
        Some(Token::Minus) => {
            *pos += 1;
            Ok(-parse_factor(tokens, pos)?)
        }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err("expected closing parenthesis".into()),
            }
        }
        _ => Err("expected a number or '('".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calc_evaluates_basic_expression() {
        let mut args = HashMap::new();
        args.insert("expression".into(), Value::String("2 + 3 * 4".into()));
        let out = CalcTool.execute(&args).await.unwrap();
        assert_eq!(out, "14");
    }

    #[tokio::test]
    async fn calc_respects_parentheses() {
        let mut args = HashMap::new();
        args.insert("expression".into(), Value::String("(2 + 3) * 4".into()));
        let out = CalcTool.execute(&args).await.unwrap();
        assert_eq!(out, "20");
    }

    #[tokio::test]
    async fn calc_is_idempotent() {
        let mut args = HashMap::new();
        args.insert("expression".into(), Value::String("10 / 4".into()));
        let a = CalcTool.execute(&args).await.unwrap();
        let b = CalcTool.execute(&args).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn calc_rejects_division_by_zero() {
        let mut args = HashMap::new();
        args.insert("expression".into(), Value::String("1 / 0".into()));
        let err = CalcTool.execute(&args).await.unwrap_err();
        assert_eq!(err.kind(), "input");
    }

    #[tokio::test]
    async fn echo_returns_text_unchanged() {
        let mut args = HashMap::new();
        args.insert("text".into(), Value::String("placeholder target".into()));
        let out = EchoTool.execute(&args).await.unwrap();
        assert_eq!(out, "placeholder target");
    }

    #[tokio::test]
    async fn fail_once_fails_first_then_succeeds() {
        let tool = FailOnceTool::new();
        let args = HashMap::new();
        assert!(tool.execute(&args).await.is_err());
        assert!(tool.execute(&args).await.is_ok());
        assert!(tool.execute(&args).await.is_ok());
    }
}
