// src/manifest/condition.rs

//! Boolean guards over option flags
//!
//! Syntax: `with-python`, `!with-python`, `without-python`,
//! `with-python && with-docs`, `with-a || !with-b`.
//! `&&` binds tighter than `||`. Parentheses are not supported.
//! `without-X` is shorthand for `!with-X`.

use crate::options::OptionSet;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A parsed guard expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// True when the option is enabled
    Flag(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

/// Invalid guard syntax
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition '{expr}': {reason}")]
pub struct ConditionError {
    pub expr: String,
    pub reason: String,
}

/// Evaluation touched an option the option set does not define
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown option '{0}'")]
pub struct UnknownOption(pub String);

impl Condition {
    /// Parse a guard expression
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let fail = |reason: &str| ConditionError {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.trim().is_empty() {
            return Err(fail("empty expression"));
        }

        let mut any = Vec::new();
        for term in expr.split("||") {
            let mut all = Vec::new();
            for factor in term.split("&&") {
                all.push(Self::parse_factor(factor).map_err(|r| fail(&r))?);
            }
            any.push(collapse(all, Condition::All));
        }

        Ok(collapse(any, Condition::Any))
    }

    fn parse_factor(factor: &str) -> Result<Self, String> {
        let factor = factor.trim();
        if let Some(rest) = factor.strip_prefix('!') {
            if rest.trim().is_empty() {
                return Err("missing option name after '!'".to_string());
            }
            return Ok(Condition::Not(Box::new(Self::parse_factor(rest)?)));
        }

        if factor.is_empty() {
            return Err("missing operand".to_string());
        }
        if !factor
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
        {
            return Err(format!("invalid option name '{}'", factor));
        }

        match factor.strip_prefix("without-") {
            Some(name) if !name.is_empty() => Ok(Condition::Not(Box::new(Condition::Flag(
                format!("with-{}", name),
            )))),
            _ => Ok(Condition::Flag(factor.to_string())),
        }
    }

    /// Evaluate against an option set
    ///
    /// Every referenced option must be present; short-circuiting never hides
    /// an unknown name.
    pub fn evaluate(&self, options: &OptionSet) -> Result<bool, UnknownOption> {
        if let Some(missing) = self.options().into_iter().find(|o| !options.contains(o)) {
            return Err(UnknownOption(missing.to_string()));
        }
        Ok(self.eval_known(options))
    }

    fn eval_known(&self, options: &OptionSet) -> bool {
        match self {
            Condition::Flag(name) => options.is_enabled(name),
            Condition::Not(inner) => !inner.eval_known(options),
            Condition::All(items) => items.iter().all(|c| c.eval_known(options)),
            Condition::Any(items) => items.iter().any(|c| c.eval_known(options)),
        }
    }

    /// Option names referenced by this expression, sorted
    pub fn options(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_options(&mut names);
        names
    }

    fn collect_options<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Flag(name) => {
                names.insert(name.as_str());
            }
            Condition::Not(inner) => inner.collect_options(names),
            Condition::All(items) | Condition::Any(items) => {
                for item in items {
                    item.collect_options(names);
                }
            }
        }
    }
}

fn collapse(mut items: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Flag(name) => write!(f, "{}", name),
            Condition::Not(inner) => write!(f, "!{}", inner),
            Condition::All(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" && "))
            }
            Condition::Any(items) => {
                let parts: Vec<String> = items.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, bool)]) -> OptionSet {
        let mut set = OptionSet::new();
        for (name, value) in pairs {
            set.set(*name, *value);
        }
        set
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(
            Condition::parse("with-python").unwrap(),
            Condition::Flag("with-python".to_string())
        );
    }

    #[test]
    fn test_without_is_negation() {
        let cond = Condition::parse("without-python").unwrap();
        assert_eq!(
            cond,
            Condition::Not(Box::new(Condition::Flag("with-python".to_string())))
        );
        assert_eq!(cond, Condition::parse("!with-python").unwrap());
    }

    #[test]
    fn test_precedence() {
        let cond = Condition::parse("with-a || with-b && !with-c").unwrap();
        assert_eq!(
            cond,
            Condition::Any(vec![
                Condition::Flag("with-a".to_string()),
                Condition::All(vec![
                    Condition::Flag("with-b".to_string()),
                    Condition::Not(Box::new(Condition::Flag("with-c".to_string()))),
                ]),
            ])
        );
        assert_eq!(cond.to_string(), "with-a || with-b && !with-c");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Condition::parse("").is_err());
        assert!(Condition::parse("   ").is_err());
        assert!(Condition::parse("!").is_err());
        assert!(Condition::parse("with-a &&").is_err());
        assert!(Condition::parse("(with-a)").is_err());
        assert!(Condition::parse("with a").is_err());
    }

    #[test]
    fn test_evaluate() {
        let set = opts(&[("with-python", true), ("with-docs", false)]);

        assert!(Condition::parse("with-python").unwrap().evaluate(&set).unwrap());
        assert!(!Condition::parse("without-python").unwrap().evaluate(&set).unwrap());
        assert!(!Condition::parse("with-python && with-docs").unwrap().evaluate(&set).unwrap());
        assert!(Condition::parse("with-docs || with-python").unwrap().evaluate(&set).unwrap());
    }

    #[test]
    fn test_evaluate_unknown_option() {
        let set = opts(&[("with-python", true)]);
        let cond = Condition::parse("with-python || with-boost").unwrap();
        assert_eq!(
            cond.evaluate(&set),
            Err(UnknownOption("with-boost".to_string()))
        );
    }

    #[test]
    fn test_referenced_options() {
        let cond = Condition::parse("with-b || !with-a && without-c").unwrap();
        let names: Vec<&str> = cond.options().into_iter().collect();
        assert_eq!(names, vec!["with-a", "with-b", "with-c"]);
    }
}
