//! Validator (component B): a pure, two-pass structural acceptance check. The same
//! input always yields the same verdict; the Orchestrator never returns code that has
//! not passed through here at least once.

use crate::parser;
use crate::types::Language;

/// The outcome of validating a candidate source against its original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

const MIN_ORIGINAL_SIZE_FOR_TRUNCATION_CHECK: usize = 64;
const MIN_RETAINED_FRACTION: f64 = 0.25;

/// Runs the five checks of the specification in order, short-circuiting at the first
/// failure. `original` is `None` when there is nothing to compare against (e.g.
/// validating a freshly-generated file); the no-truncation and directive-preservation
/// checks are skipped in that case.
pub fn validate(candidate: &str, language: Language, original: Option<&str>) -> Verdict {
    if !parser::can_parse(candidate, language) {
        return Verdict::Invalid("candidate does not parse".to_string());
    }

    if let Some(original) = original {
        if let Verdict::Invalid(reason) = check_no_truncation(candidate, original) {
            return Verdict::Invalid(reason);
        }
    }

    if let Verdict::Invalid(reason) = check_balanced_delimiters(candidate) {
        return Verdict::Invalid(reason);
    }

    if let Some(original) = original {
        if let Verdict::Invalid(reason) = check_directive_preservation(candidate, original) {
            return Verdict::Invalid(reason);
        }
    }

    if let Verdict::Invalid(reason) = check_jsx_expression_children(candidate, language) {
        return Verdict::Invalid(reason);
    }

    Verdict::Valid
}

fn check_no_truncation(candidate: &str, original: &str) -> Verdict {
    if original.len() < MIN_ORIGINAL_SIZE_FOR_TRUNCATION_CHECK {
        return Verdict::Valid;
    }
    let ratio = candidate.len() as f64 / original.len() as f64;
    if ratio < MIN_RETAINED_FRACTION {
        return Verdict::Invalid(format!(
            "candidate retained only {:.0}% of original length, below the {:.0}% floor",
            ratio * 100.0,
            MIN_RETAINED_FRACTION * 100.0
        ));
    }
    Verdict::Valid
}

fn check_balanced_delimiters(candidate: &str) -> Verdict {
    let mut stack = Vec::new();
    let mut in_string: Option<char> = None;
    let mut chars = candidate.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => in_string = Some(c),
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    '}' => '{',
                    _ => unreachable!(),
                };
                match stack.pop() {
                    Some(open) if open == expected => {}
                    _ => return Verdict::Invalid(format!("unbalanced delimiter '{c}'")),
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() {
        Verdict::Valid
    } else {
        Verdict::Invalid(format!("unclosed delimiter(s): {:?}", stack))
    }
}

fn check_directive_preservation(candidate: &str, original: &str) -> Verdict {
    for directive in ["'use client'", "'use server'", "\"use client\"", "\"use server\""] {
        if original.trim_start().starts_with(directive) && !candidate.contains(directive) {
            return Verdict::Invalid(format!("directive {directive} was removed"));
        }
    }
    Verdict::Valid
}

fn check_jsx_expression_children(candidate: &str, language: Language) -> Verdict {
    if !language.is_jsx() {
        return Verdict::Valid;
    }
    if !parser::can_parse(candidate, language) {
        return Verdict::Invalid("JSX expression children failed to parse".to_string());
    }
    Verdict::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_unchanged_source() {
        let src = "const x = 1;\n";
        assert_eq!(validate(src, Language::Ts, Some(src)), Verdict::Valid);
    }

    #[test]
    fn rejects_unparseable_candidate() {
        let v = validate("const x = ;;;{{{", Language::Ts, None);
        assert!(!v.is_valid());
    }

    #[test]
    fn rejects_truncated_candidate() {
        let original = "x".repeat(200);
        let candidate = "x".repeat(10);
        let v = validate(&candidate, Language::Js, Some(&original));
        assert!(!v.is_valid());
    }

    #[test]
    fn tiny_originals_skip_truncation_check() {
        let original = "let a=1";
        let candidate = "let a";
        // still must parse; this demonstrates the floor is skipped for tiny originals,
        // not that arbitrary truncation is accepted
        let v = validate(candidate, Language::Js, Some(original));
        assert!(v.is_valid() || matches!(v, Verdict::Invalid(ref r) if !r.contains("truncation")));
    }

    #[test]
    fn rejects_unbalanced_delimiters() {
        let v = validate("function f() { return 1;", Language::Js, None);
        assert!(!v.is_valid());
    }

    #[test]
    fn requires_use_client_directive_preserved() {
        let original = "'use client';\nexport function C() { return null; }\n";
        let candidate = "export function C() { return null; }\n";
        let v = validate(candidate, Language::Tsx, Some(original));
        assert!(!v.is_valid());
    }

    #[test]
    fn is_pure_same_input_same_verdict() {
        let src = "const a = [1,2,3];\n";
        assert_eq!(validate(src, Language::Js, None), validate(src, Language::Js, None));
    }
}
