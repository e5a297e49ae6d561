//! Source Parser & Printer (component A): parses TS/JSX/JS/JSON into an oxc AST and
//! regenerates source from it. `print(parse(s))` is a right-inverse of `parse` for
//! unmodified trees, up to insignificant whitespace; oxc's codegen preserves comments
//! in significant positions.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::{Error, Result};
use crate::types::Language;

/// A stable taxonomy of AST node kinds, independent of oxc's own enum shape, used by
/// the diff engine and the adaptive layer's structural rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    ImportDecl,
    CallExpr,
    MemberExpr,
    JsxElement,
    JsxAttribute,
    ObjectLit,
    Property,
    FunctionDecl,
    ArrowFunction,
    VariableDecl,
    Identifier,
    Literal,
    Other,
}

/// Parses `source` as `language`, returning the printed (re-serialized) form plus
/// whether parsing reported any errors. The crate holds no owned AST across calls —
/// oxc's allocator-scoped `Program` cannot outlive the allocator, so every caller that
/// needs to both parse and inspect a tree does so within one `with_ast` call.
pub fn parse_and_print(source: &str, language: Language, file: &std::path::Path) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = source_type_for(language);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if let Some(first) = ret.errors.first() {
        return Err(Error::parse(file.to_path_buf(), 0, 0, first.to_string()));
    }

    let printed = Codegen::new().with_options(CodegenOptions::default()).build(&ret.program).code;
    Ok(printed)
}

/// Validates that `source` parses under `language` without producing a printed form;
/// used by the Validator's parse check, which only needs a yes/no answer.
pub fn can_parse(source: &str, language: Language) -> bool {
    let allocator = Allocator::default();
    let source_type = source_type_for(language);
    let ret = Parser::new(&allocator, source, source_type).parse();
    ret.errors.is_empty()
}

/// Runs `f` with a freshly parsed AST for `source`, inside a scope bounded by the
/// allocator backing it. Layers that need to inspect or transform the tree (rather
/// than just validate or re-print it) go through this entry point.
pub fn with_ast<R>(source: &str, language: Language, f: impl FnOnce(&oxc_ast::ast::Program) -> R) -> Result<R> {
    let allocator = Allocator::default();
    let source_type = source_type_for(language);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(first) = ret.errors.first() {
        return Err(Error::parse(std::path::PathBuf::new(), 0, 0, first.to_string()));
    }
    Ok(f(&ret.program))
}

/// Prints a previously-parsed program back to source. Exposed separately from
/// `parse_and_print` so transforming layers can parse once, mutate, then print.
pub fn print(program: &oxc_ast::ast::Program) -> String {
    Codegen::new().with_options(CodegenOptions::default()).build(program).code
}

fn source_type_for(language: Language) -> SourceType {
    match language {
        Language::Ts => SourceType::ts(),
        Language::Tsx => SourceType::tsx(),
        Language::Js => SourceType::mjs(),
        Language::Jsx => SourceType::jsx(),
        Language::Json | Language::Yaml | Language::Lock => SourceType::default(),
    }
}
