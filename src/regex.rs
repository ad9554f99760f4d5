//! Thin facade over an Oniguruma-compatible regex engine.
//!
//! Grounded on `examples/original_source/src/regex.{h,cpp}` (`Regex`/`Match`,
//! wrapping `onig_new`/`onig_search`/`OnigRegion`). The teacher crate already
//! pins the `onig` dependency but never calls into it; this module is where
//! it actually gets wired up.
//!
//! Offsets here are UTF-8 byte offsets into the `&str` that was searched
//! (the original used UTF-16 code-unit offsets into a `QString`) — see
//! `SPEC_FULL.md` §9 for the resolved open question.

/// A compiled pattern. Compilation never fails loudly: an invalid pattern
/// is recorded (via `tracing::warn!`) and the regex is simply never matched
/// again, so a single malformed rule in a grammar degrades gracefully
/// instead of aborting highlighting (spec §7, `RegexCompile`).
pub struct CompiledRegex {
    source: String,
    inner: Option<onig::Regex>,
}

impl std::fmt::Debug for CompiledRegex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRegex")
            .field("source", &self.source)
            .field("valid", &self.inner.is_some())
            .finish()
    }
}

impl Clone for CompiledRegex {
    fn clone(&self) -> Self {
        Self::compile(&self.source)
    }
}

impl CompiledRegex {
    pub fn compile(source: &str) -> Self {
        match onig::Regex::new(source) {
            Ok(inner) => Self {
                source: source.to_string(),
                inner: Some(inner),
            },
            Err(err) => {
                tracing::warn!(pattern = source, error = %err, "regex failed to compile, rule will be skipped");
                Self {
                    source: source.to_string(),
                    inner: None,
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Searches for this pattern within `haystack`, starting the search at
    /// byte offset `from` and not allowing the match to start past byte
    /// offset `limit`. `haystack` itself provides the outer window for
    /// look-around/anchors (spec §4.2's `haystack_base`/`haystack_end`).
    pub fn search(&self, haystack: &str, from: usize, limit: usize) -> Option<Match> {
        let inner = self.inner.as_ref()?;
        let mut region = onig::Region::new();
        inner.search_with_options(
            haystack,
            from,
            limit,
            onig::SearchOptions::SEARCH_OPTION_NONE,
            Some(&mut region),
        )?;
        let groups = (0..region.len()).map(|i| region.pos(i)).collect();
        Some(Match { groups })
    }
}

/// A successful search result: per-capture-group start/length, 0 being the
/// whole match. Mirrors `examples/original_source/src/regex.h`'s `Match`.
#[derive(Debug, Clone)]
pub struct Match {
    groups: Vec<Option<(usize, usize)>>,
}

impl Match {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn matched(&self, group: usize) -> bool {
        self.groups.get(group).is_some_and(Option::is_some)
    }

    pub fn start(&self, group: usize) -> Option<usize> {
        self.groups.get(group).copied().flatten().map(|(s, _)| s)
    }

    pub fn end(&self, group: usize) -> Option<usize> {
        self.groups.get(group).copied().flatten().map(|(_, e)| e)
    }

    pub fn len(&self, group: usize) -> Option<usize> {
        let (s, e) = self.groups.get(group).copied().flatten()?;
        Some(e - s)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn text<'t>(&self, group: usize, haystack: &'t str) -> Option<&'t str> {
        let (s, e) = self.groups.get(group).copied().flatten()?;
        haystack.get(s..e)
    }
}

/// Textually substitutes `\0`..`\9` in `template` with the corresponding
/// capture group text from `begin_match`, the way `end`/`while` patterns
/// refer back to their opening `begin` match (spec §3, "Context item").
///
/// Ported from `examples/original_source/src/highlighter.cpp`'s
/// `formatEndPattern`: a plain sequential string replace, in ascending
/// group-index order, with the same quirk the original has (a capture's own
/// text can itself contain a `\N` marker that a later substitution then
/// rewrites) — kept rather than "fixed" since grammars in the wild are
/// written against this exact behavior.
pub fn substitute_backreferences(template: &str, begin_match: &Match, haystack: &str) -> String {
    let mut result = template.to_string();
    let count = begin_match.group_count().min(10);
    for i in 0..count {
        let marker = format!("\\{i}");
        if let Some(text) = begin_match.text(i, haystack) {
            result = result.replace(&marker, text);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_matches_simple_pattern() {
        let re = CompiledRegex::compile(r"a|b|c");
        assert!(re.is_valid());
        let m = re.search("xbc", 0, 3).unwrap();
        assert_eq!(m.start(0), Some(1));
        assert_eq!(m.len(0), Some(1));
        assert_eq!(m.text(0, "xbc"), Some("b"));
    }

    #[test]
    fn invalid_pattern_is_marked_invalid_not_fatal() {
        let re = CompiledRegex::compile(r"(unclosed");
        assert!(!re.is_valid());
        assert_eq!(re.search("anything", 0, 8), None);
    }

    #[test]
    fn search_respects_from_and_limit() {
        let re = CompiledRegex::compile(r"\d+");
        assert!(re.search("12 34", 3, 5).is_some());
        assert_eq!(re.search("12 34", 0, 2).unwrap().start(0), Some(0));
    }

    #[test]
    fn capture_groups_are_reported() {
        let re = CompiledRegex::compile(r"(\w+)=(\w+)");
        let m = re.search("key=value", 0, 9).unwrap();
        assert_eq!(m.text(1, "key=value"), Some("key"));
        assert_eq!(m.text(2, "key=value"), Some("value"));
    }

    #[test]
    fn backreference_substitution_matches_heredoc_shape() {
        let begin = CompiledRegex::compile(r"<<(\w+)");
        let haystack = "<<END";
        let m = begin.search(haystack, 0, haystack.len()).unwrap();
        let end = substitute_backreferences(r"^\1$", &m, haystack);
        assert_eq!(end, "^END$");
    }
}
