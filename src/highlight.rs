//! The per-line block highlighter (spec §3 "Context item", §4.6).
//!
//! Ported from `Highlighter::highlightBlock`/`HighlighterPrivate::searchPatterns`
//! in `examples/original_source/src/highlighter.cpp`: a persistent context
//! stack carried line to line, re-searching the current context's `end`
//! pattern and every reachable descendant `begin`/`match` pattern at each
//! cursor position, taking whichever starts earliest with `end` winning
//! ties (computed first, only displaced by a strictly earlier match).

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::grammar::{Grammar, RuleId, RuleNode};
use crate::regex::{self, CompiledRegex, Match};
use crate::scope::ScopePath;
use crate::style::Style;
use crate::theme::Theme;

/// One styled run of text within a line, byte-offset based (spec §9: UTF-8
/// byte offsets, not the original's UTF-16 code units).
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
    pub style: Style,
    /// The full scope path active when this span was emitted, space
    /// joined, outermost first — handy for tooltips/debugging.
    pub scope: String,
}

/// One still-open `begin`/`end` context, carried across the line boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenContext {
    rule: RuleId,
    /// The `end` pattern text after `\0`..`\9` back-reference substitution
    /// against the `begin` match that opened this context. Recompiled at
    /// the start of each line rather than kept as a live `CompiledRegex`,
    /// trading a little redundant compilation for a plain, `Send + Sync`,
    /// trivially comparable state type.
    end_source: String,
    content_pushed: bool,
}

/// Everything that needs to survive from one line to the next: the open
/// context stack (beyond the always-present grammar root) and the scope
/// path accumulated so far. An empty `BlockState` means "nothing open",
/// i.e. the next line starts fresh (spec §3, "Block state").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    open: Vec<OpenContext>,
    path: Vec<String>,
}

impl BlockState {
    pub fn initial() -> Self {
        Self::default()
    }

    /// Whether any context besides the grammar root is still open.
    pub fn is_fresh(&self) -> bool {
        self.open.is_empty()
    }
}

struct RuntimeContext {
    rule: RuleId,
    end: Option<CompiledRegex>,
    end_source: String,
    content_pushed: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Label {
    Normal,
    Begin,
    End,
}

type Found = (usize, Label, RuleId, Match);

/// Tokenizes one line of text against a grammar and theme, given the
/// [`BlockState`] left over from the previous line (or `None` for the first
/// line of a document). Returns the emitted spans, the state to carry into
/// the next line, and a hash of that state (spec §4.6, "State hashing") for
/// cheap equality checks by callers doing incremental re-highlighting.
pub struct Highlighter<'g> {
    grammar: &'g Grammar,
    theme: &'g Theme,
}

impl<'g> Highlighter<'g> {
    pub fn new(grammar: &'g Grammar, theme: &'g Theme) -> Self {
        Self { grammar, theme }
    }

    pub fn highlight_line(&self, text: &str, prev: Option<&BlockState>) -> (Vec<Span>, BlockState, u64) {
        let mut stack: Vec<RuntimeContext> = vec![RuntimeContext {
            rule: self.grammar.root(),
            end: None,
            end_source: String::new(),
            content_pushed: false,
        }];
        let mut path = ScopePath::new();

        if let Some(prev) = prev {
            for ctx in &prev.open {
                stack.push(RuntimeContext {
                    rule: ctx.rule,
                    end: Some(CompiledRegex::compile(&ctx.end_source)),
                    end_source: ctx.end_source.clone(),
                    content_pushed: ctx.content_pushed,
                });
            }
            path = ScopePath::from_tokens(prev.path.clone());
        }

        let mut spans = Vec::new();
        let mut cursor = 0usize;
        let len = text.len();

        loop {
            let found = self.find_next(&stack, text, cursor, len);

            let Some((start, label, rule_id, matched)) = found else {
                if cursor < len {
                    let style = self.theme.find_style(&path);
                    spans.push(Span { start: cursor, len: len - cursor, style, scope: path.to_display() });
                }
                break;
            };

            if start > cursor {
                let style = self.theme.find_style(&path);
                spans.push(Span { start: cursor, len: start - cursor, style, scope: path.to_display() });
            }

            match label {
                Label::End => self.apply_end(&mut stack, &mut path, &matched, &mut spans),
                Label::Begin => self.apply_begin(&mut stack, &mut path, rule_id, &matched, text, &mut spans),
                Label::Normal => self.apply_normal(&mut path, rule_id, &matched, &mut spans),
            }

            let matched_len = matched.len(0).unwrap_or(0);
            if matched_len == 0 {
                let char_len = text[start..].chars().next().map(char::len_utf8).unwrap_or(1);
                let filler_len = char_len.min(len - start);
                if filler_len > 0 {
                    let style = self.theme.find_style(&path);
                    spans.push(Span { start, len: filler_len, style, scope: path.to_display() });
                }
                cursor = (start + char_len).min(len);
                if cursor == start {
                    // already at end of line; nothing left to search
                    break;
                }
            } else {
                cursor = start + matched_len;
            }
        }

        let open: Vec<OpenContext> = stack[1..]
            .iter()
            .map(|ctx| OpenContext {
                rule: ctx.rule,
                end_source: ctx.end_source.clone(),
                content_pushed: ctx.content_pushed,
            })
            .collect();
        let path_tokens = path.into_tokens();
        let hash = compute_hash(&open, &path_tokens, self.grammar);
        let next_state = BlockState { open, path: path_tokens };

        (spans, next_state, hash)
    }

    fn find_next(&self, stack: &[RuntimeContext], text: &str, cursor: usize, len: usize) -> Option<Found> {
        let top = stack.last().expect("context stack always has at least the grammar root");
        let mut found: Option<Found> = None;

        if let Some(end_re) = &top.end {
            if let Some(m) = end_re.search(text, cursor, len) {
                found = Some((m.start(0).unwrap(), Label::End, top.rule, m));
            }
        }

        if found.as_ref().map(|(start, ..)| *start) != Some(cursor) {
            let mut visited = HashSet::new();
            self.search_descendants(top.rule, text, cursor, len, &mut visited, &mut found);
        }

        found
    }

    fn search_descendants(
        &self,
        rule_id: RuleId,
        text: &str,
        from: usize,
        limit: usize,
        visited: &mut HashSet<RuleId>,
        found: &mut Option<Found>,
    ) {
        if !visited.insert(rule_id) {
            return;
        }
        match self.grammar.rule(rule_id) {
            RuleNode::Match(m) => {
                if let Some(matched) = m.pattern.search(text, from, limit) {
                    consider(found, matched.start(0).unwrap(), Label::Normal, rule_id, matched);
                }
            }
            RuleNode::Range(r) => {
                if let Some(matched) = r.begin.search(text, from, limit) {
                    consider(found, matched.start(0).unwrap(), Label::Begin, rule_id, matched);
                }
            }
            RuleNode::Container(c) => {
                for &child in &c.patterns {
                    self.search_descendants(child, text, from, limit, visited, found);
                    if found.as_ref().map(|(start, ..)| *start) == Some(from) {
                        return;
                    }
                }
            }
        }
    }

    fn apply_normal(&self, path: &mut ScopePath, rule_id: RuleId, matched: &Match, spans: &mut Vec<Span>) {
        let RuleNode::Match(rule) = self.grammar.rule(rule_id) else {
            unreachable!("Label::Normal always resolves to a match rule")
        };
        let pushed = path.push(rule.name.as_deref().unwrap_or(""));
        let style = self.theme.find_style(path);
        self.emit_matched_region(
            path,
            style,
            matched.start(0).unwrap(),
            matched.end(0).unwrap(),
            &rule.captures,
            matched,
            spans,
        );
        path.pop_if(pushed);
    }

    fn apply_begin(
        &self,
        stack: &mut Vec<RuntimeContext>,
        path: &mut ScopePath,
        rule_id: RuleId,
        matched: &Match,
        text: &str,
        spans: &mut Vec<Span>,
    ) {
        let RuleNode::Range(rule) = self.grammar.rule(rule_id) else {
            unreachable!("Label::Begin always resolves to a range rule")
        };
        let name_pushed = path.push(rule.name.as_deref().unwrap_or(""));
        let style = self.theme.find_style(path);
        self.emit_matched_region(
            path,
            style,
            matched.start(0).unwrap(),
            matched.end(0).unwrap(),
            &rule.begin_captures,
            matched,
            spans,
        );
        path.pop_if(name_pushed);

        let end_source = regex::substitute_backreferences(&rule.end_source, matched, text);
        let content_pushed = path.push(rule.content_name.as_deref().unwrap_or(""));
        stack.push(RuntimeContext {
            rule: rule_id,
            end: Some(CompiledRegex::compile(&end_source)),
            end_source,
            content_pushed,
        });
    }

    fn apply_end(&self, stack: &mut Vec<RuntimeContext>, path: &mut ScopePath, matched: &Match, spans: &mut Vec<Span>) {
        let ctx = stack.pop().expect("End only matches a context that is on the stack");
        path.pop_if(ctx.content_pushed);

        let RuleNode::Range(rule) = self.grammar.rule(ctx.rule) else {
            unreachable!("a pushed context always names a range rule")
        };
        let name_pushed = path.push(rule.name.as_deref().unwrap_or(""));
        let style = self.theme.find_style(path);
        self.emit_matched_region(
            path,
            style,
            matched.start(0).unwrap(),
            matched.end(0).unwrap(),
            &rule.end_captures,
            matched,
            spans,
        );
        path.pop_if(name_pushed);
    }

    /// Emits spans covering exactly `[match_start, match_end)`: each capture
    /// group gets its own (narrower, differently scoped) span, and whatever
    /// the captures don't cover is styled with `base_style` — so captures
    /// split the matched region into a partition rather than layering an
    /// overlapping span on top of it (spec §4.6.d, §8 invariant 1).
    fn emit_matched_region(
        &self,
        path: &mut ScopePath,
        base_style: Style,
        match_start: usize,
        match_end: usize,
        captures: &[Option<RuleId>],
        matched: &Match,
        spans: &mut Vec<Span>,
    ) {
        let mut captured: Vec<(usize, usize, Style, String)> = Vec::new();
        for group in 1..matched.group_count() {
            if !matched.matched(group) {
                continue;
            }
            let Some(rule_id) = captures.get(group).copied().flatten() else { continue };
            let name = self.grammar.rule(rule_id).name().unwrap_or("");
            let pushed = path.push(name);
            let style = self.theme.find_style(path);
            let scope = path.to_display();
            path.pop_if(pushed);

            let (s, e) = (matched.start(group).unwrap(), matched.end(group).unwrap());
            if e > s {
                captured.push((s, e, style, scope));
            }
        }
        captured.sort_by_key(|(s, ..)| *s);

        let mut cursor = match_start;
        for (s, e, style, scope) in captured {
            let s = s.clamp(cursor, match_end);
            let e = e.clamp(s, match_end);
            if s > cursor {
                spans.push(Span { start: cursor, len: s - cursor, style: base_style.clone(), scope: path.to_display() });
            }
            if e > s {
                spans.push(Span { start: s, len: e - s, style, scope });
            }
            cursor = cursor.max(e);
        }
        if match_end > cursor {
            spans.push(Span { start: cursor, len: match_end - cursor, style: base_style, scope: path.to_display() });
        }
    }
}

fn consider(found: &mut Option<Found>, start: usize, label: Label, rule_id: RuleId, matched: Match) {
    let better = match found {
        None => true,
        Some((existing_start, ..)) => start < *existing_start,
    };
    if better {
        *found = Some((start, label, rule_id, matched));
    }
}

fn compute_hash(open: &[OpenContext], path: &[String], grammar: &Grammar) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for ctx in open {
        let begin_source = match grammar.rule(ctx.rule) {
            RuleNode::Range(r) => r.begin.source(),
            _ => "",
        };
        begin_source.hash(&mut hasher);
        ctx.end_source.hash(&mut hasher);
        ctx.content_pushed.hash(&mut hasher);
    }
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn grammar_and_theme(grammar_xml: &str, theme_xml: &str) -> (Grammar, Theme) {
        let mut table = HashMap::new();
        table.insert("source.test".to_string(), crate::plist::parse_str(grammar_xml).unwrap());
        let grammar = Grammar::compile(&table, "source.test").unwrap();
        let theme = Theme::from_plist(&crate::plist::parse_str(theme_xml).unwrap());
        (grammar, theme)
    }

    const NO_THEME: &str = "<plist><dict><key>settings</key><array></array></dict></plist>";

    #[test]
    fn single_line_match_rule_produces_one_named_span() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>keyword.control.test</string>
                    <key>match</key><string>\bif\b</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);
        let (spans, state, _hash) = highlighter.highlight_line("if true", None);

        assert!(spans.iter().any(|s| s.scope == "keyword.control.test" && s.start == 0 && s.len == 2));
        assert!(state.is_fresh());
    }

    #[test]
    fn begin_end_rule_spans_multiple_lines() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>comment.block.test</string>
                    <key>begin</key><string>/\*</string>
                    <key>end</key><string>\*/</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);

        let (spans1, state1, _) = highlighter.highlight_line("/* start", None);
        assert!(!state1.is_fresh());
        assert!(spans1.iter().any(|s| s.scope.contains("comment.block.test")));

        let (spans2, state2, _) = highlighter.highlight_line("still inside */ done", Some(&state1));
        assert!(state2.is_fresh());
        assert!(spans2.iter().any(|s| s.start == 0 && s.scope.contains("comment.block.test")));
    }

    #[test]
    fn end_pattern_backreferences_the_begin_match() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>string.quoted.heredoc.test</string>
                    <key>begin</key><string>&lt;&lt;(\w+)</string>
                    <key>end</key><string>^\1$</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);

        let (_, state1, _) = highlighter.highlight_line("<<END", None);
        assert!(!state1.is_fresh());
        let (_, state2, _) = highlighter.highlight_line("not the end yet", Some(&state1));
        assert!(!state2.is_fresh());
        let (spans3, state3, _) = highlighter.highlight_line("END", Some(&state2));
        assert!(state3.is_fresh());
        assert!(spans3.iter().any(|s| s.scope.contains("string.quoted.heredoc.test")));
    }

    #[test]
    fn empty_line_emits_no_spans_and_preserves_state() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>comment.block.test</string>
                    <key>begin</key><string>/\*</string>
                    <key>end</key><string>\*/</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);
        let (_, state1, _) = highlighter.highlight_line("/* open", None);
        let (spans, state2, _) = highlighter.highlight_line("", Some(&state1));
        assert!(spans.is_empty());
        assert_eq!(state1, state2);
    }

    #[test]
    fn identical_states_hash_identically() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>comment.block.test</string>
                    <key>begin</key><string>/\*</string>
                    <key>end</key><string>\*/</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);
        let (_, _, hash_a) = highlighter.highlight_line("/* open", None);
        let (_, _, hash_b) = highlighter.highlight_line("/* open", None);
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn spans_partition_the_line_with_no_gaps_or_overlaps() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>name</key><string>keyword.control.test</string>
                    <key>match</key><string>\bif\b</string></dict>
                <dict><key>name</key><string>constant.numeric.test</string>
                    <key>match</key><string>\d+</string></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);
        let text = "if 123 then 456";
        let (spans, _, _) = highlighter.highlight_line(text, None);

        let mut cursor = 0;
        for span in &spans {
            assert_eq!(span.start, cursor, "spans must tile the line with no gap or overlap");
            cursor += span.len;
        }
        assert_eq!(cursor, text.len());
    }

    #[test]
    fn captures_partition_the_matched_region_instead_of_overlapping_it() {
        let grammar_xml = r#"<plist><dict>
            <key>scopeName</key><string>source.test</string>
            <key>patterns</key><array>
                <dict><key>match</key><string>(\w+)=(\w+)</string>
                    <key>name</key><string>meta.assignment.test</string>
                    <key>captures</key><dict>
                        <key>1</key><dict><key>name</key><string>variable.other.test</string></dict>
                        <key>2</key><dict><key>name</key><string>constant.other.test</string></dict>
                    </dict></dict>
            </array>
        </dict></plist>"#;
        let (grammar, theme) = grammar_and_theme(grammar_xml, NO_THEME);
        let highlighter = Highlighter::new(&grammar, &theme);
        let text = "key=value";
        let (spans, _, _) = highlighter.highlight_line(text, None);

        let mut cursor = 0;
        for span in &spans {
            assert_eq!(span.start, cursor);
            cursor += span.len;
        }
        assert_eq!(cursor, text.len());
        assert!(spans.iter().any(|s| s.scope.contains("variable.other.test")));
        assert!(spans.iter().any(|s| s.scope.contains("constant.other.test")));
    }
}
