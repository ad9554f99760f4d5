//! Plist dict → raw rule tree, before any `include`/`$self`/`$base`/`#key`
//! resolution happens.
//!
//! Shaped like the teacher's original `syntax_compiler::parse::Rule`, but
//! built directly from [`crate::plist::Value`] the way `makeRule` in
//! `examples/original_source/src/grammar.cpp` builds a `RuleData` tree from a
//! `QVariantMap`, instead of deriving a `serde` deserializer over JSON (this
//! crate's grammar/theme format is plist XML — see `SPEC_FULL.md` §4.1/§6).

use std::collections::HashMap;

use crate::plist::Value;

/// One unresolved rule dict: a match rule, a begin/end rule, a pure include,
/// or a container of `patterns` — the four shapes spec §3 describes for
/// "Rule", still tangled together here exactly as the plist leaves them.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawRule {
    pub(crate) include: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) content_name: Option<String>,
    pub(crate) match_pattern: Option<String>,
    pub(crate) captures: Option<RawCaptures>,
    pub(crate) begin_pattern: Option<String>,
    pub(crate) begin_captures: Option<RawCaptures>,
    pub(crate) end_pattern: Option<String>,
    pub(crate) end_captures: Option<RawCaptures>,
    pub(crate) patterns: Option<Vec<RawRule>>,
    pub(crate) repository: Option<HashMap<String, RawRule>>,
}

/// Capture index (as written in the plist, e.g. `"1"`) to the rule used for
/// naming that capture group.
pub(crate) type RawCaptures = HashMap<String, RawRule>;

/// A fully parsed but unresolved grammar: scope name, top-level patterns,
/// and a repository of named rules.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawSyntax {
    pub(crate) scope_name: String,
    pub(crate) file_types: Vec<String>,
    pub(crate) patterns: Vec<RawRule>,
    pub(crate) repository: HashMap<String, RawRule>,
}

pub(crate) fn syntax_from_value(value: &Value) -> RawSyntax {
    RawSyntax {
        scope_name: value.get_str("scopeName").unwrap_or_default().to_string(),
        file_types: value
            .get_array("fileTypes")
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        patterns: value
            .get_array("patterns")
            .map(|items| items.iter().map(rule_from_value).collect())
            .unwrap_or_default(),
        repository: value.get_dict("repository").map(repository_from_dict).unwrap_or_default(),
    }
}

fn rule_from_value(value: &Value) -> RawRule {
    let name = value.get_str("name").map(str::to_string);
    // An omitted contentName defaults to the rule's own name (resolved open
    // question, SPEC_FULL.md §9): a begin/end rule with no separate
    // contentName scopes its interior the same as its boundary.
    let content_name = value
        .get_str("contentName")
        .map(str::to_string)
        .or_else(|| name.clone());

    RawRule {
        include: value.get_str("include").map(str::to_string),
        name,
        content_name,
        match_pattern: value.get_str("match").map(str::to_string),
        captures: value.get_dict("captures").map(captures_from_dict),
        begin_pattern: value.get_str("begin").map(str::to_string),
        begin_captures: value.get_dict("beginCaptures").map(captures_from_dict),
        end_pattern: value.get_str("end").map(str::to_string),
        end_captures: value.get_dict("endCaptures").map(captures_from_dict),
        patterns: value
            .get_array("patterns")
            .map(|items| items.iter().map(rule_from_value).collect()),
        repository: value.get_dict("repository").map(repository_from_dict),
    }
}

fn captures_from_dict(dict: &HashMap<String, Value>) -> RawCaptures {
    dict.iter().map(|(index, rule)| (index.clone(), rule_from_value(rule))).collect()
}

fn repository_from_dict(dict: &HashMap<String, Value>) -> HashMap<String, RawRule> {
    dict.iter().map(|(key, rule)| (key.clone(), rule_from_value(rule))).collect()
}
