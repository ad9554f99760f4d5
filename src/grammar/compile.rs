//! Arena compiler: turns a [`raw::RawSyntax`] tree into a flat, fully
//! resolved [`Grammar`] with no unresolved `include` strings left anywhere.
//!
//! The arena/handle shape (`RuleId`, reserve-then-fill placeholders,
//! `RepositoryStack`) is kept from the teacher's `syntax_compiler::compile`.
//! What changes is resolution itself: the teacher left `$self`/`$base`/
//! `#key`/cross-grammar `include` as a `RuleIdOrReference` to be linked later
//! (`// todo: linker`, never implemented). This module finishes that job,
//! porting the eager, single-pass algorithm from `resolveChildRules` in
//! `examples/original_source/src/grammar.cpp`: build every repository
//! key's `RuleId` up front (so forward references and self-cycles resolve
//! immediately), then fill each key's body.

use std::collections::HashMap;

use snafu::prelude::*;

use super::raw::{self, RawRule, RawSyntax};
use crate::regex::CompiledRegex;

/// Grammar repositories may nest (a rule's own `repository` dict shadows its
/// ancestors'). This bounds how deep that nesting is allowed to go, mirroring
/// the teacher's `RepositoryStack` overflow guard.
const MAX_REPOSITORY_STACK_DEPTH: usize = 8;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "grammar repository nesting exceeds the maximum depth of {MAX_REPOSITORY_STACK_DEPTH}"
    ))]
    RepositoryStackOverflow,
    #[snafu(display("failed to parse capture index \"{index}\""))]
    UnparseableCaptureIndex {
        index: String,
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RuleId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RepositoryId(usize);

/// A capture map, index 0 unused: `captures[n]` is the rule naming capture
/// group `n`, if any.
pub(crate) type Captures = Vec<Option<RuleId>>;

#[derive(Debug, Clone)]
pub(crate) struct MatchRule {
    pub(crate) name: Option<String>,
    pub(crate) pattern: CompiledRegex,
    pub(crate) captures: Captures,
}

#[derive(Debug, Clone)]
pub(crate) struct RangeRule {
    pub(crate) name: Option<String>,
    pub(crate) content_name: Option<String>,
    pub(crate) begin: CompiledRegex,
    pub(crate) begin_captures: Captures,
    /// Raw `end` pattern text, before `\0`..`\9` back-reference substitution
    /// (substitution happens per-match against the actual `begin` capture
    /// text, not at compile time — spec §3 "Context item").
    pub(crate) end_source: String,
    pub(crate) end_captures: Captures,
    pub(crate) patterns: Vec<RuleId>,
}

#[derive(Debug, Clone)]
pub(crate) struct ContainerRule {
    pub(crate) name: Option<String>,
    pub(crate) content_name: Option<String>,
    pub(crate) patterns: Vec<RuleId>,
}

#[derive(Debug, Clone)]
pub(crate) enum RuleNode {
    Match(MatchRule),
    Range(RangeRule),
    Container(ContainerRule),
}

impl RuleNode {
    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            RuleNode::Match(r) => r.name.as_deref(),
            RuleNode::Range(r) => r.name.as_deref(),
            RuleNode::Container(r) => r.name.as_deref(),
        }
    }

    pub(crate) fn content_name(&self) -> Option<&str> {
        match self {
            RuleNode::Match(_) => None,
            RuleNode::Range(r) => r.content_name.as_deref(),
            RuleNode::Container(r) => r.content_name.as_deref(),
        }
    }
}

/// A fully compiled, self-contained grammar: a flat rule arena plus the id
/// of its root container rule.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) rules: Vec<RuleNode>,
    pub(crate) root: RuleId,
    scope_name: String,
}

impl Grammar {
    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub(crate) fn rule(&self, id: RuleId) -> &RuleNode {
        &self.rules[id.0]
    }

    pub(crate) fn root(&self) -> RuleId {
        self.root
    }

    fn empty(scope_name: &str) -> Self {
        Grammar {
            rules: vec![RuleNode::Container(ContainerRule {
                name: None,
                content_name: None,
                patterns: Vec::new(),
            })],
            root: RuleId(0),
            scope_name: scope_name.to_string(),
        }
    }

    /// Compiles `scope_name` out of `syntax_table` (every grammar that might
    /// be pulled in by a cross-grammar `include`, keyed by its own
    /// `scopeName`). Unknown scope names and unresolved `include`s never
    /// fail the compile; they are warned about and the edge is dropped
    /// (spec §7).
    pub fn compile(
        syntax_table: &HashMap<String, crate::plist::Value>,
        scope_name: &str,
    ) -> Result<Grammar, Error> {
        let parsed: HashMap<String, RawSyntax> = syntax_table
            .iter()
            .map(|(scope, value)| (scope.clone(), raw::syntax_from_value(value)))
            .collect();

        let mut compiler = Compiler {
            syntax_table: &parsed,
            rules: Vec::new(),
            repositories: Vec::new(),
            external: HashMap::new(),
        };

        match compiler.compile_grammar(scope_name, None)? {
            Some((root, _)) => {
                let rules = compiler
                    .rules
                    .into_iter()
                    .enumerate()
                    .map(|(i, rule)| {
                        rule.unwrap_or_else(|| panic!("rule {i} reserved but never filled"))
                    })
                    .collect();
                Ok(Grammar { rules, root, scope_name: scope_name.to_string() })
            }
            None => {
                tracing::warn!(scope_name, "requested grammar missing from syntax table");
                Ok(Grammar::empty(scope_name))
            }
        }
    }
}

/// A stack of in-scope repository levels, innermost last. Lookups walk it
/// from the end backward so a nested repository shadows an outer one.
#[derive(Debug, Clone, Default)]
struct RepoStack(Vec<RepositoryId>);

impl RepoStack {
    fn push(&self, id: RepositoryId) -> Result<RepoStack, Error> {
        ensure!(self.0.len() < MAX_REPOSITORY_STACK_DEPTH, RepositoryStackOverflowSnafu);
        let mut next = self.clone();
        next.0.push(id);
        Ok(next)
    }
}

struct Compiler<'a> {
    syntax_table: &'a HashMap<String, RawSyntax>,
    rules: Vec<Option<RuleNode>>,
    repositories: Vec<Option<HashMap<String, RuleId>>>,
    /// Cache of already-compiled grammars pulled in by scope name, so a
    /// cross-grammar `include` referencing the same scope twice (or in a
    /// mutual-recursion cycle) reuses the same subtree (spec §4.5).
    external: HashMap<String, (RuleId, Option<RepositoryId>)>,
}

impl<'a> Compiler<'a> {
    fn reserve(&mut self) -> RuleId {
        let id = RuleId(self.rules.len());
        self.rules.push(None);
        id
    }

    fn fill(&mut self, id: RuleId, node: RuleNode) {
        self.rules[id.0] = Some(node);
    }

    /// Compiles (or returns the cached compilation of) the grammar named
    /// `scope_name`. `base` is the `$base` target to use while compiling
    /// it — `None` means this is the originally requested grammar, whose
    /// own root becomes its own base.
    fn compile_grammar(
        &mut self,
        scope_name: &str,
        base: Option<RuleId>,
    ) -> Result<Option<(RuleId, Option<RepositoryId>)>, Error> {
        if let Some(&cached) = self.external.get(scope_name) {
            return Ok(Some(cached));
        }
        let Some(syntax) = self.syntax_table.get(scope_name) else {
            return Ok(None);
        };
        let syntax = syntax.clone();

        let new_id = self.reserve();
        let base = base.unwrap_or(new_id);
        // Cache before recursing: a grammar that (directly or through
        // another grammar) includes itself must see this placeholder
        // rather than recompile from scratch.
        self.external.insert(scope_name.to_string(), (new_id, None));

        let mut stack = RepoStack::default();
        let repo_id = if syntax.repository.is_empty() {
            None
        } else {
            let id = self.compile_repository(&syntax.repository, &stack, base, new_id)?;
            stack = stack.push(id)?;
            Some(id)
        };
        self.external.insert(scope_name.to_string(), (new_id, repo_id));

        let patterns = self.compile_pattern_list(&syntax.patterns, &stack, base, new_id)?;
        self.fill(
            new_id,
            RuleNode::Container(ContainerRule { name: None, content_name: None, patterns }),
        );

        Ok(Some((new_id, repo_id)))
    }

    /// Reserves an id for every key first (so siblings, and a key
    /// referencing itself, resolve immediately), then fills each body.
    fn compile_repository(
        &mut self,
        raw_repo: &HashMap<String, RawRule>,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<RepositoryId, Error> {
        let mut names: HashMap<String, RuleId> = HashMap::with_capacity(raw_repo.len());
        for key in raw_repo.keys() {
            names.insert(key.clone(), self.reserve());
        }
        let repo_id = RepositoryId(self.repositories.len());
        self.repositories.push(Some(names.clone()));
        let nested_stack = stack.push(repo_id)?;

        for (key, raw_rule) in raw_repo {
            let id = names[key];
            let node = self.build_rule_node(raw_rule, &nested_stack, base, self_id)?;
            self.fill(id, node);
        }
        Ok(repo_id)
    }

    /// Pushes `repo` (a rule's own nested `repository`, if it has one) as a
    /// new level on top of `stack`, or returns `stack` unchanged.
    fn push_nested_repository(
        &mut self,
        repo: Option<&HashMap<String, RawRule>>,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<RepoStack, Error> {
        match repo {
            Some(map) if !map.is_empty() => {
                let id = self.compile_repository(map, stack, base, self_id)?;
                stack.push(id)
            }
            _ => Ok(stack.clone()),
        }
    }

    fn compile_rule(
        &mut self,
        raw_rule: &RawRule,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<RuleId, Error> {
        let id = self.reserve();
        let node = self.build_rule_node(raw_rule, stack, base, self_id)?;
        self.fill(id, node);
        Ok(id)
    }

    fn build_rule_node(
        &mut self,
        raw_rule: &RawRule,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<RuleNode, Error> {
        if let Some(match_source) = &raw_rule.match_pattern {
            let captures = self.compile_captures(raw_rule.captures.as_ref(), stack, base, self_id)?;
            return Ok(RuleNode::Match(MatchRule {
                name: raw_rule.name.clone(),
                pattern: CompiledRegex::compile(match_source),
                captures,
            }));
        }

        if let Some(begin_source) = &raw_rule.begin_pattern {
            let begin_captures = self.compile_captures(
                raw_rule.begin_captures.as_ref().or(raw_rule.captures.as_ref()),
                stack,
                base,
                self_id,
            )?;
            let end_captures = self.compile_captures(
                raw_rule.end_captures.as_ref().or(raw_rule.captures.as_ref()),
                stack,
                base,
                self_id,
            )?;
            let Some(end_source) = raw_rule.end_pattern.clone() else {
                tracing::warn!(name = raw_rule.name.as_deref().unwrap_or(""), "begin rule has no end pattern, treating as never-ending");
                return Ok(RuleNode::Range(RangeRule {
                    name: raw_rule.name.clone(),
                    content_name: raw_rule.content_name.clone(),
                    begin: CompiledRegex::compile(begin_source),
                    begin_captures,
                    end_source: r"\z".to_string(),
                    end_captures,
                    patterns: Vec::new(),
                }));
            };

            let nested_stack =
                self.push_nested_repository(raw_rule.repository.as_ref(), stack, base, self_id)?;
            let patterns = self.compile_pattern_list(
                raw_rule.patterns.as_deref().unwrap_or(&[]),
                &nested_stack,
                base,
                self_id,
            )?;
            return Ok(RuleNode::Range(RangeRule {
                name: raw_rule.name.clone(),
                content_name: raw_rule.content_name.clone(),
                begin: CompiledRegex::compile(begin_source),
                begin_captures,
                end_source,
                end_captures,
                patterns,
            }));
        }

        // A pure include has no `patterns` array of its own: treat the
        // include itself as the rule's sole pattern.
        let owned_single;
        let children: &[RawRule] = match (&raw_rule.patterns, &raw_rule.include) {
            (Some(patterns), _) => patterns,
            (None, Some(include)) => {
                owned_single = [RawRule { include: Some(include.clone()), ..Default::default() }];
                &owned_single
            }
            (None, None) => &[],
        };

        let nested_stack =
            self.push_nested_repository(raw_rule.repository.as_ref(), stack, base, self_id)?;
        let patterns = self.compile_pattern_list(children, &nested_stack, base, self_id)?;
        Ok(RuleNode::Container(ContainerRule {
            name: raw_rule.name.clone(),
            content_name: raw_rule.content_name.clone(),
            patterns,
        }))
    }

    fn compile_pattern_list(
        &mut self,
        children: &[RawRule],
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<Vec<RuleId>, Error> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            if let Some(include) = &child.include {
                if let Some(id) = self.resolve_include(include, stack, base, self_id)? {
                    out.push(id);
                }
            } else {
                out.push(self.compile_rule(child, stack, base, self_id)?);
            }
        }
        Ok(out)
    }

    fn resolve_include(
        &mut self,
        include: &str,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<Option<RuleId>, Error> {
        match include {
            "$base" => Ok(Some(base)),
            "$self" => Ok(Some(self_id)),
            key if key.starts_with('#') => {
                let name = &key[1..];
                match self.lookup_repository(stack, name) {
                    Some(id) => Ok(Some(id)),
                    None => {
                        tracing::warn!(key = name, "include references an unknown repository key, dropping edge");
                        Ok(None)
                    }
                }
            }
            other => {
                let (scope, key) = match other.split_once('#') {
                    Some((scope, key)) => (scope, Some(key)),
                    None => (other, None),
                };
                let Some((root, repo_id)) = self.compile_grammar(scope, Some(base))? else {
                    tracing::warn!(scope, "include references an unknown grammar, dropping edge");
                    return Ok(None);
                };
                match key {
                    None => Ok(Some(root)),
                    Some(key) => {
                        let found = repo_id
                            .and_then(|id| self.repositories[id.0].as_ref())
                            .and_then(|names| names.get(key))
                            .copied();
                        if found.is_none() {
                            tracing::warn!(scope, key, "include references an unknown repository key, dropping edge");
                        }
                        Ok(found)
                    }
                }
            }
        }
    }

    fn lookup_repository(&self, stack: &RepoStack, name: &str) -> Option<RuleId> {
        for &repo_id in stack.0.iter().rev() {
            if let Some(names) = &self.repositories[repo_id.0] {
                if let Some(&id) = names.get(name) {
                    return Some(id);
                }
            }
        }
        None
    }

    fn compile_captures(
        &mut self,
        raw: Option<&raw::RawCaptures>,
        stack: &RepoStack,
        base: RuleId,
        self_id: RuleId,
    ) -> Result<Captures, Error> {
        let Some(raw) = raw else { return Ok(Vec::new()) };
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let mut indexed = Vec::with_capacity(raw.len());
        let mut max_index = 0usize;
        for (key, rule) in raw {
            let index: usize = key
                .parse()
                .context(UnparseableCaptureIndexSnafu { index: key.clone() })?;
            max_index = max_index.max(index);
            indexed.push((index, rule));
        }

        let mut captures: Captures = vec![None; max_index + 1];
        for (index, rule) in indexed {
            captures[index] = Some(self.compile_rule(rule, stack, base, self_id)?);
        }
        Ok(captures)
    }
}
