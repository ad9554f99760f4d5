//! Scope paths and scope selectors (spec §3, §4.3).
//!
//! Ported from `examples/original_source/src/scopeselector.{h,cpp}`
//! (`ScopeSelector`/`listComparePrefix`/`operator<`), which itself operates
//! on a `QStack<QStringList>` in the same outermost-first order used here.

use std::cmp::Ordering;

/// An ordered stack of scope tokens, outermost first, as currently open
/// while highlighting a line. Pushing an empty scope is a no-op (rules are
/// allowed an empty `name`); callers track whether their push actually
/// added a token so they pop the right number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePath(Vec<String>);

impl ScopePath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Pushes `scope` unless it is empty. Returns whether a token was
    /// pushed, so the caller knows whether a later `pop_if` should pop it.
    pub fn push(&mut self, scope: &str) -> bool {
        if scope.is_empty() {
            false
        } else {
            self.0.push(scope.to_string());
            true
        }
    }

    pub fn pop_if(&mut self, pushed: bool) {
        if pushed {
            self.0.pop();
        }
    }

    pub fn to_display(&self) -> String {
        self.0.join(" ")
    }
}

fn split_components(token: &str) -> Vec<&str> {
    token.split('.').collect()
}

/// `list` has `prefix` as a component-wise prefix: same length or longer,
/// matching one-for-one. Ported from `listComparePrefix`.
fn is_component_prefix(list: &[&str], prefix: &[String]) -> bool {
    if list.len() < prefix.len() {
        return false;
    }
    prefix.iter().zip(list.iter()).all(|(p, l)| p == l)
}

/// A theme-side selector: space-separated scope prefixes, outermost first,
/// each split into dot-separated components (spec §4.3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSelector(Vec<Vec<String>>);

impl ScopeSelector {
    pub fn parse(selector: &str) -> Self {
        let prefixes = selector
            .split_whitespace()
            .map(|tok| tok.split('.').map(str::to_string).collect())
            .collect();
        Self(prefixes)
    }

    /// The selector with no prefixes at all: matches every path. Used for a
    /// theme's default (scope-less) entry.
    pub fn universal() -> Self {
        Self(Vec::new())
    }

    pub fn is_universal(&self) -> bool {
        self.0.is_empty()
    }

    /// Walks this selector's prefixes innermost-to-outermost (the reverse of
    /// storage order, since prefixes are stored outermost-first) against
    /// `path`'s tokens from the end backward, per spec §4.3.
    pub fn matches(&self, path: &ScopePath) -> bool {
        let path_components: Vec<Vec<&str>> =
            path.tokens().iter().map(|t| split_components(t)).collect();
        let mut cursor = path_components.len() as isize - 1;

        for prefix in self.0.iter().rev() {
            loop {
                if cursor < 0 {
                    return false;
                }
                let candidate = &path_components[cursor as usize];
                cursor -= 1;
                if is_component_prefix(candidate, prefix) {
                    break;
                }
            }
        }
        true
    }
}

/// Ported from `operator<(const ScopeSelector&, const ScopeSelector&)`:
/// innermost prefix outward, then lexicographic component comparison. A
/// selector that runs out of prefixes/components before its counterpart is
/// the less specific one and sorts first, so folding matches in ascending
/// order (as `Theme::find_style` does) applies the most specific selector
/// last, i.e. lets it override broader ones.
fn less_than(lhs: &ScopeSelector, rhs: &ScopeSelector) -> bool {
    if lhs == rhs {
        return false;
    }
    let size = lhs.0.len().max(rhs.0.len());
    for i in 0..size {
        if i >= lhs.0.len() {
            return true;
        }
        if i >= rhs.0.len() {
            return false;
        }
        let l = &lhs.0[lhs.0.len() - 1 - i];
        let r = &rhs.0[rhs.0.len() - 1 - i];
        if l != r {
            let sz = l.len().max(r.len());
            for j in 0..sz {
                if j >= l.len() {
                    return true;
                }
                if j >= r.len() {
                    return false;
                }
                if l[j] != r[j] {
                    return l[j] < r[j];
                }
            }
            unreachable!("l != r but every component compared equal");
        }
    }
    false
}

impl PartialOrd for ScopeSelector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScopeSelector {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            Ordering::Equal
        } else if less_than(self, other) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}
