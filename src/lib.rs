//! A TextMate grammar/theme compiler and line-oriented syntax highlighter.
//!
//! Loads `.tmLanguage`/`.tmTheme` plist documents ([`plist`]), compiles a
//! grammar's rule graph with `$self`/`$base`/`#key`/cross-grammar `include`
//! resolution ([`grammar`]), compiles a theme into a selector-sorted style
//! table ([`theme`]), and tokenizes text one line at a time against both,
//! carrying a small persistent state across line boundaries ([`highlight`]).
//! [`registry`] ties extensions, grammars, and themes together for a host
//! application.

pub mod grammar;
pub mod highlight;
pub mod plist;
pub mod registry;
pub mod scope;
pub mod style;
pub mod theme;

mod regex;

pub use grammar::Grammar;
pub use highlight::{BlockState, Highlighter, Span};
pub use registry::BundleRegistry;
pub use scope::{ScopePath, ScopeSelector};
pub use style::{Color, Style};
pub use theme::Theme;
