//! End-to-end scenarios (spec §8): register a grammar and theme through the
//! public API only, resolve by extension, and highlight across line breaks.

use textmate_core::{plist, BundleRegistry, Highlighter, Theme};

const XML_GRAMMAR: &str = r##"<plist><dict>
    <key>scopeName</key><string>text.xml.test</string>
    <key>fileTypes</key><array><string>xml</string></array>
    <key>patterns</key><array>
        <dict><key>include</key><string>#tag</string></dict>
    </array>
    <key>repository</key><dict>
        <key>tag</key><dict>
            <key>name</key><string>meta.tag.xml</string>
            <key>begin</key><string>&lt;([a-zA-Z][\w:-]*)</string>
            <key>end</key><string>/?&gt;</string>
            <key>beginCaptures</key><dict>
                <key>1</key><dict><key>name</key><string>entity.name.tag.xml</string></dict>
            </dict>
            <key>patterns</key><array>
                <dict><key>name</key><string>entity.other.attribute-name.xml</string>
                    <key>match</key><string>\b[\w-]+(?==)</string></dict>
                <dict><key>name</key><string>string.quoted.double.xml</string>
                    <key>begin</key><string>"</string>
                    <key>end</key><string>"</string></dict>
            </array>
        </dict>
    </dict>
</dict></plist>"##;

const DARK_THEME: &str = r##"<plist><dict>
    <key>settings</key><array>
        <dict><key>settings</key><dict>
            <key>foreground</key><string>#d4d4d4</string>
            <key>background</key><string>#1e1e1e</string>
        </dict></dict>
        <dict><key>scope</key><string>entity.name.tag</string>
            <key>settings</key><dict><key>foreground</key><string>#569cd6</string></dict></dict>
        <dict><key>scope</key><string>entity.other.attribute-name</string>
            <key>settings</key><dict><key>foreground</key><string>#9cdcfe</string></dict></dict>
        <dict><key>scope</key><string>string.quoted.double</string>
            <key>settings</key><dict><key>foreground</key><string>#ce9178</string></dict></dict>
    </array>
</dict></plist>"##;

#[test]
fn registry_resolves_extension_compiles_grammar_and_highlights_a_tag() {
    let mut registry = BundleRegistry::new();
    registry.add_grammar_xml(XML_GRAMMAR).unwrap();
    registry.add_theme("dark", &plist::parse_str(DARK_THEME).unwrap());
    registry.set_active_theme("dark");

    let scope = registry.scope_for_extension("xml").unwrap().to_string();
    let spans = registry
        .with_grammar_for_scope(&scope, |grammar| {
            registry
                .with_active_theme(|theme| {
                    let highlighter = Highlighter::new(grammar, theme);
                    highlighter.highlight_line(r#"<a href="x">"#, None).0
                })
                .unwrap()
        })
        .unwrap();

    assert!(spans.iter().any(|s| s.scope.contains("entity.name.tag.xml")));
    assert!(spans.iter().any(|s| s.scope.contains("entity.other.attribute-name.xml")));
    assert!(spans.iter().any(|s| s.scope.contains("string.quoted.double.xml")));

    let mut cursor = 0;
    for span in &spans {
        assert_eq!(span.start, cursor);
        cursor += span.len;
    }
}

#[test]
fn concatenating_two_lines_highlights_the_same_as_one_line_without_a_break() {
    let mut registry = BundleRegistry::new();
    registry.add_grammar_xml(XML_GRAMMAR).unwrap();
    let warmed = registry.with_grammar_for_scope("text.xml.test", |_| ());
    assert!(warmed.is_some());

    registry
        .with_grammar_for_scope("text.xml.test", |grammar| {
            let theme = Theme::from_plist(&plist::parse_str(DARK_THEME).unwrap());
            let highlighter = Highlighter::new(grammar, &theme);

            let (one_line_spans, _, _) = highlighter.highlight_line(r#"<a href="x">"#, None);

            let (first_spans, state, _) = highlighter.highlight_line(r#"<a href="#, None);
            let (second_spans, _, _) = highlighter.highlight_line(r#"x">"#, Some(&state));

            let total_len: usize = one_line_spans.iter().map(|s| s.len).sum();
            let split_len: usize =
                first_spans.iter().map(|s| s.len).sum::<usize>() + second_spans.iter().map(|s| s.len).sum::<usize>();
            assert_eq!(total_len, split_len);
        })
        .unwrap();
}
