//! Section grammar for the loosely structured documents the backend produces.
//!
//! A [`Grammar`] is an ordered list of [`SectionRule`]s. Each rule owns a
//! heading pattern; a section's content runs from the end of its heading to
//! the next heading of any rule (or a match of the grammar's boundary
//! pattern), optionally cut short by the rule's terminator. Sections come
//! back in rule order regardless of where they appear in the text, and a
//! rule whose heading is missing or whose content is blank is skipped.
//!
//! Text no matched section claims is collected separately so renderers can
//! fall back to a generic block.

pub mod anamnesis;
pub mod evaluation;

use once_cell::sync::Lazy;
use regex::Regex;

pub use anamnesis::{
    AnamnesisReport, Severity, Subsection, SubsectionLayout, parse_anamnesis_report,
    parse_subsections, render_anamnesis_report,
};
pub use evaluation::{
    DiagnosisEntry, EvaluationReport, Likelihood, parse_differential, parse_evaluation_report,
    render_evaluation_report,
};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("bold regex"));
static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+)$").expect("heading line regex"));
static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[*\-•]|\d+\.)\s+(.*)$").expect("list item regex"));

/// How a matched section's content should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Prose,
    Subsections,
    Disclaimer,
    ProbableCause,
    Differential,
    TreatmentPlan,
    List,
}

pub struct SectionRule {
    pub key: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub class: &'static str,
    pub body: BodyKind,
    heading: Regex,
    terminator: Option<Regex>,
}

impl SectionRule {
    pub fn new(
        key: &'static str,
        title: &'static str,
        icon: &'static str,
        class: &'static str,
        body: BodyKind,
        heading: &str,
    ) -> Self {
        Self {
            key,
            title,
            icon,
            class,
            body,
            heading: Regex::new(heading).expect("section heading regex"),
            terminator: None,
        }
    }

    /// Content stops at the first match of `pattern`; the match itself is
    /// consumed.
    pub fn with_terminator(mut self, pattern: &str) -> Self {
        self.terminator = Some(Regex::new(pattern).expect("section terminator regex"));
        self
    }
}

pub struct Grammar {
    rules: Vec<SectionRule>,
    boundary: Option<Regex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'d> {
    pub key: &'static str,
    pub content: &'d str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction<'d> {
    pub sections: Vec<Section<'d>>,
    pub unclaimed: String,
}

impl Grammar {
    pub fn new(rules: Vec<SectionRule>) -> Self {
        Self {
            rules,
            boundary: None,
        }
    }

    /// Any match of `pattern` also ends the section before it.
    pub fn with_boundary(mut self, pattern: &str) -> Self {
        self.boundary = Some(Regex::new(pattern).expect("grammar boundary regex"));
        self
    }

    pub fn rules(&self) -> &[SectionRule] {
        &self.rules
    }

    pub fn rule(&self, key: &str) -> Option<&SectionRule> {
        self.rules.iter().find(|rule| rule.key == key)
    }

    pub fn extract<'d>(&self, document: &'d str) -> Extraction<'d> {
        let heads: Vec<Option<(usize, usize)>> = self
            .rules
            .iter()
            .map(|rule| rule.heading.find(document).map(|m| (m.start(), m.end())))
            .collect();

        let mut stops: Vec<usize> = heads.iter().flatten().map(|(start, _)| *start).collect();
        if let Some(boundary) = &self.boundary {
            stops.extend(boundary.find_iter(document).map(|m| m.start()));
        }
        stops.sort_unstable();
        stops.dedup();

        let mut sections = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for (rule, head) in self.rules.iter().zip(heads) {
            let Some((start, end)) = head else {
                continue;
            };

            let mut stop = stops
                .iter()
                .copied()
                .find(|&candidate| candidate >= end)
                .unwrap_or(document.len());
            let mut span_end = stop;

            if let Some(terminator) = &rule.terminator {
                if let Some(m) = terminator.find(&document[end..stop]) {
                    stop = end + m.start();
                    span_end = end + m.end();
                }
            }

            claimed.push((start, span_end));

            let content = document[end..stop].trim();
            if !content.is_empty() {
                sections.push(Section {
                    key: rule.key,
                    content,
                });
            }
        }

        let unclaimed = if sections.is_empty() {
            document.trim().to_string()
        } else {
            unclaimed_text(document, &mut claimed)
        };

        Extraction {
            sections,
            unclaimed,
        }
    }
}

fn unclaimed_text(document: &str, claimed: &mut [(usize, usize)]) -> String {
    claimed.sort_unstable();

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for &(start, end) in claimed.iter() {
        if start > cursor {
            pieces.push(document[cursor..start].trim());
        }
        cursor = cursor.max(end);
    }
    if cursor < document.len() {
        pieces.push(document[cursor..].trim());
    }

    pieces
        .into_iter()
        .filter(|piece| !piece.is_empty() && !is_rule_line(piece))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_rule_line(text: &str) -> bool {
    text.len() >= 3 && text.chars().all(|c| c == '-' || c == '*' || c == '_')
}

pub fn escape(text: &str) -> String {
    htmlescape::encode_minimal(text)
}

/// Escape, then turn `**x**` into `<strong>x</strong>`.
pub fn format_inline(text: &str) -> String {
    let escaped = escape(text.trim());
    BOLD.replace_all(&escaped, "<strong>$1</strong>").into_owned()
}

/// Escaped text with bold markup, heading lines and line breaks.
pub fn format_prose(text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    for line in text.trim().lines() {
        let line = line.trim();
        if is_rule_line(line) {
            continue;
        }
        if line == "_" {
            parts.push(String::new());
            continue;
        }
        if let Some(caps) = HEADING_LINE.captures(line) {
            let title = caps[1].trim().trim_matches('*').trim();
            parts.push(format!(
                "<h4 class=\"generic-heading\">{}</h4>",
                format_inline(title)
            ));
            continue;
        }
        parts.push(format_inline(line));
    }

    parts.join("<br>")
}

/// Bullet lines become list items; lines that are not bullets continue the
/// previous item. Returns None when the text has no bullet at all.
pub fn render_list(text: &str) -> Option<String> {
    let mut lead: Vec<&str> = Vec::new();
    let mut items: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = LIST_ITEM.captures(line) {
            items.push(caps.get(1).map_or("", |m| m.as_str()).trim().to_string());
        } else if let Some(last) = items.last_mut() {
            last.push(' ');
            last.push_str(line);
        } else {
            lead.push(line);
        }
    }

    if items.is_empty() {
        return None;
    }

    let mut html = String::new();
    if !lead.is_empty() {
        html.push_str(&format!("<p>{}</p>", format_prose(&lead.join("\n"))));
    }
    html.push_str("<ul>");
    for item in items.iter().filter(|item| !item.is_empty()) {
        html.push_str(&format!("<li>{}</li>", format_inline(item)));
    }
    html.push_str("</ul>");
    Some(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        Grammar::new(vec![
            SectionRule::new("b", "B", "", "", BodyKind::Prose, r"(?i)\*\*B:\*\*"),
            SectionRule::new("a", "A", "", "", BodyKind::Prose, r"(?i)\*\*A:\*\*"),
            SectionRule::new("c", "C", "", "", BodyKind::Prose, r"(?i)\*\*C:\*\*"),
        ])
    }

    #[test]
    fn sections_follow_rule_order_and_stop_at_next_heading() {
        let extraction = grammar().extract("**A:** alpha **B:** beta");
        assert_eq!(
            extraction.sections,
            vec![
                Section { key: "b", content: "beta" },
                Section { key: "a", content: "alpha" },
            ]
        );
        assert!(extraction.unclaimed.is_empty());
    }

    #[test]
    fn blank_sections_are_skipped() {
        let extraction = grammar().extract("**A:**   **C:** gamma");
        assert_eq!(extraction.sections, vec![Section { key: "c", content: "gamma" }]);
    }

    #[test]
    fn unmatched_document_is_unclaimed_whole() {
        let extraction = grammar().extract("  just some text  ");
        assert!(extraction.sections.is_empty());
        assert_eq!(extraction.unclaimed, "just some text");
    }

    #[test]
    fn text_outside_sections_is_collected() {
        let grammar = Grammar::new(vec![
            SectionRule::new("d", "D", "", "", BodyKind::Prose, r"\*\*\*D:")
                .with_terminator(r"\*\*\*"),
        ]);
        let extraction = grammar.extract("intro ***D: careful*** tail");
        assert_eq!(extraction.sections, vec![Section { key: "d", content: "careful" }]);
        assert_eq!(extraction.unclaimed, "intro\n\ntail");
    }

    #[test]
    fn boundary_ends_section() {
        let grammar = grammar().with_boundary(r"(?m)^#+\s");
        let extraction = grammar.extract("**A:** alpha\n# Other\nmore");
        assert_eq!(extraction.sections[0].content, "alpha");
        assert_eq!(extraction.unclaimed, "# Other\nmore");
    }

    #[test]
    fn inline_formatting_escapes_before_bolding() {
        assert_eq!(
            format_inline("**Note:** <b>5 > 3</b>"),
            "<strong>Note:</strong> &lt;b&gt;5 &gt; 3&lt;/b&gt;"
        );
    }

    #[test]
    fn prose_handles_headings_rules_and_breaks() {
        let html = format_prose("### **Intro**\n---\nline one\nline two");
        assert_eq!(
            html,
            "<h4 class=\"generic-heading\">Intro</h4><br>line one<br>line two"
        );
    }

    #[test]
    fn list_rendering_requires_bullets() {
        assert!(render_list("no bullets here").is_none());
        let html = render_list("Lead in\n* first\n  continued\n- second").unwrap();
        assert_eq!(
            html,
            "<p>Lead in</p><ul><li>first continued</li><li>second</li></ul>"
        );
    }
}
