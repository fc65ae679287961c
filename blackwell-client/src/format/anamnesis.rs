//! Anamnesis report: fixed catalog of history-taking sections.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{BodyKind, Grammar, SectionRule, format_inline, format_prose};

static MARKER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\[ANAMNESIS REPORT\]\s*:?\s*").expect("marker prefix regex")
});
static SUBSECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*([^*:\n]+?)(?::\s*\*\*|\*\*\s*:)").expect("subsection header regex")
});
static BULLET_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[*\-]\s+\*\*").expect("bullet header regex"));
static TRAILING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[*\-]\s*$").expect("trailing bullet regex"));
static LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[*\-]\s+").expect("leading bullet regex"));
static SEVERITY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\brated\s+(?:as\s+|up\s+to\s+|at\s+)?)?\b(\d+(?:\.\d+)?)\s*/\s*(\d+)\b")
        .expect("severity token regex")
});
static LOOSE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("space regex"));
static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:])").expect("punctuation regex"));

static GRAMMAR: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(vec![
        SectionRule::new(
            "chief_complaint",
            "Chief Complaint",
            "fa-solid fa-stethoscope",
            "section-chief-complaint",
            BodyKind::Prose,
            &bold_heading(r"Chief\s+Complaint"),
        ),
        SectionRule::new(
            "hpi",
            "History of Present Illness",
            "fa-solid fa-notes-medical",
            "section-hpi",
            BodyKind::Subsections,
            &bold_heading(r"History\s+of\s+(?:the\s+)?Present\s+Illness"),
        ),
        SectionRule::new(
            "pmh",
            "Past Medical History",
            "fa-solid fa-clock-rotate-left",
            "section-pmh",
            BodyKind::Prose,
            &bold_heading(r"Past\s+Medical\s+History"),
        ),
        SectionRule::new(
            "family_history",
            "Family History",
            "fa-solid fa-people-roof",
            "section-family-history",
            BodyKind::Prose,
            &bold_heading(r"Family\s+History"),
        ),
        SectionRule::new(
            "medications",
            "Medications and Allergies",
            "fa-solid fa-pills",
            "section-medications",
            BodyKind::Subsections,
            &bold_heading(r"Medications?\s*(?:and|&|/)\s*Allergies"),
        ),
        SectionRule::new(
            "social_history",
            "Social History",
            "fa-solid fa-users",
            "section-social-history",
            BodyKind::Prose,
            &bold_heading(r"Social\s+History"),
        ),
        SectionRule::new(
            "ros",
            "Review of Systems",
            "fa-solid fa-list-check",
            "section-ros",
            BodyKind::Prose,
            &bold_heading(r"Review\s+of\s+Systems"),
        ),
    ])
});

/// `**[Relevant] Name [(qualifier)]:**`, with the colon inside or outside
/// the bold markers.
fn bold_heading(name: &str) -> String {
    format!(r"(?i)\*\*\s*(?:relevant\s+)?{name}(?:\s*\([^)]*\))?\s*(?::\s*\*\*|\*\*\s*:?)")
}

fn subsection_icon(key: &str) -> &'static str {
    match key {
        "onset" => "fa-regular fa-calendar",
        "location" | "radiation" => "fa-solid fa-location-dot",
        "character" => "fa-solid fa-wand-magic-sparkles",
        "timing" | "duration" => "fa-regular fa-clock",
        "triggers" | "aggravating" => "fa-solid fa-bolt",
        "severity" | "pain" => "fa-solid fa-temperature-high",
        "alleviating" => "fa-solid fa-hand-holding-medical",
        "associated" | "symptoms" => "fa-solid fa-link",
        "medications" | "current" | "topical" => "fa-solid fa-pills",
        "allergies" => "fa-solid fa-triangle-exclamation",
        _ => "fa-solid fa-circle-info",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsectionLayout {
    /// `* **Label:** text` entries
    Bullets,
    /// `**Label:** text` runs inside a paragraph
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Severity {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsection {
    pub label: String,
    pub icon_key: String,
    pub text: String,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub key: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub class: &'static str,
    pub body: ReportBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBody {
    Prose(String),
    Subsections {
        layout: SubsectionLayout,
        entries: Vec<Subsection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnamnesisReport {
    pub sections: Vec<ReportSection>,
    pub notes: Option<String>,
}

impl AnamnesisReport {
    pub fn section(&self, key: &str) -> Option<&ReportSection> {
        self.sections.iter().find(|section| section.key == key)
    }
}

/// Remove a leading `[ANAMNESIS REPORT]:` tag.
pub fn strip_marker(markdown: &str) -> &str {
    match MARKER_PREFIX.find(markdown) {
        Some(m) => &markdown[m.end()..],
        None => markdown,
    }
}

pub fn parse_anamnesis_report(markdown: &str) -> AnamnesisReport {
    let document = strip_marker(markdown);
    let extraction = GRAMMAR.extract(document);

    let sections = extraction
        .sections
        .iter()
        .filter_map(|section| {
            let rule = GRAMMAR.rule(section.key)?;
            let body = match rule.body {
                BodyKind::Subsections => {
                    let (layout, entries) = parse_subsections(section.content);
                    if entries.is_empty() {
                        ReportBody::Prose(section.content.to_string())
                    } else {
                        ReportBody::Subsections { layout, entries }
                    }
                }
                _ => ReportBody::Prose(section.content.to_string()),
            };
            Some(ReportSection {
                key: rule.key,
                title: rule.title,
                icon: rule.icon,
                class: rule.class,
                body,
            })
        })
        .collect();

    let notes = Some(extraction.unclaimed).filter(|text| !text.is_empty());

    AnamnesisReport { sections, notes }
}

/// Split a compound section into labelled entries.
pub fn parse_subsections(content: &str) -> (SubsectionLayout, Vec<Subsection>) {
    let layout = if BULLET_HEADER.is_match(content) {
        SubsectionLayout::Bullets
    } else {
        SubsectionLayout::Inline
    };

    let headers: Vec<(usize, usize, String)> = SUBSECTION_HEADER
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), label))
        })
        .filter(|(_, _, label)| !label.is_empty())
        .collect();

    let mut entries = Vec::with_capacity(headers.len());
    for (index, (_, end, label)) in headers.iter().enumerate() {
        let stop = headers
            .get(index + 1)
            .map(|(start, _, _)| *start)
            .unwrap_or(content.len());
        let text = clean_entry_text(&content[*end..stop]);
        let icon_key = icon_key(label);

        let (text, severity) = if is_severity_key(&icon_key, label) {
            splice_severity(&text)
        } else {
            (text, None)
        };

        entries.push(Subsection {
            label: label.clone(),
            icon_key,
            text,
            severity,
        });
    }

    (layout, entries)
}

fn clean_entry_text(raw: &str) -> String {
    let text = raw.trim();
    let text = TRAILING_BULLET.replace(text, "");
    let text = LEADING_BULLET.replace(text.trim(), "");
    text.trim().to_string()
}

fn icon_key(label: &str) -> String {
    label
        .to_lowercase()
        .split('/')
        .next()
        .and_then(|part| part.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

fn is_severity_key(icon_key: &str, label: &str) -> bool {
    matches!(icon_key, "severity" | "pain") || label.to_lowercase().contains("severity")
}

/// Lift the first `N/M` token out of the prose. A leading "rated (as|up to|at)"
/// goes with it so the remaining sentence still reads.
fn splice_severity(text: &str) -> (String, Option<Severity>) {
    let Some(caps) = SEVERITY_TOKEN.captures(text) else {
        return (text.to_string(), None);
    };
    let (Some(whole), Some(value), Some(scale)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return (text.to_string(), None);
    };

    let severity = Severity {
        value: format!("{}/{}", value.as_str(), scale.as_str()),
    };

    let remainder = format!("{} {}", &text[..whole.start()], &text[whole.end()..]);
    let remainder = LOOSE_SPACE.replace_all(remainder.trim(), " ");
    let remainder = SPACE_BEFORE_PUNCT.replace_all(&remainder, "$1");
    let remainder = remainder
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | ',' | ';' | ':' | '.'))
        .trim()
        .to_string();

    (remainder, Some(severity))
}

/// Formatted report wrapped in its page container.
pub fn render_anamnesis_report(markdown: &str) -> String {
    let report = parse_anamnesis_report(markdown);
    format!(
        "<div class=\"report-content anamnesis-report\">{}</div>",
        render_report_body(&report)
    )
}

fn render_report_body(report: &AnamnesisReport) -> String {
    if report.sections.is_empty() {
        let notes = report.notes.as_deref().unwrap_or_default();
        return format!("<div class=\"section-content\">{}</div>", format_prose(notes));
    }

    let mut html = String::new();
    for section in &report.sections {
        let content = match &section.body {
            ReportBody::Prose(text) => format_prose(text),
            ReportBody::Subsections { layout, entries } => render_subsections(*layout, entries),
        };
        html.push_str(&format!(
            "<div class=\"anamnesis-section {class}\">\
             <div class=\"section-header\"><i class=\"{icon} section-icon\"></i>\
             <h3 class=\"section-title\">{title}</h3></div>\
             <div class=\"section-content\">{content}</div></div>",
            class = section.class,
            icon = section.icon,
            title = section.title,
        ));
    }

    if let Some(notes) = &report.notes {
        html.push_str(&format!(
            "<div class=\"anamnesis-section section-notes\">\
             <div class=\"section-header\"><i class=\"fa-solid fa-circle-info section-icon\"></i>\
             <h3 class=\"section-title\">Additional Notes</h3></div>\
             <div class=\"section-content\">{}</div></div>",
            format_prose(notes)
        ));
    }

    html
}

fn render_subsections(layout: SubsectionLayout, entries: &[Subsection]) -> String {
    let wrapper = match layout {
        SubsectionLayout::Bullets => "subsection-list",
        SubsectionLayout::Inline => "subsection-inline",
    };

    let mut html = format!("<div class=\"{}\">", wrapper);
    for entry in entries {
        let content = match &entry.severity {
            Some(severity) => {
                let mut content = format!(
                    "<span class=\"severity-badge\"><i class=\"fa-solid fa-gauge-high\"></i>{} Severity</span>",
                    super::escape(&severity.value)
                );
                if !entry.text.is_empty() {
                    content.push_str(" - ");
                    content.push_str(&format_inline(&entry.text));
                }
                content
            }
            None => format_inline(&entry.text),
        };

        html.push_str(&format!(
            "<div class=\"subsection\">\
             <div class=\"subsection-title\"><i class=\"{icon} subsection-icon\"></i><span>{label}</span></div>\
             <div class=\"subsection-content\">{content}</div></div>",
            icon = subsection_icon(&entry.icon_key),
            label = format_inline(&entry.label),
        ));
    }
    html.push_str("</div>");
    html
}
