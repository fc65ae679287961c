//! Clinical evaluation report: disclaimer, numbered assessment sections and
//! the reference list the backend appends.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{BodyKind, Grammar, SectionRule, escape, format_inline, format_prose, render_list};

static DIAGNOSIS_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:[*\-][ \t]+)?(?:\*\*)?[ \t]*(\d+)\.[ \t]*(.+?)[ \t]*\([ \t]*Likelihood[ \t]*:[ \t]*([^)\n]+?)[ \t]*\)[ \t]*(?:\*\*)?",
    )
    .expect("diagnosis entry regex")
});
static JUSTIFICATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\*\*)?[ \t]*Justification[ \t]*:[ \t]*(?:\*\*)?[ \t]*")
        .expect("justification regex")
});
static NEXT_LABELLED_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[*\-][ \t]+\*\*").expect("labelled bullet regex"));
static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[*\-][ \t]+").expect("bullet prefix regex"));
static TREATMENT_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfor\s+\*\*([^*\n]+?)\*\*|\bfor\s+([^*,\n:.]+)").expect("treatment target regex")
});

static GRAMMAR: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(vec![
        SectionRule::new(
            "disclaimer",
            "Disclaimer",
            "fa-solid fa-triangle-exclamation",
            "eval-disclaimer",
            BodyKind::Disclaimer,
            r"(?i)\*{2,3}[ \t]*DISCLAIMER[ \t]*:[ \t]*",
        )
        .with_terminator(r"\*{2,3}"),
        SectionRule::new(
            "probable_cause",
            "Probable Cause",
            "fa-solid fa-bullseye",
            "eval-section-probable",
            BodyKind::ProbableCause,
            &numbered_heading(r"Probable\s+Cause"),
        ),
        SectionRule::new(
            "differential",
            "Differential Diagnosis",
            "fa-solid fa-list-ol",
            "eval-section-differential",
            BodyKind::Differential,
            &numbered_heading(r"Differential\s+Diagnos[ie]s"),
        ),
        SectionRule::new(
            "treatment",
            "Suggested Treatment Plan",
            "fa-solid fa-notes-medical",
            "eval-section-treatment",
            BodyKind::TreatmentPlan,
            &numbered_heading(r"(?:Suggested\s+|Recommended\s+)?Treatment\s+Plan"),
        ),
        SectionRule::new(
            "references",
            "References",
            "fa-solid fa-book-medical",
            "eval-section-references",
            BodyKind::List,
            &numbered_heading(r"References"),
        ),
    ])
    .with_boundary(r"(?m)^[ \t]*#{1,6}[ \t]")
});

static TREATMENT_GRAMMAR: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(vec![
        SectionRule::new(
            "pharmacological",
            "Pharmacological Treatment",
            "fa-pills",
            "treatment-pharmacological",
            BodyKind::List,
            &category_heading(r"Pharmacological"),
        ),
        SectionRule::new(
            "lifestyle",
            "Non-Pharmacological & Lifestyle",
            "fa-heart-pulse",
            "treatment-lifestyle",
            BodyKind::List,
            &category_heading(r"Non-Pharmacological(?:[ \t]*(?:/|&|and)?[ \t]*Lifestyle)?"),
        ),
        SectionRule::new(
            "follow_up",
            "Follow-up Care",
            "fa-calendar-check",
            "treatment-follow-up",
            BodyKind::List,
            &category_heading(r"Follow[- ]?up"),
        ),
    ])
});

/// `### **2. Name (qualifier):**` style heading, number, bold, qualifier and
/// colon optional. Text after the heading on the same line is content.
fn numbered_heading(name: &str) -> String {
    format!(
        r"(?im)^[ \t]*#{{1,6}}[ \t]*(?:\*\*)?[ \t]*(?:\d+\.[ \t]*)?{name}\b(?:[ \t]*\([^)\n]*\))?[ \t]*:?[ \t]*(?:\*\*)?[ \t]*:?[ \t]*"
    )
}

/// `* **Name:**` category line inside the treatment plan; the rest of the
/// line is content.
fn category_heading(name: &str) -> String {
    format!(r"(?im)^[ \t]*(?:[*\-][ \t]+)?\*\*[ \t]*{name}[ \t]*(?::[ \t]*\*\*|\*\*[ \t]*:?)[ \t]*")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Likelihood {
    High,
    Medium,
    MediumLow,
    Low,
}

impl Likelihood {
    /// Exact case-insensitive match; anything unrecognised styles as medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Likelihood::High,
            "medium/low" => Likelihood::MediumLow,
            "low" => Likelihood::Low,
            _ => Likelihood::Medium,
        }
    }

    pub fn badge_class(&self) -> &'static str {
        match self {
            Likelihood::High => "probability-high",
            Likelihood::Medium => "probability-medium",
            Likelihood::MediumLow => "probability-medium-low",
            Likelihood::Low => "probability-low",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Likelihood::High => "fa-arrow-up",
            Likelihood::Medium => "fa-signal",
            Likelihood::MediumLow => "fa-equals",
            Likelihood::Low => "fa-arrow-down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisEntry {
    pub rank: u32,
    pub name: String,
    pub likelihood_label: String,
    pub likelihood: Likelihood,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentCategory {
    pub key: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreatmentPlan {
    pub target: Option<String>,
    pub categories: Vec<TreatmentCategory>,
    /// Set when no known category heading was found.
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvaluationReport {
    pub disclaimer: Option<String>,
    pub probable_cause: Option<String>,
    /// Raw differential section, kept when no entry could be parsed from it.
    pub differential_text: Option<String>,
    pub differential: Vec<DiagnosisEntry>,
    pub treatment: Option<TreatmentPlan>,
    pub references: Option<String>,
    pub notes: Option<String>,
}

impl EvaluationReport {
    fn is_empty(&self) -> bool {
        self.disclaimer.is_none()
            && self.probable_cause.is_none()
            && self.differential_text.is_none()
            && self.treatment.is_none()
            && self.references.is_none()
    }
}

pub fn parse_evaluation_report(markdown: &str) -> EvaluationReport {
    let extraction = GRAMMAR.extract(markdown);
    let mut report = EvaluationReport::default();

    for section in &extraction.sections {
        let Some(rule) = GRAMMAR.rule(section.key) else {
            continue;
        };
        let content = section.content;
        match rule.body {
            BodyKind::Disclaimer => report.disclaimer = Some(content.to_string()),
            BodyKind::ProbableCause => report.probable_cause = Some(content.to_string()),
            BodyKind::Differential => {
                report.differential = parse_differential(content);
                report.differential_text = Some(content.to_string());
            }
            BodyKind::TreatmentPlan => report.treatment = Some(parse_treatment_plan(content)),
            BodyKind::List => report.references = Some(content.to_string()),
            BodyKind::Prose | BodyKind::Subsections => {}
        }
    }

    if !extraction.unclaimed.is_empty() {
        report.notes = Some(extraction.unclaimed);
    }

    report
}

/// Numbered `N. Name (Likelihood: X)` entries with their justification.
pub fn parse_differential(section: &str) -> Vec<DiagnosisEntry> {
    let heads: Vec<_> = DIAGNOSIS_ENTRY
        .captures_iter(section)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let rank = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let name = caps.get(2)?.as_str().trim().trim_matches('*').trim().to_string();
            let label = caps.get(3)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), rank, name, label))
        })
        .collect();

    heads
        .iter()
        .enumerate()
        .map(|(index, (_, end, rank, name, label))| {
            let stop = heads
                .get(index + 1)
                .map(|head| head.0)
                .unwrap_or(section.len());
            DiagnosisEntry {
                rank: *rank,
                name: name.clone(),
                likelihood_label: label.clone(),
                likelihood: Likelihood::from_label(label),
                justification: extract_justification(&section[*end..stop]),
            }
        })
        .collect()
}

fn extract_justification(body: &str) -> String {
    let Some(label) = JUSTIFICATION.find(body) else {
        return BULLET_PREFIX.replace_all(body.trim(), "").trim().to_string();
    };

    let rest = &body[label.end()..];
    let stop = NEXT_LABELLED_BULLET
        .find(rest)
        .map(|m| m.start())
        .unwrap_or(rest.len());

    rest[..stop]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_treatment_plan(section: &str) -> TreatmentPlan {
    let extraction = TREATMENT_GRAMMAR.extract(section);

    let categories: Vec<TreatmentCategory> = extraction
        .sections
        .iter()
        .filter_map(|found| {
            let rule = TREATMENT_GRAMMAR.rule(found.key)?;
            Some(TreatmentCategory {
                key: rule.key,
                title: rule.title,
                icon: rule.icon,
                content: found.content.to_string(),
            })
        })
        .collect();

    let lead = if categories.is_empty() {
        section
    } else {
        extraction.unclaimed.as_str()
    };

    let target = TREATMENT_TARGET.captures(lead).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .filter(|target| !target.is_empty())
    });

    let fallback = if categories.is_empty() {
        Some(section.to_string())
    } else {
        None
    };

    TreatmentPlan {
        target,
        categories,
        fallback,
    }
}

/// Formatted evaluation wrapped in its page container.
pub fn render_evaluation_report(markdown: &str) -> String {
    let report = parse_evaluation_report(markdown);
    format!(
        "<div class=\"report-content evaluation-report\">{}</div>",
        render_report_body(&report)
    )
}

fn section_block(rule: &SectionRule, body: &str) -> String {
    format!(
        "<div class=\"eval-section {class}\">\
         <div class=\"eval-section-header\"><div class=\"eval-section-icon\"><i class=\"{icon}\"></i></div>\
         <h3 class=\"eval-section-title\">{title}</h3></div>{body}</div>",
        class = rule.class,
        icon = rule.icon,
        title = rule.title,
    )
}

fn render_disclaimer(rule: &SectionRule, disclaimer: &str) -> String {
    format!(
        "<div class=\"{class}\">\
         <i class=\"{icon} eval-disclaimer-icon\"></i>\
         <div class=\"eval-disclaimer-text\"><strong>DISCLAIMER:</strong> {text}</div></div>",
        class = rule.class,
        icon = rule.icon,
        text = format_inline(disclaimer),
    )
}

fn content_block(text: &str) -> String {
    let body = render_list(text).unwrap_or_else(|| format_prose(text));
    format!("<div class=\"eval-section-content\">{}</div>", body)
}

/// One block for `rule`, or None when the report has nothing for it.
fn render_rule(rule: &SectionRule, report: &EvaluationReport) -> Option<String> {
    match rule.body {
        BodyKind::Disclaimer => report
            .disclaimer
            .as_deref()
            .map(|disclaimer| render_disclaimer(rule, disclaimer)),
        BodyKind::ProbableCause => report.probable_cause.as_deref().map(|cause| {
            section_block(
                rule,
                &format!("<div class=\"probable-cause-text\">{}</div>", format_prose(cause)),
            )
        }),
        BodyKind::Differential => report.differential_text.as_deref().map(|text| {
            let body = if report.differential.is_empty() {
                format!("<div class=\"eval-section-content\">{}</div>", format_prose(text))
            } else {
                report.differential.iter().map(render_diagnosis).collect()
            };
            section_block(rule, &body)
        }),
        BodyKind::TreatmentPlan => report
            .treatment
            .as_ref()
            .map(|plan| section_block(rule, &render_treatment(plan))),
        BodyKind::List => report
            .references
            .as_deref()
            .map(|references| section_block(rule, &content_block(references))),
        BodyKind::Prose | BodyKind::Subsections => None,
    }
}

fn render_report_body(report: &EvaluationReport) -> String {
    let mut html = String::from(
        "<h2 class=\"eval-report-title\"><i class=\"fa-solid fa-file-medical\"></i>Clinical Evaluation Report</h2>",
    );

    if report.is_empty() {
        if let Some(notes) = &report.notes {
            html.push_str(&format!(
                "<div class=\"eval-section eval-section-generic\">{}</div>",
                format_prose(notes)
            ));
        }
        return html;
    }

    for rule in GRAMMAR.rules() {
        if let Some(block) = render_rule(rule, report) {
            html.push_str(&block);
        }
    }

    if let Some(notes) = &report.notes {
        html.push_str(&format!(
            "<div class=\"eval-section eval-section-generic\">\
             <div class=\"eval-section-header\"><div class=\"eval-section-icon\"><i class=\"fa-solid fa-circle-info\"></i></div>\
             <h3 class=\"eval-section-title\">Additional Notes</h3></div>\
             <div class=\"eval-section-content\">{}</div></div>",
            format_prose(notes)
        ));
    }

    html
}

fn render_diagnosis(entry: &DiagnosisEntry) -> String {
    let badge = format!(
        "<span class=\"probability-badge {}\"><i class=\"fa-solid {}\"></i>{} Probability</span>",
        entry.likelihood.badge_class(),
        entry.likelihood.icon(),
        escape(&entry.likelihood_label)
    );

    let justification = if entry.justification.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"justification-section\">\
             <div class=\"justification-label\"><i class=\"fa-solid fa-clipboard-check\"></i><span>Clinical Justification</span></div>\
             <div class=\"justification-text\">{}</div></div>",
            format_inline(&entry.justification)
        )
    };

    format!(
        "<div class=\"diagnosis-item\"><div class=\"diagnosis-header\">\
         <div class=\"diagnosis-name\"><span class=\"diagnosis-rank\">{}</span>\
         <span class=\"diagnosis-title\">{}</span></div>{}</div>{}</div>",
        entry.rank,
        format_inline(&entry.name),
        badge,
        justification
    )
}

fn render_treatment(plan: &TreatmentPlan) -> String {
    let mut html = String::new();

    if let Some(target) = &plan.target {
        html.push_str(&format!(
            "<p class=\"treatment-target\">Treatment plan for <strong>{}</strong></p>",
            escape(target)
        ));
    }

    if let Some(fallback) = &plan.fallback {
        let body = render_list(fallback).unwrap_or_else(|| format_prose(fallback));
        html.push_str(&format!("<div class=\"treatment-content\">{}</div>", body));
        return html;
    }

    for category in &plan.categories {
        let body = render_list(&category.content).unwrap_or_else(|| format_prose(&category.content));
        html.push_str(&format!(
            "<div class=\"treatment-category\">\
             <div class=\"treatment-header\"><i class=\"fa-solid {} treatment-icon\"></i>\
             <h4 class=\"treatment-title\">{}</h4></div>\
             <div class=\"treatment-content\">{}</div></div>",
            category.icon, category.title, body
        ));
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "***DISCLAIMER: This is an AI-generated analysis and is not medical advice.***

### **1. Probable Cause**
Irritant contact dermatitis from friction.

### **2. Differential Diagnosis**
*   **1. Irritant Contact Dermatitis (Likelihood: High)**
    *   **Justification:** Symptoms track friction exposure
        and resolve with rest.
*   **2. Candidal Balanitis (Likelihood: Medium/Low)**
    *   **Justification:** Redness fits, but no discharge reported.
*   **3. Psoriasis (Likelihood: Rare)**
    *   **Justification:** No plaques elsewhere.

### **3. Suggested Treatment Plan**
Treatment plan for **Irritant Contact Dermatitis**, focusing on barrier repair.
*   **Pharmacological:**
    *   Low-potency topical steroid for 5-7 days.
    *   Emollient twice daily.
*   **Non-Pharmacological / Lifestyle:**
    *   Use lubrication during intercourse.
*   **Follow-up:**
    *   Review in 2 weeks if not improved.

### References

**PubMed Articles:**
- Friction dermatitis review. (PMID: 123)
";

    #[test]
    fn parses_all_evaluation_sections() {
        let report = parse_evaluation_report(SAMPLE);
        assert_eq!(
            report.disclaimer.as_deref(),
            Some("This is an AI-generated analysis and is not medical advice.")
        );
        assert_eq!(
            report.probable_cause.as_deref(),
            Some("Irritant contact dermatitis from friction.")
        );
        assert_eq!(report.differential.len(), 3);
        assert!(report.treatment.is_some());
        assert!(report.references.as_deref().unwrap().contains("PMID: 123"));
        assert!(report.notes.is_none());
    }

    #[test]
    fn differential_entries_carry_rank_name_and_justification() {
        let report = parse_evaluation_report(SAMPLE);
        let first = &report.differential[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.name, "Irritant Contact Dermatitis");
        assert_eq!(first.likelihood, Likelihood::High);
        assert_eq!(
            first.justification,
            "Symptoms track friction exposure and resolve with rest."
        );

        let second = &report.differential[1];
        assert_eq!(second.likelihood, Likelihood::MediumLow);
        assert_eq!(second.likelihood_label, "Medium/Low");
        assert_eq!(second.justification, "Redness fits, but no discharge reported.");
    }

    #[test]
    fn likelihood_categories_match_exactly() {
        assert_eq!(Likelihood::from_label("HIGH"), Likelihood::High);
        assert_eq!(Likelihood::from_label("medium/low"), Likelihood::MediumLow);
        assert_eq!(Likelihood::from_label("Low"), Likelihood::Low);
        assert_eq!(Likelihood::from_label("Medium"), Likelihood::Medium);
        assert_eq!(Likelihood::from_label("Rare"), Likelihood::Medium);
        assert_eq!(Likelihood::from_label("Low-ish"), Likelihood::Medium);
    }

    #[test]
    fn unknown_likelihood_keeps_text_with_medium_styling() {
        let html = render_evaluation_report(SAMPLE);
        assert!(html.contains("probability-medium\"><i class=\"fa-solid fa-signal\"></i>Rare Probability"));
        assert!(html.contains("probability-medium-low"));
        assert!(html.contains("probability-high"));
    }

    #[test]
    fn treatment_plan_has_target_and_categories() {
        let plan = parse_evaluation_report(SAMPLE).treatment.unwrap();
        assert_eq!(plan.target.as_deref(), Some("Irritant Contact Dermatitis"));
        let keys: Vec<_> = plan.categories.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["pharmacological", "lifestyle", "follow_up"]);
        assert!(plan.categories[0].content.contains("Emollient twice daily."));
        assert!(!plan.categories[0].content.contains("lubrication"));

        let html = render_treatment(&plan);
        assert!(html.contains("<li>Low-potency topical steroid for 5-7 days.</li>"));
        assert!(html.contains("Follow-up Care"));
    }

    #[test]
    fn missing_sections_are_omitted() {
        let text = "### 1. Probable Cause\nTension headache.\n\n### 3. Suggested Treatment Plan\nRest and fluids.";
        let report = parse_evaluation_report(text);
        assert!(report.disclaimer.is_none());
        assert!(report.differential_text.is_none());
        assert_eq!(report.probable_cause.as_deref(), Some("Tension headache."));

        let html = render_evaluation_report(text);
        assert!(!html.contains("eval-section-differential"));
        assert!(html.contains("eval-section-treatment"));
        assert!(html.contains("Rest and fluids."));
    }

    #[test]
    fn differential_without_entries_renders_as_prose() {
        let text = "### 2. Differential Diagnosis\nToo early to say.";
        let report = parse_evaluation_report(text);
        assert!(report.differential.is_empty());
        let html = render_evaluation_report(text);
        assert!(html.contains("Too early to say."));
    }

    #[test]
    fn unstructured_evaluation_falls_back_to_generic_block() {
        let html = render_evaluation_report("The evaluator could not reach a conclusion.");
        assert!(html.contains("Clinical Evaluation Report"));
        assert!(html.contains("eval-section-generic"));
        assert!(html.contains("The evaluator could not reach a conclusion."));
    }

    #[test]
    fn unknown_headings_become_additional_notes() {
        let text = "### 1. Probable Cause\nAcne vulgaris.\n\n### 5. Concluding Summary\nFollow the plan.";
        let report = parse_evaluation_report(text);
        assert_eq!(report.probable_cause.as_deref(), Some("Acne vulgaris."));
        assert_eq!(
            report.notes.as_deref(),
            Some("### 5. Concluding Summary\nFollow the plan.")
        );
    }

    #[test]
    fn text_on_the_heading_line_is_section_content() {
        let text = "### 1. Probable Cause: Migraine without aura\n\n### 2. Differential Diagnosis\n* **1. Migraine (Likelihood: High)**\n  * **Justification:** Unilateral throbbing pain.";
        let report = parse_evaluation_report(text);
        assert_eq!(report.probable_cause.as_deref(), Some("Migraine without aura"));
        assert_eq!(report.differential.len(), 1);
        assert!(report.notes.is_none());

        let html = render_evaluation_report(text);
        assert!(html.contains("eval-section-probable"));
        assert!(html.contains("Migraine without aura"));
    }

    #[test]
    fn treatment_category_keeps_inline_text() {
        let plan = parse_evaluation_report(
            "### 3. Treatment Plan\n* **Pharmacological:** Ibuprofen 400 mg as needed.\n* **Follow-up:** Review in 1 week.",
        )
        .treatment
        .unwrap();
        assert_eq!(plan.categories.len(), 2);
        assert_eq!(plan.categories[0].content, "Ibuprofen 400 mg as needed.");
        assert_eq!(plan.categories[1].content, "Review in 1 week.");
    }

    #[test]
    fn diagnosis_names_may_contain_parentheses() {
        let text = "### 2. Differential Diagnosis\n*   **1. Acne Vulgaris (Likelihood: High)**\n    *   **Justification:** Comedones present.\n*   **2. Hidradenitis Suppurativa (Acne Inversa) (Likelihood: Low)**\n    *   **Justification:** No sinus tracts.";
        let entries = parse_evaluation_report(text).differential;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Acne Vulgaris", "Hidradenitis Suppurativa (Acne Inversa)"]
        );
        assert_eq!(entries[0].justification, "Comedones present.");
        assert_eq!(entries[1].likelihood, Likelihood::Low);
        assert_eq!(entries[1].justification, "No sinus tracts.");

        let html = render_evaluation_report(text);
        assert!(html.contains("Hidradenitis Suppurativa (Acne Inversa)"));
    }

    #[test]
    fn blocks_follow_grammar_order_not_text_order() {
        let html = render_evaluation_report(
            "### References\n- Smith 2020.\n\n### 1. Probable Cause\nMigraine.",
        );
        let probable = html.find("eval-section-probable").unwrap();
        let references = html.find("eval-section-references").unwrap();
        assert!(probable < references);
        assert!(html.contains("<li>Smith 2020.</li>"));
    }
}
