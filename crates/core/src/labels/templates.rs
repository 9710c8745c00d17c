//! Fixed label templates keyed by severity code.
//!
//! New label rows are always built from these templates, so every deployment names and
//! describes its labels the same way. Recommendation ranges follow the configured thresholds.

use crate::config::Thresholds;
use crate::error::CoreResult;
use crate::id::RecordId;
use crate::models::{Recommendation, SeverityLabel};
use muac_types::{NonEmptyText, SeverityCode};

struct SeverityTemplate {
    name: &'static str,
    description: &'static str,
}

struct RecommendationTemplate {
    name: &'static str,
    body: &'static str,
}

fn severity_template(code: SeverityCode) -> SeverityTemplate {
    match code {
        SeverityCode::Green => SeverityTemplate {
            name: "Normal nutritional status",
            description: "Arm circumference is within the expected range for age. \
                          No signs of acute malnutrition.",
        },
        SeverityCode::Yellow => SeverityTemplate {
            name: "Moderate acute malnutrition",
            description: "Arm circumference is below the normal range. The child is at risk \
                          and needs closer follow-up and nutritional support.",
        },
        SeverityCode::Red => SeverityTemplate {
            name: "Severe acute malnutrition",
            description: "Arm circumference is critically low. The child is in danger and \
                          needs immediate medical assessment.",
        },
    }
}

fn recommendation_template(code: SeverityCode) -> RecommendationTemplate {
    match code {
        SeverityCode::Green => RecommendationTemplate {
            name: "Continue routine monitoring",
            body: "Keep up a varied diet with breast milk or milk, cereals, legumes, fruit, \
                   vegetables and an animal-source food every day. Measure again at the next \
                   routine visit, or within a month if the child falls ill.",
        },
        SeverityCode::Yellow => RecommendationTemplate {
            name: "Start supplementary feeding",
            body: "Enrol the child in a supplementary feeding programme and add an extra \
                   energy-dense meal each day. Counsel the caretaker on hygiene and feeding \
                   during illness. Measure again within two weeks and refer if the value drops.",
        },
        SeverityCode::Red => RecommendationTemplate {
            name: "Urgent referral to a health facility",
            body: "Refer the child today to the nearest health facility for medical assessment \
                   and therapeutic feeding. Check for oedema, appetite and danger signs. Do \
                   not wait for the next scheduled visit; follow up within 48 hours.",
        },
    }
}

/// A new, active severity label for `code`.
pub fn severity_label(code: SeverityCode) -> CoreResult<SeverityLabel> {
    let template = severity_template(code);
    Ok(SeverityLabel {
        id: RecordId::new(),
        name: NonEmptyText::new(template.name)?,
        description: template.description.to_string(),
        color_hex: code.color_hex().to_string(),
        severity_code: Some(code),
        priority: code.priority(),
        active: true,
    })
}

/// A new, active recommendation for `code` whose range is the code's classification band.
pub fn recommendation(code: SeverityCode, thresholds: &Thresholds) -> CoreResult<Recommendation> {
    let template = recommendation_template(code);
    let (min_value, max_value) = range_for(code, thresholds);
    Ok(Recommendation {
        id: RecordId::new(),
        name: NonEmptyText::new(template.name)?,
        body_text: template.body.to_string(),
        min_value,
        max_value,
        priority: code.priority(),
        color_hex: code.color_hex().to_string(),
        severity_code: Some(code),
        active: true,
    })
}

/// The `[min, max)` band a code covers under `thresholds`.
pub fn range_for(code: SeverityCode, thresholds: &Thresholds) -> (Option<f64>, Option<f64>) {
    match code {
        SeverityCode::Green => (Some(thresholds.normal()), None),
        SeverityCode::Yellow => (Some(thresholds.severe()), Some(thresholds.normal())),
        SeverityCode::Red => (None, Some(thresholds.severe())),
    }
}

/// Canonical severity label name for `code`.
pub fn severity_label_name(code: SeverityCode) -> &'static str {
    severity_template(code).name
}

/// Canonical recommendation name for `code`.
pub fn recommendation_name(code: SeverityCode) -> &'static str {
    recommendation_template(code).name
}

/// Reduces a label name to a comparable form.
///
/// Markup tags (`<b>…</b>`) are dropped, as is every character that is not alphanumeric or
/// whitespace (emoji, punctuation). Whitespace is collapsed and the result lower-cased.
pub fn normalize_name(name: &str) -> String {
    let mut stripped = String::with_capacity(name.len());
    let mut in_tag = false;
    for c in name.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_alphanumeric() || c.is_whitespace() => stripped.push(c),
            _ => stripped.push(' '),
        }
    }
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
