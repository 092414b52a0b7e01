//! Quantity normalisation for LLM-reported amounts.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tables::NutritionTables;
use crate::util::first_number;

static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").unwrap());

/// A quantity as the model reported it: a number, or free text such as
/// `"half"`, `"2 pieces"` or `"a little"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    Number(f64),
    Text(String),
}

impl RawQuantity {
    pub fn resolve(&self, tables: &NutritionTables) -> f64 {
        match self {
            RawQuantity::Number(n) => sanitize(*n),
            RawQuantity::Text(text) => parse_quantity_text(text, tables),
        }
    }
}

/// Turn a free-text quantity into a number. Falls back to one serving.
pub fn parse_quantity_text(text: &str, tables: &NutritionTables) -> f64 {
    let lower = text.trim().to_lowercase();

    if lower.contains("bit") || lower.contains("little") {
        return 0.5;
    }
    if lower.contains("half") {
        return 0.5;
    }
    if lower.contains("quarter") {
        return 0.25;
    }

    if let Some(caps) = FRACTION.captures(&lower) {
        let num: f64 = caps[1].parse().unwrap_or(0.0);
        let den: f64 = caps[2].parse().unwrap_or(0.0);
        if den > 0.0 {
            return sanitize(num / den);
        }
    }

    if let Some(n) = first_number(&lower) {
        return sanitize(n);
    }

    // Articles only count when nothing more specific is present ("a couple").
    let mut article = None;
    for word in lower.split(|c: char| !c.is_alphabetic()) {
        if let Some(value) = tables.quantity_word(word) {
            if is_article(word) {
                article.get_or_insert(value);
            } else {
                return sanitize(value);
            }
        }
    }
    article.map(sanitize).unwrap_or(1.0)
}

fn is_article(word: &str) -> bool {
    matches!(word, "a" | "an")
}

/// Quantities must be positive and finite; anything else becomes 1.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}
