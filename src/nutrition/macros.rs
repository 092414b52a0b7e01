//! Macro estimation for foods mentioned in coach conversations.

use std::ops::Add;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tables::NutritionTables;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|[a-z]+").unwrap());

/// How many tokens before a food name are searched for quantity and size.
const LOOKBACK: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub calories: f64,
}

impl MacroTotals {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fats: self.fats * factor,
            calories: self.calories * factor,
        }
    }

    pub fn sum<'a>(items: impl IntoIterator<Item = &'a MacroTotals>) -> Self {
        items.into_iter().fold(Self::default(), |acc, m| acc + *m)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for MacroTotals {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            protein: self.protein + other.protein,
            carbs: self.carbs + other.carbs,
            fats: self.fats + other.fats,
            calories: self.calories + other.calories,
        }
    }
}

/// A table food found in free text, with its scaled macros.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedFood {
    pub name: String,
    pub quantity: f64,
    pub container_multiplier: f64,
    pub macros: MacroTotals,
}

/// Find table foods mentioned in `message`.
///
/// Multi-word foods are matched before single words and consume their
/// tokens, so "boiled egg" is not also counted as "egg". A quantity
/// (numeral or number word) and a container/size word are looked for in the
/// few tokens before each match.
pub fn detect_foods(message: &str, tables: &NutritionTables) -> Vec<DetectedFood> {
    let lower = message.to_lowercase();
    let tokens: Vec<&str> = TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();
    let mut consumed = vec![false; tokens.len()];

    let mut foods: Vec<_> = tables.foods.iter().collect();
    foods.sort_by_key(|f| std::cmp::Reverse(f.name.split_whitespace().count()));

    let mut matches = Vec::new();
    for food in foods {
        let words: Vec<&str> = food.name.split_whitespace().collect();
        if words.is_empty() || words.len() > tokens.len() {
            continue;
        }
        for start in 0..=tokens.len() - words.len() {
            let span = start..start + words.len();
            if consumed[span.clone()].iter().any(|c| *c) {
                continue;
            }
            if !matches_words(&tokens[span.clone()], &words) {
                continue;
            }
            for flag in &mut consumed[span] {
                *flag = true;
            }
            matches.push((start, food));
        }
    }

    // Qualifiers are read only after every food span is marked, so a
    // neighbouring food always bounds the look-back regardless of table order.
    matches.sort_by_key(|(start, _)| *start);
    matches
        .into_iter()
        .map(|(start, food)| {
            let (quantity, container_multiplier) =
                scan_qualifiers(&tokens, &consumed, start, tables);
            DetectedFood {
                name: food.name.clone(),
                quantity,
                container_multiplier,
                macros: food.macros().scaled(quantity * container_multiplier),
            }
        })
        .collect()
}

/// Combined macros of everything detected.
pub fn total_macros(foods: &[DetectedFood]) -> MacroTotals {
    MacroTotals::sum(foods.iter().map(|f| &f.macros))
}

fn matches_words(tokens: &[&str], words: &[&str]) -> bool {
    let last = words.len() - 1;
    tokens.iter().zip(words).enumerate().all(|(i, (token, word))| {
        token == word
            || (i == last
                && (token.strip_suffix('s') == Some(*word)
                    || token.strip_suffix("es") == Some(*word)))
    })
}

fn scan_qualifiers(
    tokens: &[&str],
    consumed: &[bool],
    start: usize,
    tables: &NutritionTables,
) -> (f64, f64) {
    let mut quantity = None;
    let mut container = None;

    for idx in (start.saturating_sub(LOOKBACK)..start).rev() {
        // Another food's tokens mark the boundary of this one's qualifiers.
        if consumed[idx] {
            break;
        }
        let token = tokens[idx];
        if quantity.is_none() {
            quantity = token
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n > 0.0)
                .or_else(|| tables.quantity_word(token));
        }
        if container.is_none() {
            container = tables.lookup_portion(token);
        }
    }

    (quantity.unwrap_or(1.0), container.unwrap_or(1.0))
}
