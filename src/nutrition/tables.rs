//! Versioned heuristic tables.
//!
//! The built-in document lives in `config/nutrition.toml` and is embedded at
//! compile time. A deployment can point `nutrition_tables` in
//! `platewise.toml` at its own copy.
//!
//! ```toml
//! version = 1
//!
//! [portions]
//! bowl = 1.5
//!
//! [quantity_words]
//! two = 2.0
//!
//! [[foods]]
//! name = "idli"
//! protein = 2.0
//! carbs = 15.0
//! fats = 0.5
//! calories = 70.0
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::macros::MacroTotals;

/// Highest table document version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

const BUILTIN_TABLES: &str = include_str!("../../config/nutrition.toml");

static BUILTIN: LazyLock<NutritionTables> = LazyLock::new(|| {
    NutritionTables::parse(BUILTIN_TABLES).expect("embedded nutrition tables must parse")
});

/// Per-serving macros for one food in the coach's lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodMacros {
    pub name: String,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fats: f64,
    #[serde(default)]
    pub calories: f64,
}

impl FoodMacros {
    pub fn macros(&self) -> MacroTotals {
        MacroTotals {
            protein: self.protein,
            carbs: self.carbs,
            fats: self.fats,
            calories: self.calories,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionTables {
    pub version: u32,
    #[serde(default)]
    pub portions: HashMap<String, f64>,
    #[serde(default)]
    pub quantity_words: HashMap<String, f64>,
    #[serde(default)]
    pub foods: Vec<FoodMacros>,
}

impl Default for NutritionTables {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl NutritionTables {
    /// Load tables from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read nutrition tables: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse nutrition tables: {}", path.display()))
    }

    /// Parse tables from a TOML string. Keys are normalised to lowercase.
    pub fn parse(content: &str) -> Result<Self> {
        let mut tables: Self = toml::from_str(content).context("Invalid nutrition table TOML")?;
        if tables.version > SUPPORTED_VERSION {
            anyhow::bail!(
                "Nutrition table version {} is newer than supported version {}",
                tables.version,
                SUPPORTED_VERSION
            );
        }
        tables.portions = lowercase_keys(tables.portions);
        tables.quantity_words = lowercase_keys(tables.quantity_words);
        for food in &mut tables.foods {
            food.name = food.name.trim().to_lowercase();
        }
        Ok(tables)
    }

    /// Load from `path` when given, otherwise use the built-in tables.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Calorie multiplier for a portion description. Unknown portions count
    /// as one standard serving.
    pub fn portion_multiplier(&self, portion: &str) -> f64 {
        self.lookup_portion(portion).unwrap_or(1.0)
    }

    /// Multiplier for a known portion word, tolerating simple plurals.
    pub fn lookup_portion(&self, portion: &str) -> Option<f64> {
        lookup_plural(&self.portions, &portion.trim().to_lowercase())
    }

    /// Numeric value of a quantity word such as "two" or "an".
    pub fn quantity_word(&self, word: &str) -> Option<f64> {
        self.quantity_words.get(&word.trim().to_lowercase()).copied()
    }

    pub fn food(&self, name: &str) -> Option<&FoodMacros> {
        let name = name.trim().to_lowercase();
        self.foods.iter().find(|f| f.name == name)
    }

    /// Check the tables and return a list of warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.version == 0 {
            warnings.push("Nutrition table version must be at least 1".to_string());
        }

        let mut portions: Vec<_> = self.portions.iter().collect();
        portions.sort_by(|a, b| a.0.cmp(b.0));
        for (name, multiplier) in portions {
            if !multiplier.is_finite() || *multiplier <= 0.0 {
                warnings.push(format!(
                    "Portion '{}' has non-positive multiplier {}",
                    name, multiplier
                ));
            }
        }

        let mut seen = HashSet::new();
        for food in &self.foods {
            if food.name.is_empty() {
                warnings.push("Food entry with empty name".to_string());
            }
            if !seen.insert(food.name.as_str()) {
                warnings.push(format!("Duplicate food '{}'", food.name));
            }
            let m = food.macros();
            if [m.protein, m.carbs, m.fats, m.calories]
                .iter()
                .any(|v| !v.is_finite() || *v < 0.0)
            {
                warnings.push(format!("Food '{}' has negative macro values", food.name));
            }
        }

        warnings
    }
}

fn lowercase_keys(map: HashMap<String, f64>) -> HashMap<String, f64> {
    map.into_iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v))
        .collect()
}

fn lookup_plural(map: &HashMap<String, f64>, key: &str) -> Option<f64> {
    if key.is_empty() {
        return None;
    }
    map.get(key)
        .or_else(|| key.strip_suffix('s').and_then(|k| map.get(k)))
        .or_else(|| key.strip_suffix("es").and_then(|k| map.get(k)))
        .copied()
}
