//! Calorie and macro heuristics.
//!
//! Everything here is pure and synchronous:
//!
//! | Module     | Responsibility                                              |
//! |------------|-------------------------------------------------------------|
//! | `tables`   | Versioned portion / quantity-word / food-macro tables       |
//! | `quantity` | Free-text quantity ("half", "2 pieces") → number            |
//! | `calories` | `FoodEntry` multipliers and the per-meal calorie breakdown  |
//! | `macros`   | Food detection in chat text and macro totals                |

pub mod calories;
pub mod macros;
pub mod quantity;
pub mod tables;

pub use calories::{BreakdownItem, CalorieBreakdown, FoodEntry, calculate};
pub use macros::{DetectedFood, MacroTotals, detect_foods};
pub use quantity::RawQuantity;
pub use tables::NutritionTables;
