pub mod icons;
pub mod report;

pub use report::{print_breakdown, print_insights, spinner};
