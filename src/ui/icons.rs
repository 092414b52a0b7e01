//! Shared terminal icons, with plain-text fallbacks for dumb terminals.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static PLATE: Emoji<'_, '_> = Emoji("🍽️  ", "");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
