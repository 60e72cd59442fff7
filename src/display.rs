//! Render-time formatting for recurring items.
//!
//! Fallbacks live here rather than in the normalizer so the cached shape stays
//! faithful to what the aggregator reported.

use crate::controller::DisplayState;
use crate::types::RecurringItem;

pub const DEFAULT_DESCRIPTION: &str = "Unknown merchant";

pub fn display_description(item: &RecurringItem) -> &str {
    let description = item.description.trim();
    if description.is_empty() {
        DEFAULT_DESCRIPTION
    } else {
        description
    }
}

/// Absolute amount with two decimals. Outflows may be stored negative.
pub fn display_amount(item: &RecurringItem) -> String {
    format!("{:.2}", item.average_amount.amount.abs())
}

pub fn frequency_label(frequency: Option<&str>) -> &'static str {
    match frequency {
        Some("WEEKLY") => "Weekly",
        Some("BIWEEKLY") => "Every 2 weeks",
        Some("SEMI_MONTHLY") => "Twice a month",
        Some("MONTHLY") => "Monthly",
        Some("ANNUALLY") => "Yearly",
        _ => "Recurring",
    }
}

/// `FOOD_AND_DRINK_COFFEE` → `Food And Drink Coffee`.
pub fn category_label(code: &str) -> String {
    code.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Plain-text rendering of a controller view for the terminal.
pub fn render_text(view: &DisplayState) -> String {
    match view {
        DisplayState::Loading => "Loading your subscriptions...".to_string(),
        DisplayState::NeedsLink(_) => {
            "Link a bank account to see your recurring charges.".to_string()
        }
        DisplayState::Message(text) => text.clone(),
        DisplayState::Ready(items) => {
            let mut out = format!("Recurring charges ({})\n", items.len());
            for item in items {
                out.push_str(&render_item(item));
                out.push('\n');
            }
            out
        }
    }
}

fn render_item(item: &RecurringItem) -> String {
    let mut line = format!(
        "  {:<28} {:>10}  {}",
        display_description(item),
        display_amount(item),
        frequency_label(item.frequency.as_deref())
    );
    if let Some(next) = &item.predicted_next_date {
        line.push_str(&format!("  next {}", next));
    }
    if let Some(last) = &item.last_date {
        line.push_str(&format!("  last {}", last));
    }
    if let Some(code) = item.category_code() {
        line.push_str(&format!("  [{}]", category_label(code)));
    }
    line
}
