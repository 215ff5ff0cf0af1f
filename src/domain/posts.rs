//! Pure helpers shared by post and comment handling.

use time::{Date, format_description::FormatItem, macros::format_description};

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// Reduce a submitted post or comment body to its meaningful content.
///
/// Returns `None` when nothing but whitespace was submitted; required-text
/// validation treats that the same as an absent field.
pub fn normalized_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn format_human_date(date: Date) -> String {
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn normalized_text_trims_surrounding_whitespace() {
        assert_eq!(
            normalized_text("  an observation \n"),
            Some("an observation".to_string())
        );
    }

    #[test]
    fn whitespace_only_text_is_absent() {
        assert_eq!(normalized_text(""), None);
        assert_eq!(normalized_text("   \t\n"), None);
    }

    #[test]
    fn human_dates_read_month_first() {
        assert_eq!(format_human_date(date!(2026 - 08 - 07)), "August 7, 2026");
    }
}
