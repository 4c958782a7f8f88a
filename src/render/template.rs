//! Receipt markup for queued tasks
//!
//! The layout is fixed; only the priority style and the task text vary.

use crate::errors::{DaemonError, Result};
use crate::queue::{Priority, PrintJob};
use askama::Template;

/// Border and icon drawn around the priority line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityStyle {
    pub border: &'static str,
    pub icon: &'static str,
}

impl PriorityStyle {
    pub const LOW: Self = Self {
        border: "4px double black",
        icon: "◆",
    };
    pub const NORMAL: Self = Self {
        border: "3px solid black",
        icon: "●",
    };
    pub const HIGH: Self = Self {
        border: "4px solid black",
        icon: "▲",
    };
    pub const URGENT: Self = Self {
        border: "6px double black",
        icon: "🚨🚨🚨",
    };
    pub const MESSAGE: Self = Self {
        border: "none",
        icon: "💬",
    };
    pub const INFO: Self = Self {
        border: "none",
        icon: "ℹ",
    };

    /// Unknown tags fall back to the normal style
    pub fn for_priority(priority: &Priority) -> Self {
        match priority {
            Priority::Low => Self::LOW,
            Priority::Normal | Priority::Other(_) => Self::NORMAL,
            Priority::High => Self::HIGH,
            Priority::Urgent => Self::URGENT,
            Priority::Message => Self::MESSAGE,
            Priority::Info => Self::INFO,
        }
    }
}

#[derive(Template)]
#[template(path = "receipt.html")]
struct ReceiptTemplate<'a> {
    width: u32,
    border: &'static str,
    icon: &'static str,
    priority_label: &'a str,
    title: &'a str,
    description_lines: Vec<&'a str>,
    due_date: Option<&'a str>,
}

/// Build the full HTML document for a task receipt `width` dots wide
pub fn receipt_markup(job: &PrintJob, width: u32) -> Result<String> {
    let style = PriorityStyle::for_priority(&job.priority);

    let template = ReceiptTemplate {
        width,
        border: style.border,
        icon: style.icon,
        priority_label: job.priority.label(),
        title: &job.title,
        description_lines: job.description.split('\n').collect(),
        due_date: job.due_date.as_deref(),
    };

    template
        .render()
        .map_err(|e| DaemonError::Render(format!("Template rendering failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(priority: &str, due_date: Option<&str>) -> PrintJob {
        PrintJob::new(
            Some("T".to_string()),
            Some("line1\nline2".to_string()),
            Some(priority.to_string()),
            due_date.map(String::from),
        )
    }

    #[test]
    fn test_style_table() {
        assert_eq!(PriorityStyle::for_priority(&Priority::Urgent).icon, "🚨🚨🚨");
        assert_eq!(PriorityStyle::for_priority(&Priority::Message).border, "none");
        assert_eq!(
            PriorityStyle::for_priority(&Priority::Other("x".into())),
            PriorityStyle::NORMAL
        );
    }

    #[test]
    fn test_unknown_priority_uses_normal_style_with_literal_label() {
        let html = receipt_markup(&job("unknown-tag", None), 576).unwrap();

        assert!(html.contains("● unknown-tag ●"));
        assert!(html.contains("border-top: 3px solid black;"));
    }

    #[test]
    fn test_urgent_style() {
        let html = receipt_markup(&job("urgent", None), 576).unwrap();

        assert!(html.contains("🚨🚨🚨 urgent 🚨🚨🚨"));
        assert!(html.contains("border-top: 6px double black;"));
    }

    #[test]
    fn test_description_line_breaks() {
        let html = receipt_markup(&job("normal", None), 576).unwrap();
        assert!(html.contains("line1<br />line2"));
    }

    #[test]
    fn test_due_date_absent_renders_no_line() {
        let html = receipt_markup(&job("normal", None), 576).unwrap();
        assert!(!html.contains("class=\"due-date\">"));
        assert!(!html.contains("Due:"));
    }

    #[test]
    fn test_due_date_present_renders_exactly_one_line() {
        let html = receipt_markup(&job("normal", Some("May, 23")), 576).unwrap();
        assert_eq!(html.matches("class=\"due-date\">").count(), 1);
        assert_eq!(html.matches("Due: May, 23").count(), 1);
    }

    #[test]
    fn test_user_text_is_escaped() {
        let job = PrintJob::new(
            Some("<b>bold</b>".to_string()),
            None,
            None,
            Some("a&b".to_string()),
        );
        let html = receipt_markup(&job, 576).unwrap();
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("&#60;b&#62;bold&#60;/b&#62;"));
        assert!(html.contains("Due: a&#38;b"));
        assert!(!html.contains("a&b"));
    }

    #[test]
    fn test_two_dividers_and_width() {
        let html = receipt_markup(&job("low", None), 384).unwrap();
        assert_eq!(html.matches("<svg class=\"divider\"").count(), 2);
        assert!(html.contains("width: 384px;"));
    }
}
