use chrono::NaiveDate;
use ratatui::prelude::Color;
use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Trailing-edge debounce: every `trigger` replaces the pending value and
/// pushes the deadline `wait` into the future; `fire` hands the value back
/// once the quiet window has elapsed.
#[derive(Debug)]
pub struct Debouncer<T> {
    wait: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(wait: Duration) -> Self {
        Debouncer {
            wait,
            pending: None,
        }
    }

    pub fn trigger(&mut self, value: T, now: Instant) {
        self.pending = Some((now + self.wait, value));
    }

    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn take(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Danger,
    Warning,
    Info,
    Success,
    Secondary,
}

impl Tone {
    pub fn color(self) -> Color {
        match self {
            Tone::Danger => Color::LightRed,
            Tone::Warning => Color::LightYellow,
            Tone::Info => Color::LightCyan,
            Tone::Success => Color::LightGreen,
            Tone::Secondary => Color::Gray,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tone::Danger => "danger",
            Tone::Warning => "warning",
            Tone::Info => "info",
            Tone::Success => "success",
            Tone::Secondary => "secondary",
        }
    }
}

pub fn priority_tone(priority: &str) -> Tone {
    match priority {
        "urgent" => Tone::Danger,
        "high" => Tone::Warning,
        "medium" => Tone::Info,
        "low" => Tone::Secondary,
        _ => Tone::Secondary,
    }
}

pub fn status_tone(status: &str) -> Tone {
    match status {
        "pending" => Tone::Warning,
        "in_progress" => Tone::Info,
        "completed" => Tone::Success,
        "cancelled" => Tone::Secondary,
        _ => Tone::Secondary,
    }
}

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// `local@domain.tld`: no whitespace, exactly one `@` separating two
/// non-empty parts, and a dot with text on both sides after the `@`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueLabel {
    pub text: String,
    pub tone: Option<Tone>,
}

/// Human description of how close a due date is relative to `today`.
pub fn due_label(due: Option<NaiveDate>, today: NaiveDate) -> DueLabel {
    let due = match due {
        Some(d) => d,
        None => {
            return DueLabel {
                text: "No date".into(),
                tone: None,
            }
        }
    };
    let days = (due - today).num_days();
    let (text, tone) = if days < 0 {
        (format!("{} days overdue", days.abs()), Some(Tone::Danger))
    } else if days == 0 {
        ("Due today".to_string(), Some(Tone::Warning))
    } else if days == 1 {
        ("Due tomorrow".to_string(), Some(Tone::Info))
    } else if days <= 7 {
        (format!("Due in {} days", days), Some(Tone::Warning))
    } else {
        (due.format("%Y-%m-%d").to_string(), None)
    };
    DueLabel { text, tone }
}

pub fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn debouncer_only_fires_after_quiet_window() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        debounce.trigger(1, start);
        debounce.trigger(2, start + Duration::from_millis(400));
        debounce.trigger(3, start + Duration::from_millis(900));

        assert_eq!(debounce.fire(start + Duration::from_millis(1500)), None);
        assert_eq!(debounce.fire(start + Duration::from_millis(1900)), Some(3));
        assert_eq!(debounce.fire(start + Duration::from_millis(5000)), None);
        assert!(!debounce.is_pending());
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b@sub.example.org"));
        assert!(!is_valid_email("bad"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana@.com"));
        assert!(!is_valid_email("ana@example."));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana smith@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("ana@example.com\n"));
        assert!(is_valid_email("ana@mail.example.c"));
    }

    #[test]
    fn due_label_ranges() {
        let today = day(2024, 5, 10);
        assert_eq!(due_label(None, today).text, "No date");
        let overdue = due_label(Some(day(2024, 5, 7)), today);
        assert_eq!(overdue.text, "3 days overdue");
        assert_eq!(overdue.tone, Some(Tone::Danger));
        assert_eq!(due_label(Some(today), today).text, "Due today");
        assert_eq!(due_label(Some(day(2024, 5, 11)), today).text, "Due tomorrow");
        assert_eq!(due_label(Some(day(2024, 5, 17)), today).text, "Due in 7 days");
        let later = due_label(Some(day(2024, 6, 1)), today);
        assert_eq!(later.text, "2024-06-01");
        assert_eq!(later.tone, None);
    }

    #[test]
    fn tones_fall_back_to_secondary() {
        assert_eq!(priority_tone("urgent"), Tone::Danger);
        assert_eq!(priority_tone("medium"), Tone::Info);
        assert_eq!(priority_tone("whenever"), Tone::Secondary);
        assert_eq!(status_tone("completed"), Tone::Success);
        assert_eq!(status_tone("archived"), Tone::Secondary);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a longer title", 8), "a lon...");
        assert_eq!(truncate_text("anything", 0), "");
    }
}
