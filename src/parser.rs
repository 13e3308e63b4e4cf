use regex::Regex;
use std::sync::OnceLock;

/// Highest priority the server understands (p1).
pub const MAX_PRIORITY: i32 = 4;

#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Option<i32>,
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!(\d+)\s*").expect("valid priority pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Splits quick-add input such as `"Call mom !3"` into a title and priority.
///
/// The first `!N` with N in 1..=4 wins. Every `!N` marker is dropped from the
/// title, valid or not.
pub fn parse_task_input(input: &str) -> ParsedTask {
    let priority = priority_re()
        .captures_iter(input)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
        .find(|p| (1..=MAX_PRIORITY).contains(p));

    let title = priority_re().replace_all(input, "");
    let title = whitespace_re().replace_all(&title, " ").trim().to_string();

    ParsedTask { title, priority }
}

/// Short tag shown next to a task, `p1` being the most urgent.
pub fn priority_label(priority: i32) -> Option<String> {
    if (1..=MAX_PRIORITY).contains(&priority) {
        Some(format!("p{}", MAX_PRIORITY + 1 - priority))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_priority_in_middle() {
        let result = parse_task_input("Renew passport !4 before trip");
        assert_eq!(
            result,
            ParsedTask {
                title: "Renew passport before trip".to_string(),
                priority: Some(4),
            }
        );
    }

    #[test]
    fn test_parse_with_priority_at_start_no_space() {
        let result = parse_task_input("!2Book dentist");
        assert_eq!(result.title, "Book dentist");
        assert_eq!(result.priority, Some(2));
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let result = parse_task_input("  Water   the  plants   ");
        assert_eq!(result.title, "Water the plants");
        assert_eq!(result.priority, None);
    }

    #[test]
    fn test_first_valid_priority_wins() {
        let result = parse_task_input("!9 !1 !3 Pay rent");
        assert_eq!(result.title, "Pay rent");
        assert_eq!(result.priority, Some(1));
    }

    #[test]
    fn test_out_of_range_priority_is_dropped() {
        let result = parse_task_input("Check logs !5 today");
        assert_eq!(result.title, "Check logs today");
        assert_eq!(result.priority, None);
    }

    #[test]
    fn test_only_marker_leaves_blank_title() {
        assert_eq!(parse_task_input("!2").title, "");
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(priority_label(4).as_deref(), Some("p1"));
        assert_eq!(priority_label(1).as_deref(), Some("p4"));
        assert_eq!(priority_label(0), None);
    }
}
