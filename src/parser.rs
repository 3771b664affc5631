//! Log line classification.
//!
//! Turns one raw text line into a fully populated [`LogRecord`] by trying an
//! ordered table of format rules and taking the first match. Parsing is
//! total: a line no rule recognizes still yields a valid record with
//! `level = UNKNOWN` and `service = "unrecognized"`.
//!
//! Rule order is a deliberate priority. The structured app-log format has
//! four identifiable fields and goes first; laxer shapes follow so an
//! ambiguous line cannot be captured by an overly generic rule. The
//! access-log format is tried last — its structure is distinct enough that
//! it cannot spuriously match lines meant for the earlier rules.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::models::{Level, LogRecord};

/// One recognized log-line shape: a start-anchored pattern plus the
/// extractor that turns its capture groups into a record.
struct FormatRule {
    name: &'static str,
    pattern: Regex,
    extract: fn(&Captures, &str) -> LogRecord,
}

static FORMAT_RULES: LazyLock<[FormatRule; 4]> = LazyLock::new(|| {
    [
        // 2024-12-01 03:17:44 ERROR payment-svc - DB conn failed
        FormatRule {
            name: "app",
            pattern: Regex::new(
                r"^(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})\s+(ERROR|WARN|INFO|DEBUG)\s+(\S+)\s+-\s+(.+)",
            )
            .expect("valid regex literal"),
            extract: extract_app,
        },
        // Dec  1 03:17:44 prod-server-01 nginx[1234]: upstream timed out
        FormatRule {
            name: "syslog",
            pattern: Regex::new(r"^(\w+\s+\d+\s+[\d:]+)\s+(\S+)\s+(\w+)(?:\[\d+\])?: (.+)")
                .expect("valid regex literal"),
            extract: extract_syslog,
        },
        // [WARNING] disk low
        FormatRule {
            name: "bracketed",
            pattern: Regex::new(r"^\[(ERROR|WARN|WARNING|INFO|DEBUG)\]\s+(.+)")
                .expect("valid regex literal"),
            extract: extract_bracketed,
        },
        // 192.168.1.1 - - [01/Dec/2024:03:17:44 +0000] "GET /api HTTP/1.1" 500 1234
        FormatRule {
            name: "access",
            pattern: Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) (\S+)[^"]*" (\d+)"#)
                .expect("valid regex literal"),
            extract: extract_access,
        },
    ]
});

/// Parse one raw line into a record. Total — never fails, never panics.
pub fn parse_line(raw_line: &str) -> LogRecord {
    for rule in FORMAT_RULES.iter() {
        if let Some(caps) = rule.pattern.captures(raw_line) {
            return (rule.extract)(&caps, raw_line);
        }
    }

    make_record(
        Utc::now(),
        Level::Unknown,
        "unrecognized",
        raw_line.trim(),
        "unknown",
        raw_line,
    )
}

/// Parse a whole file body. Blank and whitespace-only lines are skipped —
/// not counted, not emitted. Output order matches input order; lines are
/// parsed independently with no shared state.
pub fn parse_lines(content: &str) -> Vec<LogRecord> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

/// Name of the first rule matching `line`, or `None` for fallback lines.
pub fn matched_rule(line: &str) -> Option<&'static str> {
    FORMAT_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(line))
        .map(|rule| rule.name)
}

fn extract_app(caps: &Captures, raw_line: &str) -> LogRecord {
    // The pattern constrains the digits, so this parse only fails on exotic
    // spacing; substitute processing time rather than failing the line.
    let timestamp = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now());

    make_record(
        timestamp,
        Level::parse(&caps[2]),
        &caps[3],
        caps[4].trim(),
        "unknown",
        raw_line,
    )
}

fn extract_syslog(caps: &Captures, raw_line: &str) -> LogRecord {
    // The syslog date token has no year, so it is not trustworthy enough to
    // parse; processing time stands in. The format carries no level either.
    make_record(
        Utc::now(),
        Level::Info,
        &caps[3],
        caps[4].trim(),
        &caps[2],
        raw_line,
    )
}

fn extract_bracketed(caps: &Captures, raw_line: &str) -> LogRecord {
    make_record(
        Utc::now(),
        Level::parse(&caps[1]),
        "unknown",
        caps[2].trim(),
        "unknown",
        raw_line,
    )
}

fn extract_access(caps: &Captures, raw_line: &str) -> LogRecord {
    let status: u32 = caps[5].parse().unwrap_or(0);
    let message = format!("{} {} → HTTP {}", &caps[3], &caps[4], status);

    make_record(
        Utc::now(),
        Level::from_status(status),
        "web-server",
        &message,
        &caps[1],
        raw_line,
    )
}

fn make_record(
    timestamp: DateTime<Utc>,
    level: Level,
    service: &str,
    message: &str,
    host: &str,
    raw_line: &str,
) -> LogRecord {
    LogRecord {
        id: Uuid::new_v4().to_string(),
        timestamp,
        level,
        service: service.to_string(),
        message: message.to_string(),
        host: host.to_string(),
        raw_line: raw_line.to_string(),
        anomaly_score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_app_log_matches_first() {
        let record = parse_line("2024-12-01 03:17:44 ERROR payment-svc - DB conn failed");
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.service, "payment-svc");
        assert_eq!(record.message, "DB conn failed");
        assert_eq!(record.host, "unknown");
        assert_eq!(matched_rule("2024-12-01 03:17:44 ERROR payment-svc - DB conn failed"), Some("app"));
    }

    #[test]
    fn test_app_log_timestamp_parsed() {
        let record = parse_line("2024-12-01 03:17:44 INFO auth-svc - User logged in");
        assert_eq!(record.timestamp.year(), 2024);
        assert_eq!(record.timestamp.month(), 12);
        assert_eq!(record.timestamp.day(), 1);
        assert_eq!(record.timestamp.hour(), 3);
        assert_eq!(record.timestamp.minute(), 17);
        assert_eq!(record.timestamp.second(), 44);
    }

    #[test]
    fn test_syslog_captures_host_and_service() {
        let record = parse_line("Dec  1 03:17:44 prod-server-01 nginx[1234]: upstream timed out");
        assert_eq!(record.level, Level::Info);
        assert_eq!(record.host, "prod-server-01");
        assert_eq!(record.service, "nginx");
        assert_eq!(record.message, "upstream timed out");
    }

    #[test]
    fn test_syslog_without_pid() {
        let record = parse_line("Dec  1 03:17:45 prod-server-01 sshd: accepted publickey");
        assert_eq!(record.service, "sshd");
        assert_eq!(record.message, "accepted publickey");
    }

    #[test]
    fn test_bracketed_canonicalizes_warning() {
        let record = parse_line("[WARNING] disk low");
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.service, "unknown");
        assert_eq!(record.host, "unknown");
        assert_eq!(record.message, "disk low");
    }

    #[test]
    fn test_access_log_derives_level_from_status() {
        let record =
            parse_line(r#"192.168.1.1 - - [01/Dec/2024:03:17:44 +0000] "GET /api HTTP/1.1" 500 1234"#);
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.service, "web-server");
        assert_eq!(record.host, "192.168.1.1");
        assert_eq!(record.message, "GET /api → HTTP 500");
    }

    #[test]
    fn test_access_log_status_bands() {
        let warn =
            parse_line(r#"10.0.0.7 - - [01/Dec/2024:03:18:01 +0000] "POST /login HTTP/1.1" 403 88"#);
        assert_eq!(warn.level, Level::Warn);

        let info =
            parse_line(r#"10.0.0.7 - - [01/Dec/2024:03:18:02 +0000] "GET /health HTTP/1.1" 200 2"#);
        assert_eq!(info.level, Level::Info);
    }

    #[test]
    fn test_fallback_record() {
        let record = parse_line("garbage line #### not a real log @@");
        assert_eq!(record.level, Level::Unknown);
        assert_eq!(record.service, "unrecognized");
        assert_eq!(record.host, "unknown");
        assert_eq!(record.message, "garbage line #### not a real log @@");
        assert_eq!(matched_rule("garbage line #### not a real log @@"), None);
    }

    #[test]
    fn test_totality_on_hostile_input() {
        // Whatever comes in, a populated record comes out.
        for line in ["", "   ", "\u{0}\u{1}\u{2}", "[", "\"", "]]]]", "é¿—ツ"] {
            let record = parse_line(line);
            assert_eq!(record.raw_line, line);
            assert!(!record.service.is_empty());
            assert!(!record.host.is_empty());
        }
    }

    #[test]
    fn test_totality_on_huge_line() {
        let line = "x".repeat(2 * 1024 * 1024);
        let record = parse_line(&line);
        assert_eq!(record.level, Level::Unknown);
        assert_eq!(record.message.len(), line.len());
    }

    #[test]
    fn test_priority_app_over_laxer_rules() {
        // A structured app line must never be claimed by a later rule.
        let line = "2024-12-01 03:17:44 ERROR payment-svc - DB conn failed";
        assert_eq!(matched_rule(line), Some("app"));
        let record = parse_line(line);
        assert_eq!(record.service, "payment-svc");
        assert_ne!(record.service, "unknown");
    }

    #[test]
    fn test_raw_line_preserved_untrimmed() {
        let record = parse_line("[ERROR] trailing spaces   ");
        assert_eq!(record.raw_line, "[ERROR] trailing spaces   ");
        assert_eq!(record.message, "trailing spaces");
    }

    #[test]
    fn test_parse_lines_skips_blanks_preserves_order() {
        let content = "[INFO] first\n\n   \n[ERROR] second\ngarbage\n";
        let records = parse_lines(content);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "first");
        assert_eq!(records[1].message, "second");
        assert_eq!(records[2].service, "unrecognized");
    }

    #[test]
    fn test_parse_lines_empty_content() {
        assert!(parse_lines("").is_empty());
        assert!(parse_lines("\n\n  \n").is_empty());
    }
}
