//! Chat report formatting
//!
//! Turns a batch into a two-section, markdown-flavoured message. Only signings
//! and contract cancellations are reported; other contract types stay in the
//! store but are left out of the text.

use transfer_common::types::ContractKind;
use transfer_common::TransferRecord;

/// Default chat message cap in characters
pub const DEFAULT_MESSAGE_LIMIT: usize = 2000;

const INCOMING_HEADER: &str = ":white_check_mark: | **New Transfers**";
const OUTGOING_HEADER: &str = ":x: | **Departures**";
const INCOMING_GLYPH: &str = ":handshake:";
const OUTGOING_GLYPH: &str = ":wave:";

/// Format a batch; `None` when nothing in it is reportable
pub fn format_report(records: &[TransferRecord]) -> Option<String> {
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();

    for record in records {
        match record.contract_kind() {
            ContractKind::Classic => incoming.push(format_line(record, INCOMING_GLYPH)),
            ContractKind::Cancel => outgoing.push(format_line(record, OUTGOING_GLYPH)),
            ContractKind::Other => {},
        }
    }

    let sections: Vec<String> = [(INCOMING_HEADER, incoming), (OUTGOING_HEADER, outgoing)]
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(header, lines)| format!("{}\n{}", header, lines.join("\n")))
        .collect();

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

fn format_line(record: &TransferRecord, glyph: &str) -> String {
    format!(
        "{} [{}]({}) {} {}",
        record.date().format("%Y-%m-%d %H:%M"),
        record.player(),
        record.player_link(),
        glyph,
        record.club()
    )
}

/// Pack whole lines into chunks of at most `max_chars` characters
///
/// Lines are never split; a single line longer than the cap becomes its own
/// chunk. Blank lines between sections are kept inside a chunk but never start
/// one.
pub fn split_report(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };

        if !current.is_empty() && needed > max_chars {
            chunks.push(std::mem::take(&mut current).trim_end().to_string());
            current_len = 0;
        }

        if current.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            current.push_str(line);
            current_len = line_len;
        } else {
            current.push('\n');
            current.push_str(line);
            current_len += 1 + line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    chunks
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(player: &str, contract_type: &str) -> TransferRecord {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        TransferRecord::new(
            "Super League",
            player,
            format!("https://example.com/players/{}", player),
            date,
            "Red Lions",
            contract_type,
        )
        .unwrap()
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let report = format_report(&[
            record("alice", "Classic Contract"),
            record("bob", "CONTRACT   cancel "),
            record("carol", "Loan"),
        ])
        .unwrap();

        assert_eq!(
            report,
            ":white_check_mark: | **New Transfers**\n\
             2024-07-01 18:30 [alice](https://example.com/players/alice) :handshake: Red Lions\n\
             \n\
             :x: | **Departures**\n\
             2024-07-01 18:30 [bob](https://example.com/players/bob) :wave: Red Lions"
        );
        assert!(!report.contains("carol"));
    }

    #[test]
    fn test_empty_section_is_omitted() {
        let report = format_report(&[record("bob", "Contract Cancel")]).unwrap();
        assert!(report.starts_with(OUTGOING_HEADER));
        assert!(!report.contains(INCOMING_HEADER));
    }

    #[test]
    fn test_no_reportable_rows_yields_none() {
        assert_eq!(format_report(&[]), None);
        assert_eq!(format_report(&[record("carol", "Loan")]), None);
    }

    #[test]
    fn test_split_report_keeps_lines_whole() {
        let lines: Vec<String> = (0..50).map(|i| format!("line number {:02}", i)).collect();
        let text = lines.join("\n");

        let chunks = split_report(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
            for line in chunk.lines() {
                assert!(lines.contains(&line.to_string()));
            }
        }
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_split_report_oversized_line_is_own_chunk() {
        let long = "x".repeat(30);
        let text = format!("short\n{}\nshort", long);
        let chunks = split_report(&text, 10);
        assert_eq!(chunks, vec!["short".to_string(), long, "short".to_string()]);
    }

    #[test]
    fn test_split_report_single_chunk() {
        let report = format_report(&[record("alice", "Classic Contract")]).unwrap();
        assert_eq!(split_report(&report, DEFAULT_MESSAGE_LIMIT), vec![report]);
    }
}
