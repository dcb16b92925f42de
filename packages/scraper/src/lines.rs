//! Line-level helpers shared by the text-based strategies.
//!
//! PDF text layers and HTML body text both arrive as loose lines. These
//! helpers normalise whitespace, split lines into columns on wide gaps,
//! and stitch continuation lines onto the record they belong to.

use std::sync::LazyLock;

use regex::Regex;

use crate::{CandidateKind, ExtractionCandidate, ExtractionHints, Provenance};

static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{2,}").expect("valid regex"));

/// Words that show up in the header row of a tax-sale table.
pub const HEADER_KEYWORDS: &[&str] = &[
    "aan",
    "assessment",
    "account",
    "owner",
    "name",
    "description",
    "location",
    "address",
    "pid",
    "parcel",
    "opening bid",
    "upset",
    "amount",
    "taxes",
    "hst",
    "redeemable",
];

/// Replaces non-breaking spaces and trims.
///
/// Internal runs of whitespace are left alone because the table
/// strategies rely on wide gaps as column separators.
#[must_use]
pub fn normalize_whitespace(line: &str) -> String {
    line.replace(['\u{a0}', '\u{2007}', '\u{202f}'], " ")
        .trim()
        .to_owned()
}

/// Collapses every run of whitespace to a single space.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a line into columns on tabs or runs of two or more spaces.
#[must_use]
pub fn split_columns(line: &str) -> Vec<String> {
    COLUMN_GAP
        .split(&normalize_whitespace(line))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Returns `true` if at least two columns look like header words and none
/// of them look like a record.
#[must_use]
pub fn looks_like_header(cells: &[String], record_start: &Regex) -> bool {
    if cells.iter().any(|c| record_start.is_match(c)) {
        return false;
    }
    let hits = cells
        .iter()
        .filter(|cell| {
            let lower = cell.to_lowercase();
            HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .count();
    hits >= 2
}

/// Groups lines into record blocks.
///
/// A line matching `record_start` opens a new block. Following lines that
/// don't match are appended to the open block with a single space. Lines
/// before the first record are dropped. Returns `(first_line_index, text)`
/// pairs.
#[must_use]
pub fn group_record_blocks<S: AsRef<str>>(lines: &[S], record_start: &Regex) -> Vec<(usize, String)> {
    let mut blocks: Vec<(usize, String)> = Vec::new();

    for (index, raw) in lines.iter().enumerate() {
        let line = collapse_whitespace(&normalize_whitespace(raw.as_ref()));
        if line.is_empty() {
            continue;
        }

        if record_start.is_match(&line) {
            blocks.push((index, line));
        } else if let Some((_, block)) = blocks.last_mut() {
            block.push(' ');
            block.push_str(&line);
        }
    }

    blocks
}

/// Turns column-aligned text lines into table-row candidates.
///
/// Header lines are remembered and attached to the rows that follow them.
/// A line becomes a row only when it has at least
/// [`ExtractionHints::min_table_columns`] columns and one of them matches
/// the record-start pattern.
#[must_use]
pub fn table_rows_from_lines<S: AsRef<str>>(
    lines: &[S],
    hints: &ExtractionHints,
    strategy: &'static str,
    page: Option<u32>,
) -> Vec<ExtractionCandidate> {
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for raw in lines {
        let cells = split_columns(raw.as_ref());
        if cells.is_empty() {
            continue;
        }

        if looks_like_header(&cells, &hints.record_start) {
            headers = Some(cells);
            continue;
        }

        if cells.len() < hints.min_table_columns
            || !cells.iter().any(|c| hints.record_start.is_match(c))
        {
            continue;
        }

        let row = rows.len();
        rows.push(ExtractionCandidate {
            kind: CandidateKind::TableRow {
                cells,
                headers: headers.clone(),
            },
            provenance: Provenance {
                strategy,
                page,
                row,
            },
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aan() -> Regex {
        Regex::new(r"^\d{8}\b").unwrap()
    }

    #[test]
    fn splits_on_wide_gaps_only() {
        let cols = split_columns("00254118   Donald John Beaton\t85006500   $2,009.03");
        assert_eq!(
            cols,
            vec!["00254118", "Donald John Beaton", "85006500", "$2,009.03"]
        );
    }

    #[test]
    fn normalizes_non_breaking_spaces() {
        assert_eq!(normalize_whitespace("\u{a0}Lot 5\u{a0}"), "Lot 5");
    }

    #[test]
    fn groups_continuation_lines() {
        let lines = [
            "TAX SALE NOTICE",
            "00254118 Donald John Beaton",
            "  198 Little Narrows Rd - Land/Dwelling",
            "",
            "01234567 Jane Doe - Lot 4",
        ];
        let blocks = group_record_blocks(&lines, &aan());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0, 1);
        assert_eq!(
            blocks[0].1,
            "00254118 Donald John Beaton 198 Little Narrows Rd - Land/Dwelling"
        );
        assert_eq!(blocks[1].1, "01234567 Jane Doe - Lot 4");
    }

    #[test]
    fn table_rows_attach_headers_and_skip_short_lines() {
        let lines = [
            "AAN        Owner               PID        Opening Bid",
            "00254118   Donald John Beaton  85006500   $2,009.03",
            "Page 1 of 3",
            "01234567   Jane Doe",
        ];
        let hints = ExtractionHints::new(aan());
        let rows = table_rows_from_lines(&lines, &hints, "text_table", Some(1));
        assert_eq!(rows.len(), 1);
        let CandidateKind::TableRow { cells, headers } = &rows[0].kind else {
            panic!("expected table row");
        };
        assert_eq!(cells.len(), 4);
        assert_eq!(headers.as_ref().unwrap()[0], "AAN");
        assert_eq!(rows[0].provenance.page, Some(1));
    }

    #[test]
    fn header_detection_rejects_records() {
        let cells = vec!["00254118".to_owned(), "Owner Name".to_owned(), "Address".to_owned()];
        assert!(!looks_like_header(&cells, &aan()));
    }
}
