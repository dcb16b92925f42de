//! Text-line candidates: one record printed as a run of text.
//!
//! ```text
//! 00254118 Donald John Beaton 198 Little Narrows Rd - Land/Dwelling - PID 85006500 - $2,009.03
//! ```
//!
//! The line is split at the first assessment number. The remainder is
//! split on the municipality's delimiters: the first segment carries the
//! owner and address, the rest carry the description, PIDs, amounts and
//! flags.

use std::sync::LazyLock;

use regex::Regex;
use tax_sale_property_models::FieldWarning;

use super::boundary::{Confidence, split_owner_address, starts_with_address};
use super::{PartialPropertyFields, embedded_pid, flags, money, property_type};
use crate::municipality::MunicipalityRuleSet;
use crate::pid;

static PID_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pids?|parcel(?:\s+ids?)?)\s*(?:no\.?|#)?\s*[:#]?\s*(\d{8,11}(?:\s*(?:[,;/&]|and)\s*\d{8,11})*)")
        .expect("valid regex")
});

static BARE_PID_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{8,11}(?:\s*[,;/&]\s*\d{8,11})*)\s*$").expect("valid regex")
});

static FLAG_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:non[- ]?|not\s+)?redeemable\b|\b(?:plus|no)?\s*\+?\s*hst\b(?:\s+(?:applicable|exempt|applies))?")
        .expect("valid regex")
});

/// Removes `text` between the first PID label or amount and the end.
fn cut_at_metadata(segment: &str) -> &str {
    let mut end = segment.len();
    if let Some(m) = PID_LIST.find(segment) {
        end = end.min(m.start());
    }
    if let Some(m) = money_start(segment) {
        end = end.min(m);
    }
    &segment[..end]
}

fn money_start(text: &str) -> Option<usize> {
    if !money::has_amount(text) {
        return None;
    }
    let stripped = money::strip_amounts(text);
    text.char_indices()
        .zip(stripped.chars())
        .find(|((_, a), b)| a != b)
        .map(|((i, _), _)| i)
}

fn split_segments<'a>(text: &'a str, delimiters: &[String]) -> Vec<&'a str> {
    let mut segments = vec![text];
    for delimiter in delimiters {
        segments = segments
            .into_iter()
            .flat_map(|s| s.split(delimiter.as_str()))
            .collect();
    }
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses one text-line candidate.
#[must_use]
pub fn parse_text_line(text: &str, rules: &MunicipalityRuleSet) -> PartialPropertyFields {
    let mut fields = PartialPropertyFields::default();

    let Some(aan) = rules.assessment_pattern.find(text) else {
        return fields;
    };
    fields.assessment_number = Some(aan.as_str().to_owned());

    let rest = text[aan.end()..].trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'));
    let segments = split_segments(rest, &rules.delimiters);
    let Some((first, metadata)) = segments.split_first() else {
        fields.warnings.push(FieldWarning::MissingOwner);
        return fields;
    };

    // ── Owner / address ──────────────────────────────────────────────
    let address_segment = cut_at_metadata(first).trim();
    let split = split_owner_address(address_segment);
    fields.owner_name = split.owner;
    fields.civic_address = split.address;
    let mut ambiguous = split.confidence == Confidence::Low;
    let mut tails = vec![&first[address_segment.len().min(first.len())..]];
    let mut metadata = metadata;

    // Owner and address in separate segments: "Name - 198 Some Rd - ...".
    if fields.civic_address.is_none()
        && let Some((next, rest)) = metadata.split_first()
        && starts_with_address(next)
    {
        let address = cut_at_metadata(next).trim_end();
        fields.civic_address = Some(address.to_owned());
        tails.push(&next[address.len()..]);
        metadata = rest;
        ambiguous = false;
    }

    if ambiguous && !address_segment.is_empty() {
        fields.warnings.push(FieldWarning::AmbiguousBoundary {
            matcher: split.matcher.to_owned(),
            segment: address_segment.to_owned(),
        });
    }

    // ── Metadata ─────────────────────────────────────────────────────
    let mut pid_raw: Vec<String> = Vec::new();
    let mut description: Vec<String> = Vec::new();

    for segment in tails.into_iter().chain(metadata.iter().copied()) {
        let mut remainder = segment.to_owned();

        if let Some(caps) = PID_LIST.captures(segment) {
            pid_raw.push(caps[1].to_owned());
            remainder = PID_LIST.replace_all(&remainder, " ").into_owned();
        } else if let Some(caps) = BARE_PID_LIST.captures(segment) {
            pid_raw.push(caps[1].to_owned());
            remainder.clear();
        }

        remainder = money::strip_amounts(&remainder);
        remainder = FLAG_PHRASES.replace_all(&remainder, " ").into_owned();
        let remainder = embedded_pid::normalize_address(&remainder);
        if remainder.chars().any(char::is_alphabetic) {
            description.push(remainder);
        }
    }

    if !description.is_empty() {
        fields.parcel_description = Some(description.join(", "));
    }

    let mut ids = pid::resolve(&pid_raw.join(","));
    if ids.is_empty()
        && let Some(address) = fields.civic_address.take()
    {
        match embedded_pid::extract(&address) {
            Some((found, residual)) => {
                ids = pid::resolve(&found);
                fields.civic_address = (!residual.is_empty()).then_some(residual);
            }
            None => fields.civic_address = Some(address),
        }
    }
    fields.parcel_ids = ids;

    // ── Amount and flags ─────────────────────────────────────────────
    let (bid, warning) = money::opening_bid(rest, rules);
    fields.opening_bid = bid;
    fields.warnings.extend(warning);
    fields.hst_applicable = flags::hst(rest);
    fields.redeemable = flags::redeemable(rest);

    fields.property_type = property_type::classify(
        fields.parcel_description.as_deref(),
        fields.civic_address.as_deref(),
        rules,
    );

    fields.finish_warnings();
    fields
}
