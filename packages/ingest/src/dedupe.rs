//! Assessment-number deduplication.
//!
//! Overlapping strategies and tables that repeat across pages can emit
//! the same property more than once. The later record wins; each
//! collision is logged with both civic addresses.

use std::collections::BTreeMap;

use tax_sale_property_models::PropertyRecord;

/// A collision that was resolved by keeping the later record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Shared assessment number.
    pub assessment_number: String,
    /// Address of the record that was dropped.
    pub dropped_address: Option<String>,
    /// Address of the record that was kept.
    pub kept_address: Option<String>,
}

/// Collapses records sharing an assessment number.
///
/// Output order is the order in which each assessment number was first
/// seen; the fields are those of its last occurrence.
#[must_use]
pub fn dedupe(records: Vec<PropertyRecord>) -> (Vec<PropertyRecord>, Vec<Collision>) {
    let mut slots: Vec<PropertyRecord> = Vec::with_capacity(records.len());
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut collisions = Vec::new();

    for record in records {
        if let Some(&i) = index.get(&record.assessment_number) {
            log::warn!(
                "Duplicate assessment number {}: replacing '{}' with '{}'",
                record.assessment_number,
                slots[i].civic_address.as_deref().unwrap_or("<no address>"),
                record.civic_address.as_deref().unwrap_or("<no address>"),
            );
            collisions.push(Collision {
                assessment_number: record.assessment_number.clone(),
                dropped_address: slots[i].civic_address.clone(),
                kept_address: record.civic_address.clone(),
            });
            slots[i] = record;
        } else {
            index.insert(record.assessment_number.clone(), slots.len());
            slots.push(record);
        }
    }

    (slots, collisions)
}
