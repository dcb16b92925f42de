//! Status reconciliation.
//!
//! Two rules, both applied only to records that are still active, so a
//! second pass with the same input changes nothing:
//!
//! 1. An active record whose assessment number is not in the fresh set
//!    becomes inactive. The fresh set must be complete before this rule
//!    runs; an empty or incomplete set skips the rule entirely.
//! 2. An active record whose sale date is strictly before today becomes
//!    inactive, whatever the fresh set says.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use tax_sale_property_models::{PropertyRecord, RecordStatus};

use crate::adapters::{PersistenceAdapter, PersistenceError};

/// Why a record was deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// Not listed in the latest extraction.
    Absent,
    /// The sale date has passed.
    SaleDatePassed,
}

/// One planned status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Record to deactivate.
    pub assessment_number: String,
    /// Which rule fired.
    pub reason: TransitionReason,
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records deactivated because they were absent.
    pub deactivated: Vec<String>,
    /// Records deactivated because their sale date passed.
    pub expired: Vec<String>,
    /// `true` if rule 1 was skipped for an empty or incomplete fresh set.
    pub absent_rule_skipped: bool,
}

/// Decides which active records to deactivate.
///
/// With `fresh` set to `None` only the sale-date rule applies.
#[must_use]
pub fn plan(
    active: &[PropertyRecord],
    fresh: Option<&BTreeSet<String>>,
    today: NaiveDate,
) -> Vec<Transition> {
    active
        .iter()
        .filter(|r| r.is_active())
        .filter_map(|r| {
            let absent = fresh.is_some_and(|f| !f.contains(&r.assessment_number));
            let reason = if absent {
                TransitionReason::Absent
            } else if r.sale_date.is_some_and(|d| d < today) {
                TransitionReason::SaleDatePassed
            } else {
                return None;
            };
            Some(Transition {
                assessment_number: r.assessment_number.clone(),
                reason,
            })
        })
        .collect()
}

/// Reconciles the stored records of `municipality` against `fresh`.
///
/// `complete` must be `false` when any document of the run failed to
/// extract; the absence rule is then skipped.
///
/// # Errors
///
/// Returns [`PersistenceError`] if reading or updating the store fails.
pub async fn reconcile(
    store: &dyn PersistenceAdapter,
    municipality: &str,
    fresh: &BTreeSet<String>,
    complete: bool,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, PersistenceError> {
    let active = store.list_active(municipality).await?;
    let mut report = ReconcileReport {
        absent_rule_skipped: fresh.is_empty() || !complete,
        ..ReconcileReport::default()
    };
    if fresh.is_empty() {
        log::warn!("{municipality}: empty fresh set, not deactivating absent records");
    } else if !complete {
        log::warn!("{municipality}: incomplete fresh set, not deactivating absent records");
    }

    let fresh = (!report.absent_rule_skipped).then_some(fresh);
    for transition in plan(&active, fresh, now.date_naive()) {
        let changed = store
            .set_status(
                municipality,
                &transition.assessment_number,
                RecordStatus::Inactive,
                now,
            )
            .await?;
        if !changed {
            continue;
        }
        log::info!(
            "{municipality}: {} -> inactive ({:?})",
            transition.assessment_number,
            transition.reason
        );
        match transition.reason {
            TransitionReason::Absent => report.deactivated.push(transition.assessment_number),
            TransitionReason::SaleDatePassed => report.expired.push(transition.assessment_number),
        }
    }

    Ok(report)
}

/// Applies rule 2 to a fresh batch before it is persisted. Returns how
/// many records were deactivated.
pub fn expire_batch(records: &mut [PropertyRecord], now: DateTime<Utc>) -> usize {
    let today = now.date_naive();
    let mut expired = 0;
    for record in records.iter_mut() {
        if record.is_active()
            && record.sale_date.is_some_and(|d| d < today)
            && record.set_status(RecordStatus::Inactive, now)
        {
            log::info!(
                "{}: {} sale date {:?} has passed",
                record.municipality,
                record.assessment_number,
                record.sale_date
            );
            expired += 1;
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::InMemoryStore;

    const MUNI: &str = "victoria_county";

    fn record(aan: &str, sale_date: Option<NaiveDate>) -> PropertyRecord {
        let mut r = PropertyRecord::new(MUNI, aan, Utc::now());
        r.sale_date = sale_date;
        r
    }

    fn fresh(aans: &[&str]) -> BTreeSet<String> {
        aans.iter().map(|s| (*s).to_owned()).collect()
    }

    async fn seeded(records: Vec<PropertyRecord>) -> InMemoryStore {
        let store = InMemoryStore::new();
        for r in records {
            store.upsert(r).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn absent_records_become_inactive() {
        let store = seeded(vec![record("00000001", None), record("00000002", None)]).await;
        let report = reconcile(&store, MUNI, &fresh(&["00000001"]), true, Utc::now())
            .await
            .unwrap();
        assert_eq!(report.deactivated, vec!["00000002".to_owned()]);
        let active = store.list_active_assessment_numbers(MUNI).await.unwrap();
        assert_eq!(active, fresh(&["00000001"]));
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let store = seeded(vec![
            record("00000001", None),
            record("00000002", None),
            record("00000003", None),
        ])
        .await;
        let set = fresh(&["00000001"]);
        let now = Utc::now();

        let first = reconcile(&store, MUNI, &set, true, now).await.unwrap();
        let after_first = store.records(MUNI).await;
        let second = reconcile(&store, MUNI, &set, true, now + Duration::minutes(1))
            .await
            .unwrap();
        let after_second = store.records(MUNI).await;

        assert_eq!(first.deactivated.len(), 2);
        assert!(second.deactivated.is_empty());
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn sale_date_boundary() {
        let now = Utc::now();
        let today = now.date_naive();
        let store = seeded(vec![
            record("00000001", today.pred_opt()),
            record("00000002", today.succ_opt()),
            record("00000003", Some(today)),
        ])
        .await;

        let report = reconcile(
            &store,
            MUNI,
            &fresh(&["00000001", "00000002", "00000003"]),
            true,
            now,
        )
        .await
        .unwrap();

        assert_eq!(report.expired, vec!["00000001".to_owned()]);
        assert_eq!(
            store.list_active_assessment_numbers(MUNI).await.unwrap(),
            fresh(&["00000002", "00000003"])
        );
    }

    #[tokio::test]
    async fn empty_fresh_set_skips_absence_rule() {
        let yesterday = Utc::now().date_naive().pred_opt();
        let store = seeded(vec![record("00000001", None), record("00000002", yesterday)]).await;
        let report = reconcile(&store, MUNI, &BTreeSet::new(), true, Utc::now())
            .await
            .unwrap();
        assert!(report.absent_rule_skipped);
        assert!(report.deactivated.is_empty());
        assert_eq!(report.expired, vec!["00000002".to_owned()]);
    }

    #[tokio::test]
    async fn incomplete_fresh_set_only_expires() {
        let yesterday = Utc::now().date_naive().pred_opt();
        let store = seeded(vec![
            record("00000001", None),
            record("00000002", None),
            record("00000003", yesterday),
        ])
        .await;
        let report = reconcile(&store, MUNI, &fresh(&["00000001"]), false, Utc::now())
            .await
            .unwrap();
        assert!(report.absent_rule_skipped);
        assert!(report.deactivated.is_empty());
        assert_eq!(report.expired, vec!["00000003".to_owned()]);
        assert_eq!(
            store.list_active_assessment_numbers(MUNI).await.unwrap(),
            fresh(&["00000001", "00000002"])
        );
    }

    #[test]
    fn expire_batch_marks_past_sales() {
        let now = Utc::now();
        let mut batch = vec![
            record("00000001", now.date_naive().pred_opt()),
            record("00000002", now.date_naive().succ_opt()),
        ];
        assert_eq!(expire_batch(&mut batch, now), 1);
        assert_eq!(expire_batch(&mut batch, now), 0);
        assert_eq!(batch[0].status, RecordStatus::Inactive);
        assert!(batch[1].is_active());
    }
}
