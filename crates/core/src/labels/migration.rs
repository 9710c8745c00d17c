//! One-time backfill of severity codes on legacy label rows.
//!
//! Label rows created before the severity code column existed can only be recognised by their
//! name, which was often decorated with emoji or markup. This migration matches such rows to a
//! template by normalized name and writes the code onto them, after which the resolver only
//! ever matches by code.
//!
//! Backfill is best-effort: a row that cannot be updated is logged and skipped, and the
//! migration carries on with the next one.

use crate::error::{CoreError, CoreResult};
use crate::labels::templates::{normalize_name, recommendation_name, severity_label_name};
use crate::labels::{Label, LabelKind};
use crate::store::{LabelStore, Stores};
use muac_types::SeverityCode;
use serde::Serialize;

/// Outcome of backfilling one label kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Rows that received a code.
    pub updated: usize,
    /// Legacy rows whose name matched no template.
    pub unmatched: usize,
    /// Rows that matched a code already held by another active row.
    pub duplicates: usize,
    /// Rows whose update failed.
    pub failed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub severity_labels: BackfillReport,
    pub recommendations: BackfillReport,
}

/// Backfills both label stores.
///
/// # Errors
///
/// Only a failure to list a store's rows is fatal.
pub fn run_label_migration(stores: &Stores) -> CoreResult<MigrationReport> {
    let report = MigrationReport {
        severity_labels: backfill_severity_codes(stores.severity_labels.as_ref())?,
        recommendations: backfill_severity_codes(stores.recommendations.as_ref())?,
    };
    tracing::info!(?report, "label migration finished");
    Ok(report)
}

/// Writes a severity code onto every legacy row of `store` whose name matches a template.
pub fn backfill_severity_codes<L, S>(store: &S) -> CoreResult<BackfillReport>
where
    L: Label,
    S: LabelStore<L> + ?Sized,
{
    let mut report = BackfillReport::default();
    let rows = store.list()?;
    let mut taken: Vec<String> = rows
        .iter()
        .filter(|row| row.is_active())
        .filter_map(|row| row.unique_key())
        .collect();

    for mut row in rows.into_iter().filter(|row| row.severity_code().is_none()) {
        let Some(code) = code_for_name::<L>(row.name()) else {
            tracing::debug!(kind = L::KIND.as_str(), id = %row.id(), name = row.name(), "no template matches legacy label");
            report.unmatched += 1;
            continue;
        };

        row.set_severity_code(code);
        let key = row.unique_key();
        if row.is_active() && key.as_ref().is_some_and(|k| taken.contains(k)) {
            tracing::warn!(
                kind = L::KIND.as_str(),
                id = %row.id(),
                code = %code,
                "legacy label duplicates an existing active label, leaving it unchanged"
            );
            report.duplicates += 1;
            continue;
        }

        match store.update(&row) {
            Ok(()) => {
                tracing::info!(kind = L::KIND.as_str(), id = %row.id(), code = %code, "backfilled severity code");
                if row.is_active() {
                    taken.extend(key);
                }
                report.updated += 1;
            }
            Err(CoreError::Conflict(reason)) => {
                tracing::warn!(kind = L::KIND.as_str(), id = %row.id(), %reason, "backfill conflicted");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(kind = L::KIND.as_str(), id = %row.id(), error = %e, "backfill failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn code_for_name<L: Label>(name: &str) -> Option<SeverityCode> {
    let normalized = normalize_name(name);
    SeverityCode::ALL.into_iter().find(|code| {
        let canonical = match L::KIND {
            LabelKind::Severity => severity_label_name(*code),
            LabelKind::Recommendation => recommendation_name(*code),
        };
        normalize_name(canonical) == normalized
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::id::RecordId;
    use crate::labels::templates;
    use crate::models::{Recommendation, SeverityLabel};
    use crate::store::MemoryLabelStore;
    use muac_types::NonEmptyText;

    fn legacy_label(name: &str) -> SeverityLabel {
        let mut label = templates::severity_label(SeverityCode::Red).unwrap();
        label.id = RecordId::new();
        label.name = NonEmptyText::new(name).unwrap();
        label.severity_code = None;
        label
    }

    #[test]
    fn test_backfill_matches_decorated_legacy_names() {
        let store = MemoryLabelStore::<SeverityLabel>::new();
        let legacy = store.create(legacy_label("🔴 <b>Severe acute malnutrition</b>")).unwrap();
        store.create(legacy_label("Something else")).unwrap();

        let report = backfill_severity_codes(&store).expect("backfill should succeed");

        assert_eq!(report.updated, 1);
        assert_eq!(report.unmatched, 1);
        let found = store.find_by_code(SeverityCode::Red).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, legacy.id);
    }

    #[test]
    fn test_backfill_skips_rows_duplicating_an_active_code() {
        let store = MemoryLabelStore::<SeverityLabel>::new();
        store.create(templates::severity_label(SeverityCode::Red).unwrap()).unwrap();
        store.create(legacy_label("Severe acute malnutrition")).unwrap();

        let report = backfill_severity_codes(&store).expect("backfill should succeed");

        assert_eq!(report.updated, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.find_by_code(SeverityCode::Red).unwrap().len(), 1);
    }

    #[test]
    fn test_backfill_is_idempotent() {
        let store = MemoryLabelStore::<Recommendation>::new();
        let mut legacy = templates::recommendation(SeverityCode::Green, &Thresholds::OFFICIAL).unwrap();
        legacy.severity_code = None;
        legacy.name = NonEmptyText::new("✅ Continue routine monitoring").unwrap();
        store.create(legacy).unwrap();

        let first = backfill_severity_codes(&store).unwrap();
        let second = backfill_severity_codes(&store).unwrap();

        assert_eq!(first.updated, 1);
        assert_eq!(second, BackfillReport::default());
        assert_eq!(store.find_by_code(SeverityCode::Green).unwrap().len(), 1);
    }
}
