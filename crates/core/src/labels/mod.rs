//! Label resolution.
//!
//! Every classified measurement points at two label rows: a [`SeverityLabel`] and a
//! [`Recommendation`]. Both are resolved the same way, by [`create_or_fetch`]:
//!
//! 1. look up active rows by severity code and pick one;
//! 2. if none fits, build a row from the fixed templates in [`templates`] and create it;
//! 3. if the store rejects the create because another caller just created the same row,
//!    look up once more and return the winner's row.
//!
//! Stores guarantee at most one active row per [`Label::unique_key`], so concurrent callers
//! converge on exactly one row per code without application-level locking. A lost race costs
//! the loser exactly one extra read.
//!
//! Rows written before the severity code column existed are matched by name once, by the
//! migration in [`migration`], and never on the request path.

pub mod migration;
pub mod templates;

use crate::config::Thresholds;
use crate::error::{CoreError, CoreResult};
use crate::id::RecordId;
use crate::models::{Recommendation, SeverityLabel};
use crate::store::LabelStore;
use muac_types::SeverityCode;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// The two label kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelKind {
    Severity,
    Recommendation,
}

impl LabelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelKind::Severity => "severity label",
            LabelKind::Recommendation => "recommendation",
        }
    }

    /// Directory name used by the file store.
    pub fn dir_name(&self) -> &'static str {
        match self {
            LabelKind::Severity => "severity",
            LabelKind::Recommendation => "recommendations",
        }
    }
}

/// Behaviour shared by both label kinds.
pub trait Label: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: LabelKind;

    fn id(&self) -> RecordId;
    fn name(&self) -> &str;
    fn severity_code(&self) -> Option<SeverityCode>;
    fn set_severity_code(&mut self, code: SeverityCode);
    fn is_active(&self) -> bool;

    /// Two active rows may not share a key. Legacy rows without a code have no key.
    fn unique_key(&self) -> Option<String>;
}

impl Label for SeverityLabel {
    const KIND: LabelKind = LabelKind::Severity;

    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn severity_code(&self) -> Option<SeverityCode> {
        self.severity_code
    }

    fn set_severity_code(&mut self, code: SeverityCode) {
        self.severity_code = Some(code);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn unique_key(&self) -> Option<String> {
        self.severity_code.map(|code| code.as_str().to_string())
    }
}

impl Label for Recommendation {
    const KIND: LabelKind = LabelKind::Recommendation;

    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn severity_code(&self) -> Option<SeverityCode> {
        self.severity_code
    }

    fn set_severity_code(&mut self, code: SeverityCode) {
        self.severity_code = Some(code);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    // Several recommendations may share a code as long as their ranges differ.
    fn unique_key(&self) -> Option<String> {
        fn bound(value: Option<f64>) -> String {
            value.map_or_else(|| "open".to_string(), |v| v.to_string())
        }
        self.severity_code.map(|code| {
            format!(
                "{}_{}_{}",
                code.as_str(),
                bound(self.min_value),
                bound(self.max_value)
            )
        })
    }
}

/// A label returned by the resolver, and whether this call created it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved<L> {
    pub label: L,
    pub created: bool,
}

/// Returns an active row for `code`, creating one from `build` if `select` finds none.
///
/// `select` receives the active rows carrying `code` and picks the one to use.
///
/// # Errors
///
/// - Store errors from the lookup or create are returned unchanged.
/// - If the create conflicts and the follow-up lookup still finds no row, the race is
///   unrecoverable and [`CoreError::Storage`] is returned.
pub fn create_or_fetch<L, S, F, B>(
    store: &S,
    code: SeverityCode,
    select: F,
    build: B,
) -> CoreResult<Resolved<L>>
where
    L: Label,
    S: LabelStore<L> + ?Sized,
    F: Fn(&[L]) -> Option<L>,
    B: FnOnce() -> CoreResult<L>,
{
    if let Some(label) = select(store.find_by_code(code)?.as_slice()) {
        return Ok(Resolved {
            label,
            created: false,
        });
    }

    match store.create(build()?) {
        Ok(label) => {
            tracing::info!(
                kind = L::KIND.as_str(),
                code = %code,
                id = %label.id(),
                "created label"
            );
            Ok(Resolved {
                label,
                created: true,
            })
        }
        Err(CoreError::Conflict(reason)) => {
            tracing::warn!(
                kind = L::KIND.as_str(),
                code = %code,
                %reason,
                "label creation lost a race, reading the winner"
            );
            match select(store.find_by_code(code)?.as_slice()) {
                Some(label) => Ok(Resolved {
                    label,
                    created: false,
                }),
                None => {
                    tracing::error!(
                        kind = L::KIND.as_str(),
                        code = %code,
                        "label conflict reported but no active row found"
                    );
                    Err(CoreError::Storage(format!(
                        "{} for code {} conflicted on create but could not be read back",
                        L::KIND.as_str(),
                        code
                    )))
                }
            }
        }
        Err(e) => Err(e),
    }
}

/// Resolves both label kinds against their stores.
#[derive(Clone)]
pub struct LabelResolver {
    thresholds: Thresholds,
    severity_labels: Arc<dyn LabelStore<SeverityLabel>>,
    recommendations: Arc<dyn LabelStore<Recommendation>>,
}

impl LabelResolver {
    pub fn new(
        thresholds: Thresholds,
        severity_labels: Arc<dyn LabelStore<SeverityLabel>>,
        recommendations: Arc<dyn LabelStore<Recommendation>>,
    ) -> Self {
        Self {
            thresholds,
            severity_labels,
            recommendations,
        }
    }

    /// Returns the active severity label for `code`, creating it on first use.
    pub fn resolve_severity_label(&self, code: SeverityCode) -> CoreResult<Resolved<SeverityLabel>> {
        create_or_fetch(
            self.severity_labels.as_ref(),
            code,
            |rows| rows.first().cloned(),
            || templates::severity_label(code),
        )
    }

    /// Returns the active recommendation for `code` that best fits `value`.
    ///
    /// Among rows carrying `code`, the first whose range covers `value` wins; otherwise any
    /// row with the code is used. A template row is created only when no row carries the code.
    pub fn resolve_recommendation(
        &self,
        code: SeverityCode,
        value: f64,
    ) -> CoreResult<Resolved<Recommendation>> {
        create_or_fetch(
            self.recommendations.as_ref(),
            code,
            |rows| {
                rows.iter()
                    .find(|rec| rec.is_applicable(value))
                    .or_else(|| rows.first())
                    .cloned()
            },
            || templates::recommendation(code, &self.thresholds),
        )
    }
}
