//! Sampled verification of a finished migration.
//!
//! Repeatedly draws one random destination row, fetches the source rows it
//! was built from (joined through the mapping's `check` columns), re-runs
//! the conversion on them and counts the sample as matched when any
//! recomputed record agrees with the stored row.
//!
//! Agreement only looks at fields of the recomputed record; extra columns in
//! the stored row are ignored.

pub mod query;
pub mod types;

pub use types::VerifyReport;

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MappingSpec;
use crate::convert::Convertor;
use crate::core::identifier::qualify_mysql;
use crate::core::{Record, TargetSession};
use crate::error::{MigrateError, Result};
use crate::progress::{Phase, ProgressUpdate};

/// Predicate used when the source side is unrestricted.
const NO_RESTRICTION: &str = "1";

/// One verification, with identifiers already qualified.
#[derive(Debug, Clone)]
pub struct VerifyJob {
    /// `` `db`.`table` `` of the source.
    pub source_table: String,
    /// `` `db`.`table` `` of the destination.
    pub target_table: String,
    /// Destination column -> source column it must equal.
    pub check: IndexMap<String, String>,
    /// Predicate on sampled destination rows.
    pub check_where: String,
    /// Predicate on matched source rows.
    pub source_where: String,
}

impl VerifyJob {
    /// Build a job from a mapping and the two database names.
    ///
    /// # Errors
    ///
    /// Returns `MigrateError::Config` when the mapping has no `check`.
    pub fn new(mapping: &MappingSpec, source_db: &str, target_db: &str) -> Result<Self> {
        let check = mapping.check.clone().ok_or_else(|| {
            MigrateError::Config(
                "cannot verify without a `check` section (destination column: source column)"
                    .into(),
            )
        })?;

        let source_where = if mapping.check_src_use_where {
            mapping.where_clause.clone()
        } else {
            NO_RESTRICTION.to_string()
        };

        Ok(Self {
            source_table: qualify_mysql(source_db, &mapping.from)?,
            target_table: qualify_mysql(target_db, &mapping.to)?,
            check,
            check_where: mapping.check_where.clone(),
            source_where,
        })
    }
}

/// Whether a recomputed record agrees with a stored row.
///
/// Every field of `recomputed` must be present in `stored` with the same
/// canonical text; fields only present in `stored` are not checked.
pub fn compare(recomputed: &Record, stored: &Record) -> bool {
    recomputed.iter().all(|(key, value)| {
        stored
            .get(key)
            .is_some_and(|stored_value| stored_value.as_text() == value.as_text())
    })
}

/// Engine for sampled verification.
#[derive(Default)]
pub struct VerifyEngine {
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl VerifyEngine {
    /// Create a new verification engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set progress channel for updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    async fn send_progress(&self, processed: u64, total: u64) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx
                .send(ProgressUpdate {
                    phase: Phase::Verify,
                    processed,
                    total,
                })
                .await;
        }
    }

    /// Draw `samples` random rows and compare each against its source.
    ///
    /// All queries run on `target`, which must be able to read both
    /// databases. Running out of destination rows stops the loop early and
    /// is reported, not an error.
    pub async fn execute<T>(
        &self,
        job: &VerifyJob,
        convertor: &Convertor,
        samples: u64,
        target: &mut T,
    ) -> Result<VerifyReport>
    where
        T: TargetSession + ?Sized,
    {
        info!(
            "Verifying {} against {} with {} samples",
            job.target_table, job.source_table, samples
        );

        let sample_sql = query::sample_query(&job.target_table, &job.check_where);
        let keys = convertor.keys();
        let mut sampled = 0u64;
        let mut matched = 0u64;
        let mut exhausted = false;

        while sampled < samples {
            let Some(stored) = target.query_first(&sample_sql).await? else {
                warn!(
                    "Not enough data in {} to verify: stopped after {} of {} samples",
                    job.target_table, sampled, samples
                );
                exhausted = true;
                break;
            };

            let source_sql = query::source_query(
                &keys,
                &job.source_table,
                &job.source_where,
                &job.check,
                &stored,
            )?;
            let candidates = target.query(&source_sql).await?;

            let mut is_match = false;
            for candidate in &candidates {
                let recomputed = convertor.process(candidate, &mut *target).await?;
                if compare(&recomputed, &stored) {
                    is_match = true;
                    break;
                }
            }

            sampled += 1;
            if is_match {
                matched += 1;
            } else {
                debug!(
                    "Sample {}: no match among {} source rows",
                    sampled,
                    candidates.len()
                );
            }
            self.send_progress(sampled, samples).await;
        }

        let report = VerifyReport::new(samples, sampled, matched, exhausted);
        info!(
            "Verification complete: {}/{} matched ({:.2}%)",
            report.matched, report.requested, report.match_rate
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::FunctionRegistry;
    use crate::core::Value;
    use crate::testing::{record, MemorySession};

    const MAPPING: &str = r#"
from: users
to: accounts
where: "deleted = 0"
map:
  "id+int": uid
  name: fullname
const:
  active: 1
check:
  uid: id
"#;

    fn setup(yaml: &str) -> (VerifyJob, Convertor) {
        let config = Config::from_yaml(yaml).unwrap();
        let job = VerifyJob::new(&config.mapping, "legacy", "app").unwrap();
        let convertor = Convertor::from_spec(&config.mapping, &FunctionRegistry::new()).unwrap();
        (job, convertor)
    }

    fn stored(uid: i64, name: &str) -> Record {
        record([
            ("id", Value::Int(100 + uid)),
            ("uid", Value::Int(uid)),
            ("fullname", Value::from(name)),
            ("active", Value::Int(1)),
        ])
    }

    fn source(id: &str, name: &str) -> Record {
        record([("id", Value::from(id)), ("name", Value::from(name))])
    }

    #[test]
    fn test_compare_ignores_extra_stored_fields() {
        let recomputed = record([("uid", Value::Int(1)), ("active", Value::Int(1))]);
        assert!(compare(&recomputed, &stored(1, "bob")));
    }

    #[test]
    fn test_compare_requires_every_recomputed_field() {
        let recomputed = record([("uid", Value::Int(1)), ("extra", Value::Int(1))]);
        assert!(!compare(&recomputed, &stored(1, "bob")));

        let recomputed = record([("uid", Value::Int(2))]);
        assert!(!compare(&recomputed, &stored(1, "bob")));
    }

    #[test]
    fn test_compare_uses_canonical_text() {
        let recomputed = record([("uid", Value::from("1")), ("n", Value::Null)]);
        let stored = record([("uid", Value::Int(1)), ("n", Value::Null)]);
        assert!(compare(&recomputed, &stored));
    }

    #[test]
    fn test_missing_check_is_config_error() {
        let config = Config::from_yaml("from: a\nto: b\nmap:\n  x: y\n").unwrap();
        let err = VerifyJob::new(&config.mapping, "s", "d").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_source_where_only_when_requested() {
        let (job, _) = setup(MAPPING);
        assert_eq!(job.source_where, "1");

        let (job, _) = setup(&format!("{}check_src_use_where: true\n", MAPPING));
        assert_eq!(job.source_where, "deleted = 0");
    }

    #[tokio::test]
    async fn test_match_and_mismatch() {
        let (job, convertor) = setup(MAPPING);
        let mut session = MemorySession::new();
        // Sample 1 matches on the second candidate.
        session.push_query_result(vec![stored(1, "bob")]);
        session.push_query_result(vec![source("1", "robert"), source("1", "bob")]);
        // Sample 2 differs.
        session.push_query_result(vec![stored(2, "ann")]);
        session.push_query_result(vec![source("2", "anne")]);
        // Sample 3 has no source row at all.
        session.push_query_result(vec![stored(3, "cy")]);
        session.push_query_result(vec![]);

        let (tx, mut rx) = mpsc::channel(8);
        let report = VerifyEngine::new()
            .with_progress(tx)
            .execute(&job, &convertor, 3, &mut session)
            .await
            .unwrap();

        assert_eq!(report, VerifyReport::new(3, 3, 1, false));
        assert_eq!(
            session.queries[1],
            "SELECT `id`,`name` FROM `legacy`.`users` WHERE `id` = '1' AND (1)"
        );
        assert!(session.queries[0].starts_with("SELECT t1.* FROM `app`.`accounts`"));

        let mut processed = Vec::new();
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.phase, Phase::Verify);
            processed.push(update.processed);
        }
        assert_eq!(processed, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exhaustion_stops_early() {
        let (job, convertor) = setup(MAPPING);
        let mut session = MemorySession::new();
        session.push_query_result(vec![stored(1, "bob")]);
        session.push_query_result(vec![source("1", "bob")]);
        // No more rows: the next sample query returns nothing.

        let report = VerifyEngine::new()
            .execute(&job, &convertor, 5, &mut session)
            .await
            .unwrap();

        assert!(report.exhausted);
        assert_eq!(report.sampled, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.mismatched, 4);
        assert_eq!(report.match_rate, 20.0);
    }

    #[tokio::test]
    async fn test_zero_samples() {
        let (job, convertor) = setup(MAPPING);
        let mut session = MemorySession::new();

        let report = VerifyEngine::new()
            .execute(&job, &convertor, 0, &mut session)
            .await
            .unwrap();

        assert_eq!(report, VerifyReport::new(0, 0, 0, false));
        assert!(session.queries.is_empty());
    }
}
