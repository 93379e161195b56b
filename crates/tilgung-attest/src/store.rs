// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate index and erasure history backed by SQLite.
//
// The index is a convenience for listing and filtering.  The artifact triad
// on disk remains the source of truth for verification.  Every erasure
// receipt, certified or not, lands in the `operations` table.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tilgung_core::error::{Result, TilgungError};
use tilgung_core::types::{
    ArtifactPaths, Certificate, EraseMethod, ErasureSummary, OperationId, OperationReceipt,
    ReceiptError, Subject, Target,
};
use tracing::{debug, info, instrument};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS certificates (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        organization TEXT NOT NULL,
        device_serial TEXT NOT NULL,
        method TEXT NOT NULL,
        subject TEXT NOT NULL,
        erasure TEXT NOT NULL,
        artifacts TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        is_valid INTEGER NOT NULL DEFAULT 1,
        is_verified INTEGER NOT NULL DEFAULT 0,
        verified_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_certificates_user ON certificates(user_id);
    CREATE INDEX IF NOT EXISTS idx_certificates_device ON certificates(device_serial);
    CREATE TABLE IF NOT EXISTS operations (
        id TEXT PRIMARY KEY,
        target TEXT NOT NULL,
        method TEXT NOT NULL,
        success INTEGER NOT NULL,
        simulated INTEGER NOT NULL,
        passes_completed INTEGER NOT NULL,
        total_passes INTEGER NOT NULL,
        size_bytes INTEGER NOT NULL,
        bytes_overwritten INTEGER NOT NULL,
        error TEXT,
        started_at TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        certificate_id TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_operations_started ON operations(started_at);
"#;

const SELECT_COLUMNS: &str = "SELECT id, subject, erasure, artifacts, created_at, expires_at,
    is_valid, is_verified, verified_at FROM certificates";

const SELECT_OPERATIONS: &str = "SELECT id, target, method, success, simulated,
    passes_completed, total_passes, size_bytes, bytes_overwritten, error, started_at,
    duration_ms, certificate_id FROM operations";

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> TilgungError + '_ {
    move |e| TilgungError::Database(format!("{context}: {e}"))
}

fn parse_time(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_json<T: serde::de::DeserializeOwned>(column: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_str<T>(column: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// An indexed certificate plus its lifecycle flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCertificate {
    pub certificate: Certificate,
    /// Cleared by [`CertificateStore::invalidate`].  Artifacts are untouched.
    pub is_valid: bool,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

impl StoredCertificate {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let subject: Subject = parse_json(1, &row.get::<_, String>(1)?)?;
        let erasure: ErasureSummary = parse_json(2, &row.get::<_, String>(2)?)?;
        let artifacts: ArtifactPaths = parse_json(3, &row.get::<_, String>(3)?)?;
        let created_at = parse_time(4, &row.get::<_, String>(4)?)?;
        let expires_at = parse_time(5, &row.get::<_, String>(5)?)?;
        let verified_at = row
            .get::<_, Option<String>>(8)?
            .map(|raw| parse_time(8, &raw))
            .transpose()?;

        Ok(Self {
            certificate: Certificate {
                id,
                subject,
                erasure,
                created_at,
                expires_at,
                artifacts,
            },
            is_valid: row.get::<_, i32>(6)? != 0,
            is_verified: row.get::<_, i32>(7)? != 0,
            verified_at,
        })
    }
}

/// Criteria for [`CertificateStore::list`].  Empty fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFilter {
    pub user_id: Option<String>,
    pub device_serial: Option<String>,
    pub organization: Option<String>,
    pub method: Option<String>,
    pub valid_only: bool,
    pub limit: u32,
}

impl Default for CertificateFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            device_serial: None,
            organization: None,
            method: None,
            valid_only: false,
            limit: 100,
        }
    }
}

/// Aggregate counts over the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStats {
    pub total: u64,
    pub valid: u64,
    pub verified: u64,
    pub expired: u64,
}

/// One row of erasure history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub operation_id: OperationId,
    pub target: Target,
    pub method: EraseMethod,
    pub success: bool,
    pub simulated: bool,
    pub passes_completed: usize,
    pub total_passes: usize,
    pub size_bytes: u64,
    pub bytes_overwritten: u64,
    pub error: Option<ReceiptError>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Set once a certificate has been issued for the operation.
    pub certificate_id: Option<String>,
}

impl OperationSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let error = row
            .get::<_, Option<String>>(9)?
            .map(|raw| parse_json(9, &raw))
            .transpose()?;
        Ok(Self {
            operation_id: parse_str(0, &row.get::<_, String>(0)?)?,
            target: parse_json(1, &row.get::<_, String>(1)?)?,
            method: parse_str(2, &row.get::<_, String>(2)?)?,
            success: row.get::<_, i32>(3)? != 0,
            simulated: row.get::<_, i32>(4)? != 0,
            passes_completed: row.get(5)?,
            total_passes: row.get(6)?,
            size_bytes: row.get(7)?,
            bytes_overwritten: row.get(8)?,
            error,
            started_at: parse_time(10, &row.get::<_, String>(10)?)?,
            duration_ms: row.get(11)?,
            certificate_id: row.get(12)?,
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Persistent certificate index.
///
/// Synchronous like every `rusqlite` user here; wrap in
/// `tokio::task::spawn_blocking` from async code.
pub struct CertificateStore {
    conn: Connection,
}

impl CertificateStore {
    /// Open (or create) the index in the database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create table"))?;
        info!("certificate index opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create table"))?;
        Ok(Self { conn })
    }

    #[instrument(skip_all, fields(certificate_id = %cert.id))]
    pub fn insert(&self, cert: &Certificate) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO certificates (id, user_id, organization, device_serial, method,
                 subject, erasure, artifacts, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    cert.id,
                    cert.subject.user_id,
                    cert.subject.organization,
                    cert.subject.device_serial,
                    cert.erasure.method.as_str(),
                    serde_json::to_string(&cert.subject)?,
                    serde_json::to_string(&cert.erasure)?,
                    serde_json::to_string(&cert.artifacts)?,
                    cert.created_at.to_rfc3339(),
                    cert.expires_at.to_rfc3339(),
                ],
            )
            .map_err(db_err("insert certificate"))?;
        debug!("certificate indexed");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredCertificate>> {
        self.conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                StoredCertificate::from_row,
            )
            .optional()
            .map_err(db_err("get certificate"))
    }

    /// Certificates matching `filter`, newest first.
    pub fn list(&self, filter: &CertificateFilter) -> Result<Vec<StoredCertificate>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        for (column, wanted) in [
            ("user_id", &filter.user_id),
            ("device_serial", &filter.device_serial),
            ("organization", &filter.organization),
            ("method", &filter.method),
        ] {
            if let Some(wanted) = wanted {
                values.push(Value::Text(wanted.clone()));
                clauses.push(format!("{column} = ?{}", values.len()));
            }
        }
        if filter.valid_only {
            clauses.push("is_valid = 1".into());
        }

        let mut sql = SELECT_COLUMNS.to_owned();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        values.push(Value::Integer(i64::from(filter.limit)));
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{}", values.len()));

        let mut stmt = self.conn.prepare(&sql).map_err(db_err("prepare list"))?;
        let rows = stmt
            .query_map(params_from_iter(values), StoredCertificate::from_row)
            .map_err(db_err("list certificates"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read certificate row"))
    }

    /// Mark a certificate invalid.  Returns `false` if the id is unknown.
    #[instrument(skip(self))]
    pub fn invalidate(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE certificates SET is_valid = 0 WHERE id = ?1",
                params![id],
            )
            .map_err(db_err("invalidate"))?;
        Ok(changed > 0)
    }

    /// Record a successful verification.  Returns `false` if the id is
    /// unknown.
    pub fn mark_verified(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE certificates SET is_verified = 1, verified_at = ?2 WHERE id = ?1",
                params![id, at.to_rfc3339()],
            )
            .map_err(db_err("mark verified"))?;
        Ok(changed > 0)
    }

    // -- Operation history ---------------------------------------------------

    /// Append an erasure receipt to the history, whatever its outcome.
    #[instrument(skip_all, fields(operation_id = %receipt.operation_id))]
    pub fn record_operation(&self, receipt: &OperationReceipt) -> Result<()> {
        let error = receipt
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let duration_ms = u64::try_from(receipt.duration.as_millis()).unwrap_or(u64::MAX);
        self.conn
            .execute(
                "INSERT INTO operations (id, target, method, success, simulated,
                 passes_completed, total_passes, size_bytes, bytes_overwritten, error,
                 started_at, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    receipt.operation_id.to_string(),
                    serde_json::to_string(&receipt.target)?,
                    receipt.method.as_str(),
                    receipt.success,
                    receipt.simulated,
                    receipt.passes_completed,
                    receipt.total_passes,
                    receipt.size_bytes,
                    receipt.bytes_overwritten,
                    error,
                    receipt.started_at.to_rfc3339(),
                    duration_ms,
                ],
            )
            .map_err(db_err("record operation"))?;
        debug!(success = receipt.success, "operation recorded");
        Ok(())
    }

    /// Link an operation to the certificate issued for it.  Returns `false`
    /// if the operation is not in the history.
    pub fn attach_certificate(
        &self,
        operation: &OperationId,
        certificate_id: &str,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE operations SET certificate_id = ?2 WHERE id = ?1",
                params![operation.to_string(), certificate_id],
            )
            .map_err(db_err("attach certificate"))?;
        Ok(changed > 0)
    }

    /// Recorded operations, newest first.
    pub fn operations(&self, limit: u32, failed_only: bool) -> Result<Vec<OperationSummary>> {
        let filter = if failed_only { " WHERE success = 0" } else { "" };
        let sql = format!("{SELECT_OPERATIONS}{filter} ORDER BY started_at DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err("prepare history"))?;
        let rows = stmt
            .query_map(params![limit], OperationSummary::from_row)
            .map_err(db_err("list operations"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read operation row"))
    }

    // -- Totals --------------------------------------------------------------

    pub fn stats(&self) -> Result<CertificateStats> {
        self.stats_at(Utc::now())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> Result<CertificateStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(is_valid), 0),
                        COALESCE(SUM(is_verified), 0),
                        COALESCE(SUM(expires_at < ?1), 0)
                 FROM certificates",
                params![now.to_rfc3339()],
                |row| {
                    Ok(CertificateStats {
                        total: row.get(0)?,
                        valid: row.get(1)?,
                        verified: row.get(2)?,
                        expired: row.get(3)?,
                    })
                },
            )
            .map_err(db_err("stats"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_certificate;

    fn cert(id: &str, user: &str, method: EraseMethod, age_days: i64) -> Certificate {
        let mut cert = sample_certificate();
        cert.id = id.into();
        cert.subject.user_id = user.into();
        cert.erasure.method = method;
        cert.created_at = Utc::now() - chrono::Duration::days(age_days);
        cert.expires_at = cert.created_at + chrono::Duration::days(365);
        cert
    }

    #[test]
    fn insert_then_get() {
        let store = CertificateStore::open_in_memory().unwrap();
        let c = cert("CERT-20260101000000-00000001", "u1", EraseMethod::Zero, 0);
        store.insert(&c).unwrap();

        let stored = store.get(&c.id).unwrap().unwrap();
        assert_eq!(stored.certificate.id, c.id);
        assert_eq!(stored.certificate.subject, c.subject);
        assert_eq!(stored.certificate.erasure, c.erasure);
        assert!(stored.is_valid);
        assert!(!stored.is_verified);
        assert!(store.get("CERT-20260101000000-ffffffff").unwrap().is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = CertificateStore::open_in_memory().unwrap();
        let c = cert("CERT-20260101000000-00000002", "u1", EraseMethod::Zero, 0);
        store.insert(&c).unwrap();
        assert!(matches!(store.insert(&c), Err(TilgungError::Database(_))));
    }

    #[test]
    fn list_filters_and_orders() {
        let store = CertificateStore::open_in_memory().unwrap();
        for (id, user, method, age) in [
            ("CERT-20260101000000-0000000a", "alice", EraseMethod::Gutmann, 3),
            ("CERT-20260101000000-0000000b", "alice", EraseMethod::Zero, 1),
            ("CERT-20260101000000-0000000c", "bob", EraseMethod::Zero, 2),
        ] {
            store.insert(&cert(id, user, method, age)).unwrap();
        }

        let alice = store
            .list(&CertificateFilter {
                user_id: Some("alice".into()),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<_> = alice.iter().map(|s| s.certificate.id.as_str()).collect();
        assert_eq!(ids, ["CERT-20260101000000-0000000b", "CERT-20260101000000-0000000a"]);

        let zero = store
            .list(&CertificateFilter {
                method: Some("zero".into()),
                limit: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0].certificate.id, "CERT-20260101000000-0000000b");
    }

    #[test]
    fn invalidate_and_valid_only() {
        let store = CertificateStore::open_in_memory().unwrap();
        let c = cert("CERT-20260101000000-00000003", "u", EraseMethod::Zero, 0);
        store.insert(&c).unwrap();

        assert!(store.invalidate(&c.id).unwrap());
        assert!(!store.invalidate("CERT-20260101000000-ffffffff").unwrap());
        assert!(!store.get(&c.id).unwrap().unwrap().is_valid);

        let valid = store
            .list(&CertificateFilter {
                valid_only: true,
                ..Default::default()
            })
            .unwrap();
        assert!(valid.is_empty());
    }

    #[test]
    fn stats_count_each_flag() {
        let store = CertificateStore::open_in_memory().unwrap();
        assert_eq!(store.stats().unwrap(), CertificateStats::default());

        let fresh = cert("CERT-20260101000000-00000004", "u", EraseMethod::Zero, 0);
        let old = cert("CERT-20260101000000-00000005", "u", EraseMethod::Zero, 400);
        store.insert(&fresh).unwrap();
        store.insert(&old).unwrap();
        store.invalidate(&old.id).unwrap();
        assert!(store.mark_verified(&fresh.id, Utc::now()).unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(
            stats,
            CertificateStats {
                total: 2,
                valid: 1,
                verified: 1,
                expired: 1,
            }
        );
        let verified = store.get(&fresh.id).unwrap().unwrap();
        assert!(verified.is_verified && verified.verified_at.is_some());
    }

    fn receipt(success: bool, minutes_ago: i64) -> OperationReceipt {
        OperationReceipt {
            operation_id: OperationId::new(),
            target: Target::Directory("/srv/exports".into()),
            method: EraseMethod::Dod522022M,
            success,
            size_bytes: 4096,
            bytes_overwritten: if success { 12288 } else { 4096 },
            passes_completed: if success { 3 } else { 1 },
            total_passes: 3,
            duration: Duration::from_millis(1500),
            error: (!success).then(|| ReceiptError {
                kind: tilgung_core::types::ErrorKind::IoFailure,
                message: "1 entries under /srv/exports could not be erased".into(),
            }),
            verification_hash: None,
            simulated: false,
            started_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn failed_receipts_enter_the_history() {
        let store = CertificateStore::open_in_memory().unwrap();
        let ok = receipt(true, 10);
        let failed = receipt(false, 5);
        store.record_operation(&ok).unwrap();
        store.record_operation(&failed).unwrap();

        let all = store.operations(50, false).unwrap();
        let ids: Vec<_> = all.iter().map(|o| o.operation_id).collect();
        assert_eq!(ids, [failed.operation_id, ok.operation_id]);

        let latest = &all[0];
        assert!(!latest.success);
        assert_eq!(latest.target, failed.target);
        assert_eq!(latest.method, EraseMethod::Dod522022M);
        assert_eq!((latest.passes_completed, latest.total_passes), (1, 3));
        assert_eq!(latest.error, failed.error);
        assert_eq!(latest.duration(), Duration::from_millis(1500));
        assert!(latest.certificate_id.is_none());

        let only_failed = store.operations(50, true).unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].operation_id, failed.operation_id);
        assert_eq!(store.operations(1, false).unwrap().len(), 1);
    }

    #[test]
    fn certificate_links_to_its_operation() {
        let store = CertificateStore::open_in_memory().unwrap();
        let ok = receipt(true, 0);
        store.record_operation(&ok).unwrap();

        assert!(store
            .attach_certificate(&ok.operation_id, "CERT-20260101000000-00000007")
            .unwrap());
        assert!(!store
            .attach_certificate(&OperationId::new(), "CERT-20260101000000-00000008")
            .unwrap());

        let history = store.operations(10, false).unwrap();
        assert_eq!(
            history[0].certificate_id.as_deref(),
            Some("CERT-20260101000000-00000007")
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let c = cert("CERT-20260101000000-00000006", "u", EraseMethod::Zero, 0);
        CertificateStore::open(&path).unwrap().insert(&c).unwrap();
        assert!(CertificateStore::open(&path).unwrap().get(&c.id).unwrap().is_some());
    }
}
