//! Persisted session reports with integrity digests.
//!
//! Layout: `<dir>/<session_id>/session.json` plus `session.digest`, the
//! hex SHA-256 of the JSON bytes.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::session::SessionReport;

const REPORT_FILE: &str = "session.json";
const DIGEST_FILE: &str = "session.digest";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Directory holding the artifacts of `session_id`.
pub fn session_dir(dir: &Path, session_id: &Uuid) -> PathBuf {
    dir.join(session_id.to_string())
}

/// Write `<dir>/<session_id>/session.json` and its digest.
pub fn write_session_artifact(
    report: &SessionReport,
    dir: &Path,
) -> Result<PathBuf, ArtifactError> {
    let session_dir = session_dir(dir, &report.session_id);
    std::fs::create_dir_all(&session_dir)?;

    let artifact_path = session_dir.join(REPORT_FILE);
    let json = serde_json::to_vec_pretty(report)?;

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(session_dir.join(DIGEST_FILE), digest_hex(&json).as_bytes())?;

    Ok(artifact_path)
}

/// Read `<dir>/<session_id>/session.json`, verifying its digest first.
pub fn read_session_artifact(
    session_id: &Uuid,
    dir: &Path,
) -> Result<SessionReport, ArtifactError> {
    let session_dir = session_dir(dir, session_id);
    let json = std::fs::read(session_dir.join(REPORT_FILE))?;
    let expected = std::fs::read_to_string(session_dir.join(DIGEST_FILE))?;

    let actual = digest_hex(&json);
    if expected.trim() != actual {
        return Err(ArtifactError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::domain::{Attempt, ExecutionResult, GeneratedTest, Specification, SynthesisConfig};
    use crate::fakes::fixed_instant;
    use crate::ledger::HistoryLedger;
    use crate::session::SessionStatus;

    fn report() -> SessionReport {
        let mut ledger = HistoryLedger::new();
        ledger.append(
            Attempt::new(1, "def add(a, b): return a - b", fixed_instant()),
            ExecutionResult::new(
                "1 failed",
                vec!["test_candidate.py::test_add".into()],
                Duration::from_millis(12),
                Vec::new(),
            )
            .at(fixed_instant()),
        );
        ledger.append(
            Attempt::new(2, "def add(a, b): return a + b", fixed_instant()),
            ExecutionResult::passing("1 passed", Duration::from_millis(9)).at(fixed_instant()),
        );
        let mut diagnoses = BTreeMap::new();
        diagnoses.insert(1, "subtraction instead of addition".to_string());

        SessionReport {
            session_id: Uuid::new_v4(),
            specification: Specification::new("add two numbers"),
            test: Some(GeneratedTest::new("def test_add(): assert add(1, 2) == 3")),
            config: SynthesisConfig::default(),
            status: SessionStatus::Succeeded,
            failure: None,
            ledger,
            diagnoses,
            finished_at: fixed_instant(),
        }
    }

    #[test]
    fn round_trips_with_digest() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();

        let path = write_session_artifact(&report, dir.path()).unwrap();
        assert!(path.ends_with("session.json"));

        let restored = read_session_artifact(&report.session_id, dir.path()).unwrap();
        assert_eq!(restored, report);
    }

    #[test]
    fn tampered_report_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();
        let path = write_session_artifact(&report, dir.path()).unwrap();

        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("a + b", "a * b");
        std::fs::write(&path, tampered).unwrap();

        let err = read_session_artifact(&report.session_id, dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::DigestMismatch { .. }));
    }

    #[test]
    fn missing_session_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_session_artifact(&Uuid::new_v4(), dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Io(_)));
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
