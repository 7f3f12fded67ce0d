//! Governance record types.
//!
//! Records are built by producers outside this crate, sealed once through the
//! digest service, persisted once and then only read back. Timestamps are
//! serialized as epoch milliseconds so the hashed bytes are the same no
//! matter which implementation produced them.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use govault_canonical::{digest_serializable, to_canonical_value, verify, Digest, Verification};

use crate::error::RecordResult;

/// Schema version stamped on new receipts.
pub const RECEIPT_SCHEMA_VERSION: &str = "1.0";

/// Schema version stamped on new manifests.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";

/// Current time at the precision records are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A record that carries its own content hash in a trailing `*_hash` field.
pub trait SealedRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Name of the field holding the hash; excluded from the hash input.
    const HASH_FIELD: &'static str;

    /// Short record kind used in logs and storage paths.
    const KIND: &'static str;

    fn hash(&self) -> Option<&Digest>;

    fn set_hash(&mut self, hash: Option<Digest>);

    /// Drop sub-millisecond precision from timestamps, so the in-memory
    /// record equals what a load returns.
    fn truncate_timestamps(&mut self);

    /// Hash of the record with the hash field excluded.
    fn compute_hash(&self) -> RecordResult<Digest> {
        Ok(digest_serializable(self, &[Self::HASH_FIELD])?)
    }

    /// Compute and store the hash. Returns the new hash.
    fn seal(&mut self) -> RecordResult<Digest> {
        let hash = self.compute_hash()?;
        self.set_hash(Some(hash.clone()));
        Ok(hash)
    }

    fn is_sealed(&self) -> bool {
        self.hash().is_some()
    }

    /// Re-hash the record and compare with the stored hash.
    fn verify(&self) -> RecordResult<Verification> {
        let value = to_canonical_value(self)?;
        let stored = self.hash().map(Digest::as_str);
        Ok(verify(&value, stored, Self::HASH_FIELD)?)
    }
}

/// Outcome recorded by a governance receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
    Deferred,
}

/// One approval attached to a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub approved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Signed receipt of a governance action within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub schema_version: String,
    pub session_id: String,
    pub receipt_id: String,
    /// Action that was governed (e.g. `release.promote`).
    pub action: String,
    pub actor: String,
    pub decision: Decision,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvals: Vec<Approval>,
    /// Action-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_hash: Option<Digest>,
}

impl Receipt {
    /// Create an unsealed receipt with an empty payload.
    pub fn new(
        session_id: impl Into<String>,
        receipt_id: impl Into<String>,
        action: impl Into<String>,
        actor: impl Into<String>,
        decision: Decision,
    ) -> Self {
        Self {
            schema_version: RECEIPT_SCHEMA_VERSION.to_string(),
            session_id: session_id.into(),
            receipt_id: receipt_id.into(),
            action: action.into(),
            actor: actor.into(),
            decision,
            issued_at: now_millis(),
            approvals: Vec::new(),
            payload: serde_json::json!({}),
            receipt_hash: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approvals.push(approval);
        self
    }
}

impl SealedRecord for Receipt {
    const HASH_FIELD: &'static str = "receipt_hash";
    const KIND: &'static str = "receipt";

    fn hash(&self) -> Option<&Digest> {
        self.receipt_hash.as_ref()
    }

    fn set_hash(&mut self, hash: Option<Digest>) {
        self.receipt_hash = hash;
    }

    fn truncate_timestamps(&mut self) {
        self.issued_at = self.issued_at.trunc_subsecs(3);
        for approval in &mut self.approvals {
            approval.approved_at = approval.approved_at.trunc_subsecs(3);
        }
    }
}

/// One artifact shipped in a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestArtifact {
    pub name: String,
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Link from a manifest to the on-chain governance registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceRef {
    pub registry_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
}

/// Release manifest. Superseded by newer versions, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub schema_version: String,
    pub version: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub released_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<ManifestArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<GovernanceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<Digest>,
}

impl ReleaseManifest {
    /// Create an unsealed manifest with no artifacts.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            version: version.into(),
            released_at: now_millis(),
            artifacts: Vec::new(),
            governance: None,
            notes: None,
            manifest_hash: None,
        }
    }

    pub fn with_artifact(mut self, name: impl Into<String>, digest: Digest) -> Self {
        self.artifacts.push(ManifestArtifact {
            name: name.into(),
            digest,
            size_bytes: None,
        });
        self
    }
}

impl SealedRecord for ReleaseManifest {
    const HASH_FIELD: &'static str = "manifest_hash";
    const KIND: &'static str = "manifest";

    fn hash(&self) -> Option<&Digest> {
        self.manifest_hash.as_ref()
    }

    fn set_hash(&mut self, hash: Option<Digest>) {
        self.manifest_hash = hash;
    }

    fn truncate_timestamps(&mut self) {
        self.released_at = self.released_at.trunc_subsecs(3);
    }
}

/// Hash and transaction receipt handed over by the on-chain deployment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Release version that was anchored.
    pub version: String,
    /// Manifest hash written on chain.
    pub manifest_hash: Digest,
    pub chain_id: u64,
    pub contract_address: String,
    pub tx_hash: String,
    pub block_number: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub deployed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_hash: Option<Digest>,
}

impl SealedRecord for DeploymentRecord {
    const HASH_FIELD: &'static str = "deployment_hash";
    const KIND: &'static str = "deployment";

    fn hash(&self) -> Option<&Digest> {
        self.deployment_hash.as_ref()
    }

    fn set_hash(&mut self, hash: Option<Digest>) {
        self.deployment_hash = hash;
    }

    fn truncate_timestamps(&mut self) {
        self.deployed_at = self.deployed_at.trunc_subsecs(3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use govault_canonical::digest_bytes;

    fn fixed_receipt() -> Receipt {
        let mut r = Receipt::new("s-1", "r-1", "release.promote", "alice", Decision::Approved);
        r.issued_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        r
    }

    #[test]
    fn test_seal_then_verify() {
        let mut r = fixed_receipt();
        assert!(!r.is_sealed());
        let hash = r.seal().unwrap();
        assert!(r.is_sealed());

        let v = r.verify().unwrap();
        assert!(v.matches);
        assert_eq!(v.computed, hash);
        assert!(!v.canonical_form.contains("receipt_hash"));
    }

    #[test]
    fn test_seal_is_idempotent() {
        let mut r = fixed_receipt();
        let first = r.seal().unwrap();
        let second = r.seal().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutation_after_seal_fails_verification() {
        let mut r = fixed_receipt();
        r.seal().unwrap();
        r.decision = Decision::Rejected;
        assert!(!r.verify().unwrap().matches);
    }

    #[test]
    fn test_timestamp_serialized_as_epoch_millis() {
        let json = serde_json::to_value(fixed_receipt()).unwrap();
        assert_eq!(json["issued_at"], serde_json::json!(1_700_000_000_000i64));
        assert!(json.get("approvals").is_none());
        assert!(json.get("receipt_hash").is_none());
    }

    #[test]
    fn test_manifest_seal_roundtrip_through_json() {
        let mut m = ReleaseManifest::new("1.2.0").with_artifact("bundle.tar", digest_bytes(b"x"));
        m.seal().unwrap();

        let json = serde_json::to_string(&m).unwrap();
        let back: ReleaseManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert!(back.verify().unwrap().matches);
    }

    #[test]
    fn test_new_receipt_survives_json_roundtrip() {
        let mut r = Receipt::new("s-1", "r-1", "release.promote", "alice", Decision::Approved)
            .with_approval(Approval {
                approver: "bob".to_string(),
                approved_at: Utc::now(),
                signature: None,
            });
        r.truncate_timestamps();
        r.seal().unwrap();

        let back: Receipt = serde_json::from_str(&serde_json::to_string(&r).unwrap()).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_truncate_keeps_hash() {
        let mut m = ReleaseManifest::new("2.0.0");
        m.released_at = Utc::now();
        let before = m.compute_hash().unwrap();
        m.truncate_timestamps();
        assert_eq!(m.compute_hash().unwrap(), before);
        assert_eq!(m.released_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_decision_serde() {
        assert_eq!(
            serde_json::to_string(&Decision::Deferred).unwrap(),
            "\"deferred\""
        );
    }
}
