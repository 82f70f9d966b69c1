//! External collaborator traits: boundaries this codec is deliberately
//! decoupled from (spec.md §1 items 1-6). The codec itself never reaches a
//! database, queue, or moderation service; these traits exist so a caller
//! can wire their own operation source and spam filter without the core
//! `diff`/`patch`/`codec` modules knowing anything about I/O.
//!
//! Grounded on `jacquard-repo`'s `storage::BlockStore`: a `trait-variant`
//! async trait requiring `Send` on non-WASM targets, with `Clone` so
//! implementors can be cheaply shared across concurrent callers.

use smol_str::SmolStr;

use crate::error::Result;
use crate::tree::Tree;

/// One operation read from an operation source, prior to semantic tag
/// compression or diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    /// The did:plc identifier this operation belongs to.
    pub did: SmolStr,
    /// Content identifier of this operation, as stored by the source.
    pub cid: SmolStr,
    /// The decoded operation body.
    pub operation: Tree,
    /// Whether this operation was later nullified by a recovery operation.
    pub nullified: bool,
    /// Unix-epoch milliseconds the source recorded this operation at.
    pub created_at_ms: i64,
}

/// A source of did:plc operation chains, keyed by DID. Out of scope for
/// this crate to implement (spec.md §1 item 1) — this trait is the seam a
/// caller's database layer plugs into.
#[trait_variant::make(Send)]
pub trait OperationSource: Clone {
    /// Fetch every operation recorded for `did`, oldest first.
    async fn operations_for(&self, did: &str) -> Result<Vec<OperationRecord>>;

    /// List every DID the source knows about.
    async fn known_dids(&self) -> Result<Vec<SmolStr>>;
}

/// A spam/abuse classifier over DIDs. Out of scope for this crate to
/// implement (spec.md §1 item 3) — whatever heuristic or table a caller
/// uses to flag spam accounts lives behind this trait.
#[trait_variant::make(Send)]
pub trait SpamFilter: Clone {
    /// True if `did` should be excluded from compression/analysis.
    async fn is_spam(&self, did: &str) -> Result<bool>;
}

/// An in-memory [`OperationSource`]/[`SpamFilter`] pair for tests and the
/// CLI's local-fixture mode. Not meant for production use; a real deployment
/// wires these traits to its own database and moderation tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFixture {
    records: std::collections::BTreeMap<SmolStr, Vec<OperationRecord>>,
    spam: std::collections::BTreeSet<SmolStr>,
}

impl InMemoryFixture {
    /// Construct an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation record for its DID.
    pub fn insert(&mut self, record: OperationRecord) {
        self.records
            .entry(record.did.clone())
            .or_default()
            .push(record);
    }

    /// Flag a DID as spam.
    pub fn flag_spam(&mut self, did: impl Into<SmolStr>) {
        self.spam.insert(did.into());
    }
}

impl OperationSource for InMemoryFixture {
    async fn operations_for(&self, did: &str) -> Result<Vec<OperationRecord>> {
        Ok(self.records.get(did).cloned().unwrap_or_default())
    }

    async fn known_dids(&self) -> Result<Vec<SmolStr>> {
        Ok(self.records.keys().cloned().collect())
    }
}

impl SpamFilter for InMemoryFixture {
    async fn is_spam(&self, did: &str) -> Result<bool> {
        Ok(self.spam.contains(did))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(did: &str, cid: &str) -> OperationRecord {
        OperationRecord {
            did: SmolStr::new(did),
            cid: SmolStr::new(cid),
            operation: Tree::int(1),
            nullified: false,
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn fixture_round_trips_operations_and_spam_flags() {
        let mut fixture = InMemoryFixture::new();
        fixture.insert(record("did:plc:abc", "cid1"));
        fixture.insert(record("did:plc:abc", "cid2"));
        fixture.flag_spam("did:plc:spammer");

        let ops = fixture.operations_for("did:plc:abc").await.unwrap();
        assert_eq!(ops.len(), 2);

        assert!(fixture.is_spam("did:plc:spammer").await.unwrap());
        assert!(!fixture.is_spam("did:plc:abc").await.unwrap());

        let dids = fixture.known_dids().await.unwrap();
        assert_eq!(dids, vec![SmolStr::new("did:plc:abc")]);
    }
}
