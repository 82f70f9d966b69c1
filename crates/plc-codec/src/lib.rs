//! Differential codec for did:plc operation chains.
//!
//! A did:plc identity's operation log is a sequence of small, mostly-similar
//! JSON-shaped documents. This crate decodes each operation into a canonical
//! binary object-map tree ([`Tree`]), recognizes recurring string shapes
//! (signatures, CIDs, `did:key:` keys, `at://` URIs) and rewrites them as
//! tagged binary leaves, then stores a chain as one full operation plus a
//! structural diff per subsequent operation.
//!
//! - **Tree**: the canonical decoded value ([`tree`])
//! - **Indexer**: deterministic flat pre-order numbering over a tree ([`index`])
//! - **Semantic tag layer**: string-shape compression ([`semtag`])
//! - **Differ/Patcher**: structural diff and patch over indexed trees ([`diff`], [`patch`])
//! - **Chain codec**: `compress`/`decompress` over a full operation chain ([`codec`])
//!
//! # Example
//!
//! ```
//! use plc_codec::{codec, fixture};
//!
//! # fn example() -> plc_codec::Result<()> {
//! let op1 = fixture::tree_from_json_str(r#"{"n": 1, "k": "a"}"#)?;
//! let op2 = fixture::tree_from_json_str(r#"{"n": 1, "k": "b"}"#)?;
//! let blob = codec::compress(&[op1, op2])?;
//! let ops = codec::decompress(&blob)?;
//! assert_eq!(ops.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// The chain codec: `compress`/`decompress` over a sequence of operations
pub mod codec;
/// Structural diff computation
pub mod diff;
pub mod error;
/// External collaborator traits (operation sources, spam filters)
pub mod external;
/// JSON fixture loading
pub mod fixture;
/// Deterministic flat indexing over trees
pub mod index;
/// Diff application (patching)
pub mod patch;
/// Semantic tag compression of recognized string shapes
pub mod semtag;
/// The canonical decoded tree data model
pub mod tree;

pub use codec::{compress, decompress};
pub use diff::{Diff, Insertion, compute_diff};
pub use error::{PlcCodecError, PlcCodecErrorKind, Result};
pub use index::{Indexer, flat_index};
pub use patch::apply_diff;
pub use tree::{Leaf, TaggedPayload, Tree};
