//! Saving and loading whole designs.
//!
//! Both encodings carry the interner's strings next to the design, since
//! every [`Ident`](lowr_common::Ident) in the IR is only an index into them.
//! The JSON form is meant for inspection and fixtures; the binary form is a
//! length-prefixed header (magic, format version, payload checksum) followed
//! by the `bincode` payload.

use crate::design::Design;
use lowr_common::{ContentHash, Interner};
use serde::{Deserialize, Serialize};

const SNAPSHOT_MAGIC: [u8; 4] = *b"LOWR";
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Errors raised while saving or loading a design.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The JSON form could not be written or parsed.
    #[error("JSON snapshot error: {0}")]
    Json(#[from] serde_json::Error),
    /// The binary form could not be encoded.
    #[error("binary encoding failed: {reason}")]
    Encode {
        /// Description of the encoder failure.
        reason: String,
    },
    /// The binary form could not be decoded.
    #[error("binary decoding failed: {reason}")]
    Decode {
        /// Description of the decoder failure.
        reason: String,
    },
    /// The binary header is missing, foreign or from another format version.
    #[error("invalid snapshot header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },
    /// The payload does not match the checksum recorded in the header.
    #[error("snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum from the header.
        expected: String,
        /// Checksum of the payload read.
        actual: String,
    },
}

#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: ContentHash,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    names: Vec<String>,
    design: &'a Design,
}

#[derive(Deserialize)]
struct Snapshot {
    names: Vec<String>,
    design: Design,
}

/// Renders a design and its names as pretty-printed JSON.
pub fn to_json(design: &Design, interner: &Interner) -> Result<String, PersistError> {
    let snapshot = SnapshotRef {
        names: interner.snapshot(),
        design,
    };
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

/// Parses a design saved with [`to_json`], returning it with a fresh
/// interner that resolves all of its names.
pub fn from_json(json: &str) -> Result<(Design, Interner), PersistError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    Ok((snapshot.design, Interner::from_snapshot(&snapshot.names)))
}

/// Encodes a design and its names in the compact binary form.
pub fn to_bytes(design: &Design, interner: &Interner) -> Result<Vec<u8>, PersistError> {
    let config = bincode::config::standard();
    let snapshot = SnapshotRef {
        names: interner.snapshot(),
        design,
    };
    let payload = bincode::serde::encode_to_vec(&snapshot, config).map_err(|e| {
        PersistError::Encode {
            reason: e.to_string(),
        }
    })?;
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        format_version: SNAPSHOT_FORMAT_VERSION,
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes =
        bincode::serde::encode_to_vec(&header, config).map_err(|e| PersistError::Encode {
            reason: e.to_string(),
        })?;

    // 4-byte header length (little-endian) + header + payload
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes a design saved with [`to_bytes`].
pub fn from_bytes(raw: &[u8]) -> Result<(Design, Interner), PersistError> {
    let config = bincode::config::standard();
    let invalid = |reason: &str| PersistError::InvalidHeader {
        reason: reason.to_string(),
    };
    let len_bytes: [u8; 4] = raw
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("missing header length"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_bytes = raw
        .get(4..4 + header_len)
        .ok_or_else(|| invalid("truncated header"))?;
    let (header, _): (SnapshotHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, config).map_err(|e| {
            PersistError::Decode {
                reason: e.to_string(),
            }
        })?;
    if header.magic != SNAPSHOT_MAGIC {
        return Err(invalid("not a lowr snapshot"));
    }
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(invalid(&format!(
            "format version {} (expected {SNAPSHOT_FORMAT_VERSION})",
            header.format_version
        )));
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(PersistError::ChecksumMismatch {
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }
    let (snapshot, _): (Snapshot, usize) = bincode::serde::decode_from_slice(payload, config)
        .map_err(|e| PersistError::Decode {
            reason: e.to_string(),
        })?;
    Ok((snapshot.design, Interner::from_snapshot(&snapshot.names)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::const_value::ConstValue;
    use crate::expr::{BinaryOp, Expr};
    use crate::module::{BehaviorKind, Mode};
    use crate::stmt::{CaseArm, Statement};
    use crate::types::TypeDb;

    fn sample(interner: &Interner) -> Design {
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, interner, "top");
        let byte = b.bits(8);
        b.input("clk", TypeDb::BIT);
        b.input("a", byte);
        b.output("y", byte);
        let root = b.root();
        let clk = b.posedge("clk");
        let blk = b.behavior(root, BehaviorKind::Seq, vec![clk], Mode::Par);
        let y = b.name("y", byte);
        let sum = Expr::binary(
            BinaryOp::Add,
            b.read("a", byte),
            Expr::Value {
                value: ConstValue::Real(0.5),
                ty: TypeDb::FLOAT,
            },
            byte,
        );
        b.push(
            blk,
            Statement::Case {
                subject: b.read("a", byte),
                arms: vec![CaseArm {
                    value: Expr::int(0, byte),
                    body: vec![Statement::Nop],
                }],
                default: Some(vec![Statement::transmit(y, sum)]),
            },
        );
        design
    }

    #[test]
    fn json_roundtrip_keeps_names() {
        let interner = Interner::new();
        let design = sample(&interner);
        let json = to_json(&design, &interner).unwrap();
        let (restored, names) = from_json(&json).unwrap();
        assert_eq!(restored, design);
        assert_eq!(names.resolve(restored.top_module().name), "top");
    }

    #[test]
    fn binary_roundtrip() {
        let interner = Interner::new();
        let design = sample(&interner);
        let bytes = to_bytes(&design, &interner).unwrap();
        let (restored, names) = from_bytes(&bytes).unwrap();
        assert_eq!(restored, design);
        assert_eq!(names.len(), interner.len());
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let interner = Interner::new();
        let mut bytes = to_bytes(&sample(&interner), &interner).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            from_bytes(&bytes),
            Err(PersistError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn foreign_bytes_are_rejected() {
        assert!(matches!(
            from_bytes(&[1, 0]),
            Err(PersistError::InvalidHeader { .. })
        ));
    }
}
