//! Reconciliation protocol message types.
//!
//! Two message families share a connection: [`HandshakeMsg`] while the peers
//! negotiate compatibility, then [`ReconMsg`] for the exchange itself.

use serde::{Deserialize, Serialize};

use setrecon_core::{Bitstring, ZSet, Zp};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Message size limits.
pub mod limits {
    /// Max sample values in ReconRqstPoly.samples.
    pub const MAX_SAMPLES: usize = 1024;
    /// Max bytes of text in Error.
    pub const MAX_ERROR_TEXT: usize = 4096;
    /// Max filters advertised in a handshake.
    pub const MAX_FILTERS: usize = 64;
    /// Default max encoded frame size.
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
    /// Frame bytes budgeted per element. An element encodes to 17 bytes of
    /// CBOR; the rest covers the message envelope.
    pub const ELEMENT_FRAME_BUDGET: usize = 32;
    /// Max elements in any set-carrying message. A set at the limit always
    /// fits in a default-sized frame.
    pub const MAX_SET_ELEMENTS: usize = DEFAULT_MAX_FRAME_SIZE / ELEMENT_FRAME_BUDGET;
}

/// Messages exchanged during a reconciliation session.
///
/// The requester walks its prefix tree and asks about one node at a time;
/// the responder answers each request. Requests for a single node are never
/// pipelined: the requester waits for the answer before asking again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconMsg {
    /// Ask the responder to reconcile a node algebraically.
    ReconRqstPoly {
        /// Node prefix.
        prefix: Bitstring,
        /// Requester's element count under the node.
        size: u64,
        /// Requester's sample values for the node.
        samples: Vec<Zp>,
    },

    /// Ask the responder to diff a node against a literal element set.
    ReconRqstFull {
        /// Node prefix.
        prefix: Bitstring,
        /// Requester's elements under the node.
        elements: ZSet,
    },

    /// Elements the receiver is missing.
    Elements(ZSet),

    /// Every element of a node, sent when algebraic reconciliation failed
    /// on a node small enough to transfer outright.
    FullElements(ZSet),

    /// A node could not be reconciled and was too large to transfer.
    SyncFail,

    /// The requester is finished.
    Done,

    /// Write out everything queued so far.
    Flush,

    /// Error condition.
    Error {
        /// Human-readable description.
        text: String,
    },
}

impl ReconMsg {
    /// Build an Error message, truncating overlong text.
    pub fn error(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.len() > limits::MAX_ERROR_TEXT {
            let mut end = limits::MAX_ERROR_TEXT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        ReconMsg::Error { text }
    }

    /// Short variant name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ReconMsg::ReconRqstPoly { .. } => "ReconRqstPoly",
            ReconMsg::ReconRqstFull { .. } => "ReconRqstFull",
            ReconMsg::Elements(_) => "Elements",
            ReconMsg::FullElements(_) => "FullElements",
            ReconMsg::SyncFail => "SyncFail",
            ReconMsg::Done => "Done",
            ReconMsg::Flush => "Flush",
            ReconMsg::Error { .. } => "Error",
        }
    }

    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            ReconMsg::ReconRqstPoly { samples, .. } => {
                if samples.len() > limits::MAX_SAMPLES {
                    return Err("too many samples");
                }
            }
            ReconMsg::ReconRqstFull { elements: set, .. }
            | ReconMsg::Elements(set)
            | ReconMsg::FullElements(set) => {
                if set.len() > limits::MAX_SET_ELEMENTS {
                    return Err("too many elements");
                }
            }
            ReconMsg::Error { text } => {
                if text.len() > limits::MAX_ERROR_TEXT {
                    return Err("error text too long");
                }
            }
            ReconMsg::SyncFail | ReconMsg::Done | ReconMsg::Flush => {}
        }
        Ok(())
    }
}

/// What a peer advertises about itself before reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Software version, informational.
    pub version: String,
    /// Wire protocol version; must match.
    pub protocol_version: u8,
    /// Prefix bits per tree level; must match.
    pub bit_quantum: u32,
    /// Interpolation degree bound; must match.
    pub mbar: u32,
    /// Dataset filters applied by the peer; must match as a set.
    pub filters: Vec<String>,
}

impl PeerConfig {
    /// Explain why `remote` cannot reconcile with `self`, if it cannot.
    pub fn incompatibility(&self, remote: &PeerConfig) -> Option<String> {
        if self.protocol_version != remote.protocol_version {
            return Some(format!(
                "protocol version mismatch: local={}, remote={}",
                self.protocol_version, remote.protocol_version
            ));
        }
        if self.bit_quantum != remote.bit_quantum {
            return Some(format!(
                "bit quantum mismatch: local={}, remote={}",
                self.bit_quantum, remote.bit_quantum
            ));
        }
        if self.mbar != remote.mbar {
            return Some(format!(
                "mbar mismatch: local={}, remote={}",
                self.mbar, remote.mbar
            ));
        }
        let mut ours = self.filters.clone();
        let mut theirs = remote.filters.clone();
        ours.sort();
        theirs.sort();
        if ours != theirs {
            return Some(format!(
                "filter mismatch: local={:?}, remote={:?}",
                ours, theirs
            ));
        }
        None
    }
}

/// Result of a peer's compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigAck {
    Passed,
    Failed { reason: String },
}

/// Handshake messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeMsg {
    /// Advertise configuration.
    Config(PeerConfig),
    /// Report the compatibility verdict.
    Ack(ConfigAck),
}

impl HandshakeMsg {
    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> Result<(), &'static str> {
        match self {
            HandshakeMsg::Config(config) => {
                if config.filters.len() > limits::MAX_FILTERS {
                    return Err("too many filters");
                }
            }
            HandshakeMsg::Ack(ConfigAck::Failed { reason }) => {
                if reason.len() > limits::MAX_ERROR_TEXT {
                    return Err("failure reason too long");
                }
            }
            HandshakeMsg::Ack(ConfigAck::Passed) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PeerConfig {
        PeerConfig {
            version: "1.0.0".into(),
            protocol_version: PROTOCOL_VERSION,
            bit_quantum: 2,
            mbar: 5,
            filters: vec!["dedup".into(), "merge".into()],
        }
    }

    #[test]
    fn test_message_limits_valid() {
        let msg = ReconMsg::ReconRqstPoly {
            prefix: Bitstring::new(0),
            size: 3,
            samples: vec![Zp::ONE; 6],
        };
        assert!(msg.validate_limits().is_ok());
    }

    #[test]
    fn test_message_limits_exceeded() {
        let msg = ReconMsg::ReconRqstPoly {
            prefix: Bitstring::new(0),
            size: 3,
            samples: vec![Zp::ONE; limits::MAX_SAMPLES + 1],
        };
        assert!(msg.validate_limits().is_err());
    }

    #[test]
    fn test_largest_valid_set_fits_default_frame() {
        let encoded_len = |n: u128| {
            let msg = ReconMsg::ReconRqstFull {
                prefix: Bitstring::from_bytes(&[0xff; 16]),
                elements: (0..n).map(|i| Zp::new((1 << 120) + i)).collect(),
            };
            let mut buf = Vec::new();
            ciborium::into_writer(&msg, &mut buf).unwrap();
            buf.len()
        };
        let base = encoded_len(0);
        // both counts take a three-byte array header
        let per_element = (encoded_len(1300) - encoded_len(300)) / 1000;
        assert_eq!(per_element, 17);

        // array headers grow by a few bytes past 65535 entries
        let worst = base + 8 + limits::MAX_SET_ELEMENTS * per_element;
        assert!(worst <= limits::DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_error_text_truncated_on_char_boundary() {
        let text = "é".repeat(limits::MAX_ERROR_TEXT);
        let msg = ReconMsg::error(text);
        assert!(msg.validate_limits().is_ok());
        if let ReconMsg::Error { text } = msg {
            assert!(text.len() <= limits::MAX_ERROR_TEXT);
            assert!(text.chars().all(|c| c == 'é'));
        } else {
            panic!("expected Error message");
        }
    }

    #[test]
    fn test_compatible_ignores_filter_order() {
        let local = config();
        let mut remote = config();
        remote.filters.reverse();
        remote.version = "0.9.0".into();
        assert_eq!(local.incompatibility(&remote), None);
    }

    #[test]
    fn test_incompatible_mbar() {
        let local = config();
        let remote = PeerConfig {
            mbar: 7,
            ..config()
        };
        let reason = local.incompatibility(&remote).unwrap();
        assert!(reason.contains("mbar"));
    }
}
