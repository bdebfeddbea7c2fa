//! Wire messages exchanged with a device over its session connection.
//!
//! Lanbeam rides on WebSocket message boundaries, so there is no framing of
//! its own. Text messages carry the handshake and the structured control
//! records, binary messages carry file bytes.
//!
//! ## Host → device
//!
//! | Message | Encoding |
//! |---------|----------|
//! | Offer notification | text `file_request:<filename>:<initiator-address>` |
//! | Metadata | JSON text `{"type":"file_metadata","filename":..,"filesize":..}` |
//! | Payload | binary, raw file bytes |
//! | Completion | JSON text `{"type":"transfer_complete"}` |
//!
//! ## Device → host
//!
//! | Message | Encoding |
//! |---------|----------|
//! | Decision | text `file_response:<token>:accept` or `file_response:<token>:reject` |
//!
//! The token is echoed by the device but carries no meaning: a device has at
//! most one pending offer, so the decision always refers to it.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of the offer notification sent to a device.
pub const FILE_REQUEST_PREFIX: &str = "file_request";

/// Prefix of the decision message sent back by a device.
pub const FILE_RESPONSE_PREFIX: &str = "file_response";

/// A message as it travels over the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// UTF-8 text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
}

impl WireMessage {
    /// Length of the message body in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }
}

/// Structured control records, serialized as JSON text messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRecord {
    /// Announces the file that follows
    FileMetadata {
        /// Base name of the file
        filename: String,
        /// Exact number of payload bytes that follow
        filesize: u64,
    },
    /// Marks the end of a transfer
    TransferComplete,
}

/// An outbound frame written to a device connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Offer notification for a pending transfer
    Offer {
        /// File name shown to the user
        filename: String,
        /// Address of the host making the offer
        initiator: String,
    },
    /// Metadata record preceding the payload
    Metadata {
        /// Base name of the file
        filename: String,
        /// Total payload bytes
        filesize: u64,
    },
    /// One block of file bytes
    Chunk(Vec<u8>),
    /// Completion marker
    Complete,
}

impl Frame {
    /// Encode the frame into the message that goes on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if a control record cannot be serialized.
    pub fn encode(self) -> Result<WireMessage> {
        match self {
            Self::Offer {
                filename,
                initiator,
            } => Ok(WireMessage::Text(format!(
                "{FILE_REQUEST_PREFIX}:{filename}:{initiator}"
            ))),
            Self::Metadata { filename, filesize } => encode_record(&ControlRecord::FileMetadata {
                filename,
                filesize,
            }),
            Self::Chunk(data) => Ok(WireMessage::Binary(data)),
            Self::Complete => encode_record(&ControlRecord::TransferComplete),
        }
    }

    /// Whether this frame carries file bytes.
    #[must_use]
    pub const fn is_payload(&self) -> bool {
        matches!(self, Self::Chunk(_))
    }
}

fn encode_record(record: &ControlRecord) -> Result<WireMessage> {
    Ok(WireMessage::Text(serde_json::to_string(record)?))
}

/// A device's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Start the transfer
    Accept,
    /// Drop the offer
    Reject,
}

impl Decision {
    /// Parse the decision keyword used on the wire.
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    /// The keyword used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound message from a device, decoded once at the loop boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Answer to the pending offer
    Decision {
        /// Opaque token echoed by the device
        token: String,
        /// The answer
        decision: Decision,
    },
    /// The device closed the connection
    Close,
    /// Anything this protocol does not define
    Other,
}

impl InboundMessage {
    /// Decode a text message.
    ///
    /// The decision keyword is the last `:`-separated field, so tokens may
    /// themselves contain colons (IPv6 addresses, for example).
    #[must_use]
    pub fn parse_text(text: &str) -> Self {
        let Some(rest) = text
            .strip_prefix(FILE_RESPONSE_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            return Self::Other;
        };

        let Some((token, keyword)) = rest.rsplit_once(':') else {
            return Self::Other;
        };

        Decision::parse(keyword.trim()).map_or(Self::Other, |decision| Self::Decision {
            token: token.to_string(),
            decision,
        })
    }

    /// Decode a message read from the connection.
    #[must_use]
    pub fn decode(message: &WireMessage) -> Self {
        match message {
            WireMessage::Text(text) => Self::parse_text(text),
            WireMessage::Binary(_) => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_encoding() {
        let frame = Frame::Offer {
            filename: "report.pdf".into(),
            initiator: "192.168.1.2".into(),
        };
        assert_eq!(
            frame.encode().unwrap(),
            WireMessage::Text("file_request:report.pdf:192.168.1.2".into())
        );
    }

    #[test]
    fn test_metadata_encoding() {
        let frame = Frame::Metadata {
            filename: "report.pdf".into(),
            filesize: 2_000_000,
        };
        let WireMessage::Text(text) = frame.encode().unwrap() else {
            panic!("metadata must be a text message");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "file_metadata");
        assert_eq!(value["filename"], "report.pdf");
        assert_eq!(value["filesize"], 2_000_000);
    }

    #[test]
    fn test_complete_encoding() {
        let WireMessage::Text(text) = Frame::Complete.encode().unwrap() else {
            panic!("completion must be a text message");
        };
        assert_eq!(text, r#"{"type":"transfer_complete"}"#);
    }

    #[test]
    fn test_chunk_is_binary() {
        let frame = Frame::Chunk(vec![1, 2, 3]);
        assert!(frame.is_payload());
        assert_eq!(frame.encode().unwrap(), WireMessage::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_accept_and_reject() {
        assert_eq!(
            InboundMessage::parse_text("file_response:192.168.1.2:accept"),
            InboundMessage::Decision {
                token: "192.168.1.2".into(),
                decision: Decision::Accept,
            }
        );
        assert_eq!(
            InboundMessage::parse_text("file_response:x:reject"),
            InboundMessage::Decision {
                token: "x".into(),
                decision: Decision::Reject,
            }
        );
    }

    #[test]
    fn test_parse_token_with_colons() {
        assert_eq!(
            InboundMessage::parse_text("file_response:fe80::1:accept"),
            InboundMessage::Decision {
                token: "fe80::1".into(),
                decision: Decision::Accept,
            }
        );
    }

    #[test]
    fn test_parse_empty_token() {
        assert_eq!(
            InboundMessage::parse_text("file_response::accept"),
            InboundMessage::Decision {
                token: String::new(),
                decision: Decision::Accept,
            }
        );
    }

    #[test]
    fn test_unrecognized_messages() {
        for text in [
            "",
            "hello",
            "file_response",
            "file_response:accept",
            "file_response:t:maybe",
            "file_request:a.txt:1.2.3.4",
            "file_responses:t:accept",
            r#"{"type":"clipboard_metadata"}"#,
        ] {
            assert_eq!(InboundMessage::parse_text(text), InboundMessage::Other, "{text}");
        }
        assert_eq!(
            InboundMessage::decode(&WireMessage::Binary(vec![0; 4])),
            InboundMessage::Other
        );
    }
}
