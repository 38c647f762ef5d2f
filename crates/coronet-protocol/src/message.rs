//! Administrative messages and their frame codec.
//!
//! Admin messages form a small closed set of control messages exchanged
//! over the admin broadcast channel. On the wire each message is one
//! classifier byte followed by a length-delimited payload:
//!
//! ```text
//! +------------+----------------+---------...---+
//! | classifier | payload length |    payload    |
//! |   1 byte   |  u32 big-end.  |               |
//! +------------+----------------+---------...---+
//! ```
//!
//! The census payload uses the text format described in [`crate::census`];
//! the remaining messages carry a single device id as UTF-8 bytes.

use crate::census::Census;
use crate::error::{Error, Result};
use crate::types::DeviceId;

/// Classifier byte for [`AdminMessage::Census`].
pub const CLASSIFIER_CENSUS: u8 = 0x01;
/// Classifier byte for [`AdminMessage::PronouncePrince`].
pub const CLASSIFIER_PRONOUNCE_PRINCE: u8 = 0x02;
/// Classifier byte for [`AdminMessage::AckPronouncePrince`].
pub const CLASSIFIER_ACK_PRONOUNCE_PRINCE: u8 = 0x03;
/// Classifier byte for [`AdminMessage::BowDownToNewKing`].
pub const CLASSIFIER_BOW_DOWN: u8 = 0x04;

/// Frame header size: classifier byte plus u32 payload length.
pub const FRAME_HEADER_LEN: usize = 5;

/// Upper bound on a single admin payload. A census of a few thousand
/// devices stays well under this; anything larger is a corrupt frame.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

/// A typed administrative control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMessage {
    /// Snapshot of every known device and its role, King-originated.
    Census(Census),
    /// The King designates the named device as the new Prince.
    PronouncePrince(DeviceId),
    /// The named device confirms it accepted the Prince designation.
    AckPronouncePrince(DeviceId),
    /// The losing King orders its kingdom to join the named new King.
    BowDownToNewKing(DeviceId),
}

impl AdminMessage {
    /// The classifier byte identifying this message type on the wire.
    pub fn classifier(&self) -> u8 {
        match self {
            Self::Census(_) => CLASSIFIER_CENSUS,
            Self::PronouncePrince(_) => CLASSIFIER_PRONOUNCE_PRINCE,
            Self::AckPronouncePrince(_) => CLASSIFIER_ACK_PRONOUNCE_PRINCE,
            Self::BowDownToNewKing(_) => CLASSIFIER_BOW_DOWN,
        }
    }

    /// Encode just the payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Census(census) => census.encode(),
            Self::PronouncePrince(id)
            | Self::AckPronouncePrince(id)
            | Self::BowDownToNewKing(id) => id.as_str().as_bytes().to_vec(),
        }
    }

    /// Reassemble a message from a classifier byte and payload bytes.
    pub fn from_parts(classifier: u8, payload: &[u8]) -> Result<Self> {
        let text = || String::from_utf8(payload.to_vec()).map_err(Error::from);
        match classifier {
            CLASSIFIER_CENSUS => Ok(Self::Census(Census::decode(&text()?))),
            CLASSIFIER_PRONOUNCE_PRINCE => {
                Ok(Self::PronouncePrince(device_id(classifier, text()?)?))
            }
            CLASSIFIER_ACK_PRONOUNCE_PRINCE => {
                Ok(Self::AckPronouncePrince(device_id(classifier, text()?)?))
            }
            CLASSIFIER_BOW_DOWN => Ok(Self::BowDownToNewKing(device_id(classifier, text()?)?)),
            other => Err(Error::UnknownClassifier(other)),
        }
    }

    /// Encode a complete frame: classifier, payload length, payload.
    ///
    /// Fails with [`Error::FrameTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_LEN`]; the length field is never truncated into a
    /// frame a peer would reject.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.payload();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::FrameTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        out.push(self.classifier());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode one complete frame from the front of `buf`.
    ///
    /// Returns the message and the number of bytes consumed, or
    /// [`Error::Truncated`] if the buffer does not yet hold a full frame.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(Error::Truncated {
                expected: FRAME_HEADER_LEN,
                got: buf.len(),
            });
        }
        let classifier = buf[0];
        let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(Error::FrameTooLarge {
                len,
                max: MAX_PAYLOAD_LEN,
            });
        }
        let total = FRAME_HEADER_LEN + len;
        if buf.len() < total {
            return Err(Error::Truncated {
                expected: len,
                got: buf.len() - FRAME_HEADER_LEN,
            });
        }
        let message = Self::from_parts(classifier, &buf[FRAME_HEADER_LEN..total])?;
        Ok((message, total))
    }
}

fn device_id(classifier: u8, text: String) -> Result<DeviceId> {
    if text.is_empty() {
        return Err(Error::EmptyDeviceId(classifier));
    }
    Ok(DeviceId::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn frame_round_trip_device_id_messages() {
        let messages = [
            AdminMessage::PronouncePrince(DeviceId::from("bravo")),
            AdminMessage::AckPronouncePrince(DeviceId::from("bravo")),
            AdminMessage::BowDownToNewKing(DeviceId::from("delta")),
        ];
        for msg in messages {
            let frame = msg.encode().unwrap();
            let (decoded, consumed) = AdminMessage::decode(&frame).unwrap();
            assert_eq!(decoded, msg);
            assert_eq!(consumed, frame.len());
        }
    }

    #[test]
    fn frame_round_trip_census() {
        let census: Census = [
            (DeviceId::from("alpha"), Role::King),
            (DeviceId::from("bravo"), Role::Prince),
        ]
        .into_iter()
        .collect();
        let msg = AdminMessage::Census(census);
        let frame = msg.encode().unwrap();
        let (decoded, _) = AdminMessage::decode(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_two_back_to_back_frames() {
        let first = AdminMessage::PronouncePrince(DeviceId::from("bravo"));
        let second = AdminMessage::BowDownToNewKing(DeviceId::from("delta"));
        let mut buf = first.encode().unwrap();
        buf.extend_from_slice(&second.encode().unwrap());

        let (m1, n1) = AdminMessage::decode(&buf).unwrap();
        let (m2, n2) = AdminMessage::decode(&buf[n1..]).unwrap();
        assert_eq!(m1, first);
        assert_eq!(m2, second);
        assert_eq!(n1 + n2, buf.len());
    }

    #[test]
    fn decode_short_buffer_reports_truncated() {
        let frame = AdminMessage::PronouncePrince(DeviceId::from("bravo")).encode().unwrap();
        let err = AdminMessage::decode(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_unknown_classifier() {
        let mut frame = AdminMessage::PronouncePrince(DeviceId::from("bravo")).encode().unwrap();
        frame[0] = 0x7f;
        let err = AdminMessage::decode(&frame).unwrap_err();
        assert!(matches!(err, Error::UnknownClassifier(0x7f)));
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut frame = vec![CLASSIFIER_CENSUS];
        frame.extend_from_slice(&(MAX_PAYLOAD_LEN as u32 + 1).to_be_bytes());
        let err = AdminMessage::decode(&frame).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let id = DeviceId::from("x".repeat(MAX_PAYLOAD_LEN + 1));
        let err = AdminMessage::BowDownToNewKing(id).encode().unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }

    #[test]
    fn empty_device_id_payload_is_rejected() {
        let err = AdminMessage::from_parts(CLASSIFIER_BOW_DOWN, b"").unwrap_err();
        assert!(matches!(err, Error::EmptyDeviceId(_)));
    }
}
