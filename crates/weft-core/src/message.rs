use bincode::{Decode, Encode};

use crate::bincode::STD_BINCODE_CONFIG;
use crate::{byte_array_type_define, byte_array_type_impl_base32_str, Fid, Timestamp};

byte_array_type_define!(
    /// Hash identifying a message
    ///
    /// Opaque fixed-width bytes with a total order; for messages built by
    /// this workspace it is a truncated blake3 of the encoded fields.
    struct MessageHash, 20
);
byte_array_type_impl_base32_str!(MessageHash);

byte_array_type_define!(
    /// Chronologically sortable message identity: 4-byte big-endian
    /// [`Timestamp`] followed by the [`MessageHash`].
    ///
    /// Byte comparison of two `TsHash`es equals `(timestamp, hash)`
    /// lexicographic comparison, so range scans over `(fid, ts_hash)` keys
    /// enumerate a user's messages in insertion-time order.
    struct TsHash, 24
);
byte_array_type_impl_base32_str!(TsHash);

impl TsHash {
    pub fn new(timestamp: Timestamp, hash: MessageHash) -> Self {
        let mut bytes = [0u8; Self::LEN];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..].copy_from_slice(hash.as_slice());
        Self(bytes)
    }

    pub fn timestamp(self) -> Timestamp {
        Timestamp(u32::from_be_bytes(
            self.0[..4].try_into().expect("Fixed size"),
        ))
    }

    pub fn hash(self) -> MessageHash {
        MessageHash::from_bytes(self.0[4..].try_into().expect("Fixed size"))
    }
}

/// The meaning of a message's body.
///
/// The full hub dispatches each kind to its own store; the follow store
/// handles [`MessageKind::FollowAdd`] and [`MessageKind::FollowRemove`]
/// and rejects the rest.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Encode, Decode)]
pub enum MessageKind {
    /// Start following a user
    FollowAdd = 0x01,
    /// Stop following a user
    FollowRemove = 0x02,

    /// Public post
    Post = 0x10,
    /// Reaction to a post
    Reaction = 0x11,
    /// Profile metadata update
    ProfileUpdate = 0x12,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Encode, Decode)]
pub struct FollowBody {
    /// The user being followed (or unfollowed)
    pub target: Fid,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Encode, Decode)]
pub enum MessageBody {
    Follow(FollowBody),
    /// Body of a kind some other store interprets
    Raw(Vec<u8>),
}

/// A replicated message
///
/// Produced and signature-checked upstream; by the time one reaches a
/// store it is immutable and identified by `(fid, ts_hash)`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Encode, Decode)]
pub struct Message {
    pub fid: Fid,
    pub kind: MessageKind,
    pub timestamp: Timestamp,
    pub hash: MessageHash,
    pub body: MessageBody,
}

impl Message {
    pub fn follow_add(fid: Fid, target: Fid, timestamp: Timestamp) -> Self {
        Self::follow(fid, MessageKind::FollowAdd, target, timestamp)
    }

    pub fn follow_remove(fid: Fid, target: Fid, timestamp: Timestamp) -> Self {
        Self::follow(fid, MessageKind::FollowRemove, target, timestamp)
    }

    fn follow(fid: Fid, kind: MessageKind, target: Fid, timestamp: Timestamp) -> Self {
        let body = MessageBody::Follow(FollowBody { target });
        let hash = Self::compute_hash(fid, kind, timestamp, &body);
        Self {
            fid,
            kind,
            timestamp,
            hash,
            body,
        }
    }

    /// Content-addressed hash over the encoded fields.
    pub fn compute_hash(
        fid: Fid,
        kind: MessageKind,
        timestamp: Timestamp,
        body: &MessageBody,
    ) -> MessageHash {
        let encoded = bincode::encode_to_vec((fid, kind, timestamp, body), STD_BINCODE_CONFIG)
            .expect("Can't fail");
        let digest = blake3::hash(&encoded);
        MessageHash::from_bytes(
            digest.as_bytes()[..MessageHash::LEN]
                .try_into()
                .expect("Fixed size"),
        )
    }

    pub fn ts_hash(&self) -> TsHash {
        TsHash::new(self.timestamp, self.hash)
    }

    /// The followed user, for the two follow kinds with a well-formed body.
    pub fn follow_target(&self) -> Option<Fid> {
        match (self.kind, &self.body) {
            (MessageKind::FollowAdd | MessageKind::FollowRemove, MessageBody::Follow(body)) => {
                Some(body.target)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_hash_round_trips() {
        let hash = MessageHash::from_bytes([0xab; 20]);
        let ts = Timestamp(0x0102_0304);

        let ts_hash = TsHash::new(ts, hash);

        assert_eq!(ts_hash.timestamp(), ts);
        assert_eq!(ts_hash.hash(), hash);
        assert_eq!(&ts_hash.to_bytes()[..4], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn ts_hash_orders_by_timestamp_then_hash() {
        let early = TsHash::new(Timestamp(100), MessageHash::from_bytes([0xff; 20]));
        let late = TsHash::new(Timestamp(101), MessageHash::from_bytes([0x00; 20]));
        assert!(early < late);

        let low = TsHash::new(Timestamp(100), MessageHash::from_bytes([0x01; 20]));
        let high = TsHash::new(Timestamp(100), MessageHash::from_bytes([0x02; 20]));
        assert!(low < high);
    }

    #[test]
    fn add_and_remove_hash_differently() {
        let fid = Fid::from(1u64);
        let target = Fid::from(2u64);
        let ts = Timestamp(100);

        let add = Message::follow_add(fid, target, ts);
        let remove = Message::follow_remove(fid, target, ts);

        assert_ne!(add.hash, remove.hash);
        assert_eq!(add.follow_target(), Some(target));
        assert_eq!(remove.follow_target(), Some(target));
    }

    #[test]
    fn non_follow_kind_has_no_target() {
        let message = Message {
            fid: Fid::from(1u64),
            kind: MessageKind::Post,
            timestamp: Timestamp(1),
            hash: MessageHash::from_bytes([0; 20]),
            body: MessageBody::Raw(vec![1, 2, 3]),
        };

        assert_eq!(message.follow_target(), None);
    }
}
