use std::cmp::Ordering;

use weft_core::{MessageKind, TsHash};

/// What to do with an incoming message given one existing message on the
/// same `(follower, target)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeDecision {
    /// Install the incoming message, delete the existing one
    Wins,
    /// Keep the existing message; the incoming one is a no-op
    Loses,
    /// The incoming message is already merged
    Duplicate,
}

/// Last-write-wins by `(timestamp, hash)` byte order.
///
/// Adds and removes compete directly; a remove only has priority when the
/// two ts-hashes are exactly equal (possible when the same `(timestamp,
/// hash)` shows up under both kinds), so that the pair converges on the
/// remove.
pub(crate) fn resolve(
    incoming_kind: MessageKind,
    incoming: TsHash,
    existing_kind: MessageKind,
    existing: TsHash,
) -> MergeDecision {
    match incoming.cmp(&existing) {
        Ordering::Less => MergeDecision::Loses,
        Ordering::Greater => MergeDecision::Wins,
        Ordering::Equal if incoming_kind == existing_kind => MergeDecision::Duplicate,
        Ordering::Equal => {
            if incoming_kind == MessageKind::FollowRemove {
                MergeDecision::Wins
            } else {
                MergeDecision::Loses
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use weft_core::{MessageHash, Timestamp};

    use super::*;

    fn ts_hash(ts: u32, byte: u8) -> TsHash {
        TsHash::new(Timestamp(ts), MessageHash::from_bytes([byte; 20]))
    }

    #[test]
    fn later_timestamp_wins() {
        assert_eq!(
            resolve(
                MessageKind::FollowAdd,
                ts_hash(101, 0),
                MessageKind::FollowAdd,
                ts_hash(100, 0xff),
            ),
            MergeDecision::Wins
        );
        assert_eq!(
            resolve(
                MessageKind::FollowAdd,
                ts_hash(100, 0xff),
                MessageKind::FollowAdd,
                ts_hash(101, 0),
            ),
            MergeDecision::Loses
        );
    }

    #[test]
    fn hash_breaks_timestamp_ties() {
        assert_eq!(
            resolve(
                MessageKind::FollowRemove,
                ts_hash(100, 1),
                MessageKind::FollowAdd,
                ts_hash(100, 2),
            ),
            MergeDecision::Loses
        );
    }

    #[test]
    fn same_kind_same_ts_hash_is_duplicate() {
        assert_eq!(
            resolve(
                MessageKind::FollowAdd,
                ts_hash(100, 1),
                MessageKind::FollowAdd,
                ts_hash(100, 1),
            ),
            MergeDecision::Duplicate
        );
    }

    #[test]
    fn remove_wins_exact_ts_hash_tie() {
        assert_eq!(
            resolve(
                MessageKind::FollowRemove,
                ts_hash(100, 1),
                MessageKind::FollowAdd,
                ts_hash(100, 1),
            ),
            MergeDecision::Wins
        );
        assert_eq!(
            resolve(
                MessageKind::FollowAdd,
                ts_hash(100, 1),
                MessageKind::FollowRemove,
                ts_hash(100, 1),
            ),
            MergeDecision::Loses
        );
    }
}
