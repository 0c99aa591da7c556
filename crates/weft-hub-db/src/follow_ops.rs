use itertools::Itertools as _;
use redb_bincode::ReadableTable;
use snafu::OptionExt as _;
use tracing::{debug, warn};
use weft_core::{Fid, Message, MessageKind, Timestamp, TsHash};

use crate::resolver::{self, MergeDecision};
use crate::{
    DanglingIndexSnafu, FollowStore, LOG_TARGET, MergeOutcome, NotFoundSnafu, StoreEvent,
    StoreResult, WriteTransactionCtx, follow_adds, follow_removes, follows_by_target, messages,
};

impl FollowStore {
    pub(crate) fn merge_tx(
        &self,
        message: &Message,
        target: Fid,
        tx: &WriteTransactionCtx,
    ) -> StoreResult<MergeOutcome> {
        let mut messages_table = tx.open_table(&messages::TABLE)?;
        let mut adds_table = tx.open_table(&follow_adds::TABLE)?;
        let mut removes_table = tx.open_table(&follow_removes::TABLE)?;
        let mut by_target_table = tx.open_table(&follows_by_target::TABLE)?;

        let fid = message.fid;
        let ts_hash = message.ts_hash();
        let pair = (fid, target);

        // At most one of the two pair indexes is populated; both are
        // checked so a merge also repairs a violated invariant.
        let existing_remove = removes_table.get(&pair)?.map(|g| g.value());
        let existing_add = adds_table.get(&pair)?.map(|g| g.value());

        let mut displaced = vec![];

        for (existing_kind, existing_ts_hash) in [
            (MessageKind::FollowRemove, existing_remove),
            (MessageKind::FollowAdd, existing_add),
        ] {
            let Some(existing_ts_hash) = existing_ts_hash else {
                continue;
            };

            match resolver::resolve(message.kind, ts_hash, existing_kind, existing_ts_hash) {
                MergeDecision::Loses => return Ok(MergeOutcome::Obsolete),
                MergeDecision::Duplicate => return Ok(MergeOutcome::Duplicate),
                MergeDecision::Wins => {
                    match messages_table
                        .get(&(fid, existing_ts_hash))?
                        .map(|g| g.value())
                    {
                        Some(existing) => displaced.push(existing),
                        None => {
                            warn!(
                                target: LOG_TARGET,
                                ts_hash = %existing_ts_hash,
                                "Index entry without a message, cleaning up"
                            );
                            match existing_kind {
                                MessageKind::FollowAdd => {
                                    adds_table.remove(&pair)?;
                                    by_target_table.remove(&(target, fid, existing_ts_hash))?;
                                }
                                _ => {
                                    removes_table.remove(&pair)?;
                                }
                            }
                        }
                    }
                }
            }
        }

        for existing in &displaced {
            Self::delete_message_tx(
                existing,
                &mut messages_table,
                &mut adds_table,
                &mut removes_table,
                &mut by_target_table,
            )?;
        }

        messages_table.insert(&(fid, ts_hash), message)?;
        match message.kind {
            MessageKind::FollowAdd => {
                adds_table.insert(&pair, &ts_hash)?;
                by_target_table.insert(&(target, fid, ts_hash), &())?;
            }
            MessageKind::FollowRemove => {
                removes_table.insert(&pair, &ts_hash)?;
            }
            _ => unreachable!(),
        }

        debug!(
            target: LOG_TARGET,
            fid = %fid,
            target = %target,
            kind = ?message.kind,
            "Merged follow message"
        );

        let events_tx = self.events_tx.clone();
        let merged = message.clone();
        let revoked = displaced.clone();
        tx.on_commit(move || {
            for message in revoked {
                let _ = events_tx.send(StoreEvent::Revoked { message });
            }
            let _ = events_tx.send(StoreEvent::Merged { message: merged });
        });

        Ok(MergeOutcome::Merged { revoked: displaced })
    }

    pub(crate) fn revoke_tx(
        &self,
        message: &Message,
        tx: &WriteTransactionCtx,
    ) -> StoreResult<bool> {
        let mut messages_table = tx.open_table(&messages::TABLE)?;
        let mut adds_table = tx.open_table(&follow_adds::TABLE)?;
        let mut removes_table = tx.open_table(&follow_removes::TABLE)?;
        let mut by_target_table = tx.open_table(&follows_by_target::TABLE)?;

        let removed = Self::delete_message_tx(
            message,
            &mut messages_table,
            &mut adds_table,
            &mut removes_table,
            &mut by_target_table,
        )?;

        if removed {
            debug!(target: LOG_TARGET, fid = %message.fid, kind = ?message.kind, "Revoked message");
            let events_tx = self.events_tx.clone();
            let message = message.clone();
            tx.on_commit(move || {
                let _ = events_tx.send(StoreEvent::Revoked { message });
            });
        }

        Ok(removed)
    }

    pub(crate) fn prune_one_tx(
        &self,
        message: &Message,
        tx: &WriteTransactionCtx,
    ) -> StoreResult<()> {
        let mut messages_table = tx.open_table(&messages::TABLE)?;
        let mut adds_table = tx.open_table(&follow_adds::TABLE)?;
        let mut removes_table = tx.open_table(&follow_removes::TABLE)?;
        let mut by_target_table = tx.open_table(&follows_by_target::TABLE)?;

        let removed = Self::delete_message_tx(
            message,
            &mut messages_table,
            &mut adds_table,
            &mut removes_table,
            &mut by_target_table,
        )?;

        if removed {
            let events_tx = self.events_tx.clone();
            let message = message.clone();
            tx.on_commit(move || {
                let _ = events_tx.send(StoreEvent::Pruned { message });
            });
        }

        Ok(())
    }

    /// Delete a message blob together with whichever indexes still point
    /// at it. Returns whether the blob existed.
    pub(crate) fn delete_message_tx(
        message: &Message,
        messages_table: &mut messages::Table<'_>,
        adds_table: &mut follow_adds::Table<'_>,
        removes_table: &mut follow_removes::Table<'_>,
        by_target_table: &mut follows_by_target::Table<'_>,
    ) -> StoreResult<bool> {
        let fid = message.fid;
        let ts_hash = message.ts_hash();

        let removed = messages_table.remove(&(fid, ts_hash))?.is_some();

        let Some(target) = message.follow_target() else {
            return Ok(removed);
        };
        let pair = (fid, target);

        match message.kind {
            MessageKind::FollowAdd => {
                // The pair index may already belong to a newer winner
                if adds_table.get(&pair)?.map(|g| g.value()) == Some(ts_hash) {
                    adds_table.remove(&pair)?;
                }
                by_target_table.remove(&(target, fid, ts_hash))?;
            }
            MessageKind::FollowRemove => {
                if removes_table.get(&pair)?.map(|g| g.value()) == Some(ts_hash) {
                    removes_table.remove(&pair)?;
                }
            }
            _ => {}
        }

        Ok(removed)
    }

    pub(crate) fn get_pair_message_tx(
        fid: Fid,
        target: Fid,
        index_table: &impl ReadableTable<(Fid, Fid), TsHash>,
        messages_table: &impl messages::ReadableTable,
    ) -> StoreResult<Message> {
        let ts_hash = index_table
            .get(&(fid, target))?
            .map(|g| g.value())
            .context(NotFoundSnafu)?;

        messages_table
            .get(&(fid, ts_hash))?
            .map(|g| g.value())
            .context(DanglingIndexSnafu)
    }

    pub(crate) fn list_pair_messages_tx(
        fid: Fid,
        index_table: &impl ReadableTable<(Fid, Fid), TsHash>,
        messages_table: &impl messages::ReadableTable,
    ) -> StoreResult<Vec<Message>> {
        let mut ret = vec![];

        for entry in index_table.range((fid, Fid::ZERO)..=(fid, Fid::MAX))? {
            let (_k, v) = entry?;
            let ts_hash = v.value();
            let message = messages_table
                .get(&(fid, ts_hash))?
                .map(|g| g.value())
                .context(DanglingIndexSnafu)?;
            ret.push(message);
        }

        Ok(ret)
    }

    pub(crate) fn list_by_target_tx(
        target: Fid,
        by_target_table: &impl follows_by_target::ReadableTable,
        messages_table: &impl messages::ReadableTable,
    ) -> StoreResult<Vec<Message>> {
        let mut ret = vec![];

        for entry in by_target_table
            .range((target, Fid::ZERO, TsHash::ZERO)..=(target, Fid::MAX, TsHash::MAX))?
        {
            let (k, _v) = entry?;
            let (_, follower, ts_hash) = k.value();
            let message = messages_table
                .get(&(follower, ts_hash))?
                .map(|g| g.value())
                .context(DanglingIndexSnafu)?;
            ret.push(message);
        }

        Ok(ret)
    }

    pub(crate) fn list_messages_tx(
        fid: Fid,
        messages_table: &impl messages::ReadableTable,
    ) -> StoreResult<Vec<Message>> {
        Ok(messages_table
            .range((fid, TsHash::ZERO)..=(fid, TsHash::MAX))?
            .map_ok(|(_k, v)| v.value())
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Walk `fid`'s messages oldest-first, selecting evictions while the
    /// age limit marks them stale or the running count still exceeds the
    /// size cap; the walk stops at the first survivor.
    pub(crate) fn select_prune_candidates_tx(
        fid: Fid,
        size_limit: Option<usize>,
        time_limit_secs: Option<u64>,
        messages_table: &impl messages::ReadableTable,
    ) -> StoreResult<Vec<Message>> {
        let now = Timestamp::now();
        let mut remaining = messages_table
            .range((fid, TsHash::ZERO)..=(fid, TsHash::MAX))?
            .count();

        let mut candidates = vec![];

        for entry in messages_table.range((fid, TsHash::ZERO)..=(fid, TsHash::MAX))? {
            let (_k, v) = entry?;
            let message = v.value();

            // A timestamp in the future is never stale
            let stale = time_limit_secs
                .is_some_and(|limit| limit < u64::from(now.seconds_since(message.timestamp)));
            let over_cap = size_limit.is_some_and(|cap| cap < remaining);
            if !stale && !over_cap {
                break;
            }

            candidates.push(message);
            remaining -= 1;
        }

        Ok(candidates)
    }
}
