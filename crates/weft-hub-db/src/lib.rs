mod events;
mod follow_ops;
mod resolver;
mod tables;

use std::path::PathBuf;
use std::{ops, result};

use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use weft_core::{Fid, Message, MessageKind};
use weft_util_error::FmtCompact as _;

pub use self::events::StoreEvent;
pub use self::tables::*;

const LOG_TARGET: &str = "weft::db";

pub struct WriteTransactionCtx {
    dbtx: redb_bincode::WriteTransaction,
    on_commit: std::sync::Mutex<Vec<Box<dyn FnOnce() + 'static>>>,
}

impl From<redb_bincode::WriteTransaction> for WriteTransactionCtx {
    fn from(dbtx: redb_bincode::WriteTransaction) -> Self {
        Self {
            dbtx,
            on_commit: std::sync::Mutex::new(vec![]),
        }
    }
}

impl ops::Deref for WriteTransactionCtx {
    type Target = redb_bincode::WriteTransaction;

    fn deref(&self) -> &Self::Target {
        &self.dbtx
    }
}

impl ops::DerefMut for WriteTransactionCtx {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dbtx
    }
}

impl WriteTransactionCtx {
    /// Run `f` after this transaction commits; never before.
    pub fn on_commit(&self, f: impl FnOnce() + 'static) {
        self.on_commit
            .lock()
            .expect("Locking failed")
            .push(Box::new(f));
    }

    fn commit(self) -> result::Result<(), redb::CommitError> {
        let Self { dbtx, on_commit } = self;

        dbtx.commit()?;

        for hook in on_commit.lock().expect("Locking failed").drain(..) {
            hook();
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum StoreError {
    Database {
        source: redb::DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Table {
        source: redb::TableError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Storage {
        source: redb::StorageError,
        #[snafu(implicit)]
        location: Location,
    },
    Transaction {
        source: redb::TransactionError,
        #[snafu(implicit)]
        location: Location,
    },
    Commit {
        source: redb::CommitError,
        #[snafu(implicit)]
        location: Location,
    },
    DbVersionTooHigh {
        db_ver: u64,
        code_ver: u64,
        #[snafu(implicit)]
        location: Location,
    },
    Join {
        source: JoinError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Message kind {kind:?} is not handled by this store"))]
    UnhandledKind {
        kind: MessageKind,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Follow message without a follow body"))]
    MalformedMessage {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("No message for this pair"))]
    NotFound {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Index entry points at a missing message"))]
    DanglingIndex {
        #[snafu(implicit)]
        location: Location,
    },
}

pub type StoreResult<T> = result::Result<T, StoreError>;

/// Pruning limits, applied per fid when [`FollowStore::prune_messages`] is
/// called. Both may be set; both then apply.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Keep at most this many messages per fid
    pub prune_size_limit: Option<usize>,
    /// Evict messages older than this many seconds
    pub prune_time_limit_secs: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            prune_size_limit: Some(10_000),
            prune_time_limit_secs: None,
        }
    }
}

/// Result of [`FollowStore::merge`]. Conflict losers and duplicates are
/// successes; nothing about them is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The message was installed; `revoked` lists the displaced messages
    Merged { revoked: Vec<Message> },
    /// The exact message was already merged
    Duplicate,
    /// The message lost conflict resolution against newer state
    Obsolete,
}

/// Replicated follow set of every user, backed by one `redb` database.
///
/// Writes serialize on the engine's single write transaction; reads run on
/// snapshots. Change notifications go out on a broadcast channel strictly
/// after the transaction that caused them commits.
#[derive(Debug)]
pub struct FollowStore {
    inner: redb_bincode::Database,
    options: StoreOptions,
    pub(crate) events_tx: broadcast::Sender<StoreEvent>,
}

impl FollowStore {
    const DB_VER: u64 = 0;

    pub async fn open(path: impl Into<PathBuf>, options: StoreOptions) -> StoreResult<FollowStore> {
        let path = path.into();
        debug!(target: LOG_TARGET, path = %path.display(), "Opening database");
        let inner = tokio::task::spawn_blocking(move || redb_bincode::Database::create(path))
            .await
            .context(JoinSnafu)?
            .context(DatabaseSnafu)?;

        Self::write_with_inner(&inner, |tx| {
            Self::init_tables_tx(tx)?;
            Self::handle_db_version_tx(tx)?;
            Ok(())
        })
        .await?;

        let (events_tx, _) = broadcast::channel(128);

        Ok(Self {
            inner,
            options,
            events_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Merge a follow message into the set.
    ///
    /// Resolves conflicts against the existing state of the
    /// `(fid, target)` pair; the whole update is one atomic write. After
    /// commit, a [`StoreEvent::Revoked`] is published for every displaced
    /// message, then [`StoreEvent::Merged`] for the winner.
    pub async fn merge(&self, message: &Message) -> StoreResult<MergeOutcome> {
        if !matches!(
            message.kind,
            MessageKind::FollowAdd | MessageKind::FollowRemove
        ) {
            return UnhandledKindSnafu { kind: message.kind }.fail();
        }
        let target = message.follow_target().context(MalformedMessageSnafu)?;

        self.write_with(|tx| self.merge_tx(message, target, tx))
            .await
    }

    /// The active follow-add for `(fid, target)`, if any.
    pub async fn get_follow_add(&self, fid: Fid, target: Fid) -> StoreResult<Message> {
        self.read_with(|tx| {
            let adds_table = tx.open_table(&follow_adds::TABLE)?;
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::get_pair_message_tx(fid, target, &adds_table, &messages_table)
        })
        .await
    }

    /// The active follow-remove for `(fid, target)`, if any.
    pub async fn get_follow_remove(&self, fid: Fid, target: Fid) -> StoreResult<Message> {
        self.read_with(|tx| {
            let removes_table = tx.open_table(&follow_removes::TABLE)?;
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::get_pair_message_tx(fid, target, &removes_table, &messages_table)
        })
        .await
    }

    /// All active follow-adds of `fid`, in target byte order.
    pub async fn get_follows_by_user(&self, fid: Fid) -> StoreResult<Vec<Message>> {
        self.read_with(|tx| {
            let adds_table = tx.open_table(&follow_adds::TABLE)?;
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::list_pair_messages_tx(fid, &adds_table, &messages_table)
        })
        .await
    }

    /// All active follow-removes of `fid`, in target byte order.
    pub async fn get_follow_removes_by_user(&self, fid: Fid) -> StoreResult<Vec<Message>> {
        self.read_with(|tx| {
            let removes_table = tx.open_table(&follow_removes::TABLE)?;
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::list_pair_messages_tx(fid, &removes_table, &messages_table)
        })
        .await
    }

    /// All active follow-adds targeting `target`, in follower byte order.
    pub async fn get_follows_by_target_user(&self, target: Fid) -> StoreResult<Vec<Message>> {
        self.read_with(|tx| {
            let by_target_table = tx.open_table(&follows_by_target::TABLE)?;
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::list_by_target_tx(target, &by_target_table, &messages_table)
        })
        .await
    }

    /// Every stored message of `fid`, adds and removes, in ts-hash order.
    pub async fn get_messages_by_user(&self, fid: Fid) -> StoreResult<Vec<Message>> {
        self.read_with(|tx| {
            let messages_table = tx.open_table(&messages::TABLE)?;
            Self::list_messages_tx(fid, &messages_table)
        })
        .await
    }

    /// Delete a message and its indexes, e.g. after its signer was
    /// removed upstream. Publishes [`StoreEvent::Revoked`] when something
    /// was actually deleted. Idempotent.
    pub async fn revoke(&self, message: &Message) -> StoreResult<bool> {
        self.write_with(|tx| self.revoke_tx(message, tx)).await
    }

    /// Enforce the configured size/age limits for one fid.
    ///
    /// Evicts oldest-first until both limits are satisfied; every eviction
    /// commits on its own and publishes [`StoreEvent::Pruned`], so a
    /// failure keeps the evictions (and events) that already happened.
    /// Returns the number of evicted messages.
    pub async fn prune_messages(&self, fid: Fid) -> StoreResult<usize> {
        let StoreOptions {
            prune_size_limit,
            prune_time_limit_secs,
        } = self.options;
        if prune_size_limit.is_none() && prune_time_limit_secs.is_none() {
            return Ok(0);
        }

        let candidates = self
            .read_with(|tx| {
                let messages_table = tx.open_table(&messages::TABLE)?;
                Self::select_prune_candidates_tx(
                    fid,
                    prune_size_limit,
                    prune_time_limit_secs,
                    &messages_table,
                )
            })
            .await?;

        let mut pruned = 0;
        for message in candidates {
            if let Err(err) = self.write_with(|tx| self.prune_one_tx(&message, tx)).await {
                // Evictions already committed stay committed, with their
                // events delivered
                warn!(
                    target: LOG_TARGET,
                    err = %err.fmt_compact(),
                    pruned,
                    "Eviction failed, stopping the prune pass"
                );
                return Err(err);
            }
            pruned += 1;
        }

        if pruned != 0 {
            debug!(target: LOG_TARGET, fid = %fid, count = pruned, "Pruned messages");
        }

        Ok(pruned)
    }
}

impl FollowStore {
    pub async fn write_with_inner<T>(
        inner: &redb_bincode::Database,
        f: impl FnOnce(&'_ WriteTransactionCtx) -> StoreResult<T>,
    ) -> StoreResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = WriteTransactionCtx::from(inner.begin_write().context(TransactionSnafu)?);
            let res = f(&dbtx)?;

            dbtx.commit().context(CommitSnafu)?;

            Ok(res)
        })
    }

    pub async fn write_with<T>(
        &self,
        f: impl FnOnce(&'_ WriteTransactionCtx) -> StoreResult<T>,
    ) -> StoreResult<T> {
        Self::write_with_inner(&self.inner, f).await
    }

    pub async fn read_with<T>(
        &self,
        f: impl FnOnce(&'_ redb_bincode::ReadTransaction) -> StoreResult<T>,
    ) -> StoreResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = self.inner.begin_read().context(TransactionSnafu)?;

            f(&dbtx)
        })
    }

    fn init_tables_tx(tx: &WriteTransactionCtx) -> StoreResult<()> {
        tx.open_table(&db_version::TABLE)?;

        tx.open_table(&messages::TABLE)?;
        tx.open_table(&follow_adds::TABLE)?;
        tx.open_table(&follow_removes::TABLE)?;
        tx.open_table(&follows_by_target::TABLE)?;
        Ok(())
    }

    fn handle_db_version_tx(tx: &WriteTransactionCtx) -> StoreResult<()> {
        let mut table_db_ver = tx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.first()?.map(|g| g.1.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &Self::DB_VER)?;

            return Ok(());
        };

        if Self::DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: Self::DB_VER,
            }
            .fail();
        }

        Ok(())
    }
}
