use weft_core::{Fid, Message, TsHash};

macro_rules! def_table {
    ($(#[$outer:meta])*
        $name:ident : $k:ty => $v:ty) => {
        #[allow(unused)]
        $(#[$outer])*
        pub mod $name {
            use super::*;
            pub type Key = $k;
            pub type Value = $v;
            pub type Definition<'a> = redb_bincode::TableDefinition<'a, Key, Value>;
            pub trait ReadableTable: redb_bincode::ReadableTable<Key, Value> {}
            impl<RT> ReadableTable for RT where RT: redb_bincode::ReadableTable<Key, Value> {}
            pub type Table<'a> = redb_bincode::Table<'a, Key, Value>;
            pub const TABLE: Definition = redb_bincode::TableDefinition::new(stringify!($name));
        }
    };
}

def_table! {
    /// Tracks database/schema version
    db_version: () => u64
}

def_table! {
    /// Primary message blobs, keyed `(fid, ts_hash)`
    ///
    /// Scanning a fid's range enumerates its messages in insertion-time
    /// order (timestamp, hash-tiebroken); every index below points into
    /// this table.
    messages: (Fid, TsHash) => Message
}

def_table! {
    /// Active follow-add per `(follower, target)` pair
    ///
    /// Presence means an add exists for the pair; the value dereferences
    /// into [`messages`]. Mutually exclusive with [`follow_removes`].
    follow_adds: (Fid, Fid) => TsHash
}

def_table! {
    /// Active follow-remove per `(follower, target)` pair
    follow_removes: (Fid, Fid) => TsHash
}

def_table! {
    /// Inverse index `(target, follower, ts_hash)`, adds only
    ///
    /// Answers "who follows this user"; rebuildable from [`messages`].
    follows_by_target: (Fid, Fid, TsHash) => ()
}
