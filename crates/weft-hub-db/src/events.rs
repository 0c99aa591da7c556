use weft_core::Message;

/// Change notification, published after the write transaction that caused
/// it has committed.
///
/// For a single merge the order is `Revoked` for each displaced message,
/// then `Merged` for the winner.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A message won its merge and is now part of the set
    Merged { message: Message },
    /// An existing message was displaced by a winning merge, or revoked
    /// outright
    Revoked { message: Message },
    /// A message was evicted by the pruner
    Pruned { message: Message },
}

impl StoreEvent {
    pub fn message(&self) -> &Message {
        match self {
            StoreEvent::Merged { message }
            | StoreEvent::Revoked { message }
            | StoreEvent::Pruned { message } => message,
        }
    }
}
