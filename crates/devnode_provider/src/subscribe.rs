use std::sync::Arc;

use devnode_eth::{filter::LogOutput, B256, U256};
use devnode_evm::block::SyncBlock;

/// An event that a subscription pushes to its callback.
#[derive(Clone, Debug)]
pub struct SubscriptionEvent {
    /// The id of the subscription the event belongs to.
    pub filter_id: U256,
    /// The event's payload.
    pub result: SubscriptionEventData,
}

/// The payload of a [`SubscriptionEvent`].
#[derive(Clone, Debug)]
pub enum SubscriptionEventData {
    /// Logs of a mined block that match the subscription's criteria.
    Logs(Vec<LogOutput>),
    /// A newly mined block.
    NewHeads(Arc<dyn SyncBlock>),
    /// The hash of a transaction accepted into the pool.
    NewPendingTransactions(B256),
}

/// Trait for a callback that is invoked for every subscription event.
pub trait SyncSubscriberCallback: Fn(SubscriptionEvent) + Send + Sync {}

impl<CallbackT> SyncSubscriberCallback for CallbackT where
    CallbackT: Fn(SubscriptionEvent) + Send + Sync
{
}
