use std::time::{Duration, Instant};

use devnode_eth::{
    filter::{FilteredEvents, LogOutput, SubscriptionType},
    log::{matches_address_filter, matches_topics_filter, FilterLog},
    Address, Bloom, BloomInput, HashSet, B256,
};

/// The amount of time a filter may go unpolled before it is evicted.
const FILTER_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// The normalized criteria of a log filter: resolved block numbers, an
/// address OR-set, and positional OR-of-lists topics.
#[derive(Clone, Debug, Default)]
pub struct LogFilter {
    /// The first block to search, inclusive.
    pub from_block: u64,
    /// The last block to search, inclusive. Tracks the latest block when
    /// absent.
    pub to_block: Option<u64>,
    /// The addresses to match. An empty set matches any address.
    pub addresses: HashSet<Address>,
    /// The topics to match, position by position. `None` at a position
    /// matches any topic; a non-empty list matches any of its entries.
    pub normalized_topics: Vec<Option<Vec<B256>>>,
}

impl LogFilter {
    /// Whether the log matches the filter's address and topic criteria.
    pub fn matches(&self, log: &FilterLog) -> bool {
        matches_address_filter(&log.address, &self.addresses)
            && matches_topics_filter(&log.topics, &self.normalized_topics)
    }
}

/// Whether a block with the provided logs bloom can contain a log that
/// matches the filter. A negative answer is definite; a positive answer
/// requires replaying the block's receipts.
pub fn bloom_contains_log_filter(bloom: &Bloom, filter: &LogFilter) -> bool {
    if !filter.addresses.is_empty()
        && !filter
            .addresses
            .iter()
            .any(|address| bloom.contains_input(BloomInput::Raw(address.as_slice())))
    {
        return false;
    }

    filter.normalized_topics.iter().all(|topics| {
        topics.as_ref().map_or(true, |topics| {
            topics
                .iter()
                .any(|topic| bloom.contains_input(BloomInput::Raw(topic.as_slice())))
        })
    })
}

/// Filters the provided logs by the filter's criteria.
pub fn filter_logs<'logs>(
    logs: impl Iterator<Item = &'logs FilterLog>,
    filter: &LogFilter,
) -> Vec<LogOutput> {
    logs.filter(|log| filter.matches(log))
        .map(LogOutput::from)
        .collect()
}

/// The accumulated events of an installed filter.
#[derive(Clone, Debug)]
pub enum FilterData {
    /// A log filter's criteria and the matching logs since the last poll.
    Logs {
        /// The filter's criteria
        criteria: LogFilter,
        /// The matching logs since the last poll
        logs: Vec<LogOutput>,
    },
    /// The hashes of blocks mined since the last poll.
    NewHeads(Vec<B256>),
    /// The hashes of transactions accepted into the pool since the last poll.
    NewPendingTransactions(Vec<B256>),
}

impl FilterData {
    /// The type of subscription the data belongs to.
    pub fn subscription_type(&self) -> SubscriptionType {
        match self {
            Self::Logs { .. } => SubscriptionType::Logs,
            Self::NewHeads(_) => SubscriptionType::NewHeads,
            Self::NewPendingTransactions(_) => SubscriptionType::NewPendingTransactions,
        }
    }
}

/// An installed filter or subscription.
#[derive(Clone, Debug)]
pub struct Filter {
    /// The data the filter has accumulated since the last poll.
    pub data: FilterData,
    deadline: Instant,
    /// Whether the filter is a subscription. Subscriptions push events to a
    /// callback instead of accumulating them.
    pub is_subscription: bool,
}

impl Filter {
    fn new(data: FilterData, is_subscription: bool) -> Self {
        Self {
            data,
            deadline: new_filter_deadline(),
            is_subscription,
        }
    }

    /// Constructs a new-heads filter, seeded with the current block's hash.
    pub fn new_block_filter(current_block_hash: B256, is_subscription: bool) -> Self {
        Self::new(
            FilterData::NewHeads(vec![current_block_hash]),
            is_subscription,
        )
    }

    /// Constructs a log filter, seeded with previously matching logs.
    pub fn new_log_filter(
        criteria: LogFilter,
        previous_logs: Vec<LogOutput>,
        is_subscription: bool,
    ) -> Self {
        Self::new(
            FilterData::Logs {
                criteria,
                logs: previous_logs,
            },
            is_subscription,
        )
    }

    /// Constructs a pending-transaction filter.
    pub fn new_pending_transaction_filter(is_subscription: bool) -> Self {
        Self::new(FilterData::NewPendingTransactions(Vec::new()), is_subscription)
    }

    /// Whether the filter has gone unpolled past its deadline.
    pub fn has_expired(&self) -> bool {
        Instant::now() > self.deadline
    }

    /// Takes and clears the events accumulated since the last poll,
    /// extending the filter's deadline.
    pub fn take_events(&mut self) -> FilteredEvents {
        self.deadline = new_filter_deadline();

        match &mut self.data {
            FilterData::Logs { logs, .. } => FilteredEvents::Logs(std::mem::take(logs)),
            FilterData::NewHeads(block_hashes) => {
                FilteredEvents::NewHeads(std::mem::take(block_hashes))
            }
            FilterData::NewPendingTransactions(hashes) => {
                FilteredEvents::NewPendingTransactions(std::mem::take(hashes))
            }
        }
    }

    /// Takes and clears the accumulated logs, if this is a log filter.
    pub fn take_log_events(&mut self) -> Option<Vec<LogOutput>> {
        match &mut self.data {
            FilterData::Logs { logs, .. } => {
                self.deadline = new_filter_deadline();
                Some(std::mem::take(logs))
            }
            FilterData::NewHeads(_) | FilterData::NewPendingTransactions(_) => None,
        }
    }
}

fn new_filter_deadline() -> Instant {
    Instant::now() + FILTER_DEADLINE
}
