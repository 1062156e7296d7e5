use std::{sync::Arc, time::Duration};

use tokio::{
    runtime,
    sync::{oneshot, Mutex},
    task::JoinHandle,
};

use crate::{data::ProviderData, time::TimeSinceEpoch, IntervalConfig, ProviderError};

/// Mines a block at the configured interval on a background task, for as long
/// as the miner is alive. Dropping the miner stops the task.
pub struct IntervalMiner {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ProviderError>>>,
    runtime: runtime::Handle,
}

impl IntervalMiner {
    /// Spawns a mining task on the provided runtime.
    pub fn new<TimerT: Clone + TimeSinceEpoch>(
        runtime: runtime::Handle,
        config: IntervalConfig,
        data: Arc<Mutex<ProviderData<TimerT>>>,
    ) -> Self {
        let (shutdown, shutdown_receiver) = oneshot::channel();
        let task = runtime.spawn(mining_loop(config, data, shutdown_receiver));

        Self {
            shutdown: Some(shutdown),
            task: Some(task),
            runtime,
        }
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn mining_loop<TimerT: Clone + TimeSinceEpoch>(
    config: IntervalConfig,
    data: Arc<Mutex<ProviderData<TimerT>>>,
    mut shutdown_receiver: oneshot::Receiver<()>,
) -> Result<(), ProviderError> {
    loop {
        let delay = Duration::from_millis(config.generate_interval());

        // A closed channel means the miner was dropped without signalling;
        // treat both the same way.
        if tokio::time::timeout(delay, &mut shutdown_receiver)
            .await
            .is_ok()
        {
            return Ok(());
        }

        tokio::select! {
            // The miner may be dropped while the provider holds the lock.
            _ = &mut shutdown_receiver => return Ok(()),
            mut data = data.lock() => {
                if let Err(error) = data.interval_mine() {
                    log::error!("Unexpected error while performing interval mining: {error}");
                    return Err(error);
                }
            }
        }
    }
}

impl Drop for IntervalMiner {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may have already exited on a mining error.
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(error) = tokio::task::block_in_place(|| self.runtime.block_on(task)) {
                log::warn!("Failed to join the interval mining task: {error}");
            }
        }
    }
}
