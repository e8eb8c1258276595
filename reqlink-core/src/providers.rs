//! Provider bundle trait for simplified type parameters.
//!
//! Bundles the network, time and task providers into a single type
//! parameter. The bundle is the explicitly passed handle to the event loop:
//! nothing in the client reaches for ambient global state.
//!
//! ```rust,ignore
//! use reqlink_core::{Providers, TokioProviders};
//!
//! let providers = TokioProviders::new();
//! let client = Client::connect(&providers, address, config, handler)?;
//! ```

use crate::{
    NetworkProvider, TaskProvider, TimeProvider, TokioNetworkProvider, TokioTaskProvider,
    TokioTimeProvider,
};

/// Bundle of all provider types for a runtime environment.
pub trait Providers: Clone + 'static {
    /// Network provider type for stream connections.
    type Network: NetworkProvider + Clone + 'static;

    /// Time provider type for timeouts.
    type Time: TimeProvider + Clone + 'static;

    /// Task provider type for spawning local tasks.
    type Task: TaskProvider + Clone + 'static;

    /// Get the network provider instance.
    fn network(&self) -> &Self::Network;

    /// Get the time provider instance.
    fn time(&self) -> &Self::Time;

    /// Get the task provider instance.
    fn task(&self) -> &Self::Task;
}

/// Production providers using Tokio runtime.
#[derive(Clone, Debug, Default)]
pub struct TokioProviders {
    network: TokioNetworkProvider,
    time: TokioTimeProvider,
    task: TokioTaskProvider,
}

impl TokioProviders {
    /// Create a new production providers bundle.
    pub fn new() -> Self {
        Self {
            network: TokioNetworkProvider::new(),
            time: TokioTimeProvider::new(),
            task: TokioTaskProvider,
        }
    }
}

impl Providers for TokioProviders {
    type Network = TokioNetworkProvider;
    type Time = TokioTimeProvider;
    type Task = TokioTaskProvider;

    fn network(&self) -> &Self::Network {
        &self.network
    }

    fn time(&self) -> &Self::Time {
        &self.time
    }

    fn task(&self) -> &Self::Task {
        &self.task
    }
}
