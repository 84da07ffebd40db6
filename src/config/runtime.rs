// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::factory::StoreFactory;
use crate::config::{validate_config, Config};
use crate::errors::ConfigError;
use crate::lineage::{LineageResolver, ProvenanceAccess};
use crate::recorder::EventRecorder;
use crate::traits::ProvenanceStore;

/// Everything needed to record runs and answer lineage queries, sharing one store.
pub struct ProvenanceRuntime {
    pub store: Arc<dyn ProvenanceStore>,
    pub recorder: EventRecorder,
    pub resolver: LineageResolver,
    pub access: ProvenanceAccess,
}

/// Provenance runtime builder - opens the store and wires the components from configuration.
///
/// # Examples
///
/// ## Building a runtime from configuration
/// ```
/// use dagwood_lineage::config::{Config, RuntimeBuilder};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let config = Config::default();
/// let runtime = RuntimeBuilder::from_config(&config).await.unwrap();
///
/// // The default configuration records into memory
/// assert_eq!(runtime.recorder.active_runs(), 0);
/// assert!(runtime.access.list_runs(None).await.unwrap().is_empty());
/// # });
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the complete provenance runtime from configuration.
    ///
    /// Validates the configuration, opens the configured store and hands the
    /// same store to the recorder, the resolver and the access facade.
    pub async fn from_config(cfg: &Config) -> Result<ProvenanceRuntime, ConfigError> {
        validate_config(cfg)?;
        let store = StoreFactory::from_config(&cfg.storage).await?;
        Ok(Self::from_store(store, cfg))
    }

    /// Wire the components around an already opened store
    pub fn from_store(store: Arc<dyn ProvenanceStore>, cfg: &Config) -> ProvenanceRuntime {
        ProvenanceRuntime {
            recorder: EventRecorder::with_options(store.clone(), cfg.recorder.clone()),
            resolver: LineageResolver::with_options(store.clone(), cfg.lineage),
            access: ProvenanceAccess::new(store.clone()),
            store,
        }
    }
}
