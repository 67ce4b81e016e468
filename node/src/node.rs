//! The phasing node: an LMDB environment, the engine over it and the hook
//! that drives the engine from chain events.

use std::sync::Arc;

use vigil_ledger::LedgerView;
use vigil_phasing::PhasingEngine;
use vigil_store_lmdb::LmdbEnvironment;

use crate::config::PhasingConfig;
use crate::hook::IntegrationHook;
use crate::NodeError;

pub struct VigilNode {
    config: PhasingConfig,
    env: LmdbEnvironment,
    hook: IntegrationHook,
}

impl VigilNode {
    /// Open (or create) the store under `config.data_dir` and wire the engine
    /// to `ledger`. `height` is the current chain tip.
    pub fn open(
        config: PhasingConfig,
        ledger: Arc<dyn LedgerView + Send + Sync>,
        height: u64,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_max_dbs, config.lmdb_map_size)?;

        let engine = PhasingEngine::new(
            Arc::new(env.poll_store()),
            Arc::new(env.vote_store()),
            ledger,
            config.params.clone(),
        );
        let mut hook = IntegrationHook::new(Arc::new(engine), height);
        hook.set_emit_events(config.emit_events);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            schema = env.schema_version()?,
            height,
            "phasing store opened"
        );
        Ok(Self { config, env, hook })
    }

    pub fn config(&self) -> &PhasingConfig {
        &self.config
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }

    pub fn hook(&self) -> &IntegrationHook {
        &self.hook
    }

    pub fn hook_mut(&mut self) -> &mut IntegrationHook {
        &mut self.hook
    }

    pub fn engine(&self) -> &PhasingEngine {
        self.hook.engine()
    }
}
