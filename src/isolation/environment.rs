//! Full run environment: working root, isolation scope, rebound directories
//! and rendered daemon configurations.

use std::sync::Arc;

use tracing::{info, warn};

use super::{IsolationScope, NamespaceExecutor, WorkingRoot, chown_recursive, rebind};
use crate::config::Config;
use crate::domain::ConfigGenerator;
use crate::error::Result;
use crate::ports::IsolatedExecutor;

const LOOPBACK_UP_COMMAND: &str = "ip link set lo up";

pub struct Environment {
    scope: IsolationScope,
    executor: Arc<NamespaceExecutor>,
    root: WorkingRoot,
}

impl Environment {
    /// Prepare everything the daemons need before they are started
    ///
    /// The working root is validated before anything is touched, so an
    /// unsafe path fails without side effects.
    ///
    /// # Errors
    ///
    /// Returns `UnsafeWorkingRoot`, `Isolation`, `Ownership`, `Rebind` or
    /// `ConfigWrite` for the step that failed.
    pub async fn setup(config: &Config) -> Result<Self> {
        let root = WorkingRoot::prepare(&config.working_root).await?;
        let scope = IsolationScope::create().await?;
        let executor = Arc::new(NamespaceExecutor::new(&scope));

        let loopback = executor.run(LOOPBACK_UP_COMMAND).await?;
        if !loopback.success() {
            warn!(stderr = %loopback.stderr.trim(), "Could not bring up loopback inside the scope");
        }

        let frr = &config.frr;
        chown_recursive(executor.as_ref(), root.path(), &frr.user, &frr.group).await?;
        rebind(executor.as_ref(), &root, &frr.sysconfdir, &frr.user, &frr.group).await?;
        rebind(executor.as_ref(), &root, &frr.localstatedir, &frr.user, &frr.group).await?;

        ConfigGenerator::new(&config.configs, &root, &frr.sysconfdir)
            .generate_all(&config.cli, &config.daemons)
            .await?;

        info!(
            root = %root.path().display(),
            init_pid = scope.init_pid(),
            "Environment ready"
        );
        Ok(Self {
            scope,
            executor,
            root,
        })
    }

    #[must_use]
    pub fn executor(&self) -> Arc<dyn IsolatedExecutor> {
        self.executor.clone()
    }

    #[must_use]
    pub const fn root(&self) -> &WorkingRoot {
        &self.root
    }

    /// Tear the isolation scope down, taking any remaining daemon with it
    ///
    /// # Errors
    ///
    /// Returns an IO error if the scope holder cannot be killed.
    pub async fn teardown(self) -> Result<()> {
        self.scope.shutdown().await
    }
}
