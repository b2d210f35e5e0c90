//! Isolation module - Linux namespaces and the disposable working root
//!
//! Everything the harness runs (daemons, probes, injected commands) executes
//! inside one [`IsolationScope`]; everything it writes lands under one
//! [`WorkingRoot`].

mod environment;
mod namespace;
mod rebind;
mod working_root;

pub use environment::Environment;
pub use namespace::{IsolationScope, NamespaceExecutor};
pub use rebind::{chown_recursive, rebind};
pub use working_root::{WorkingRoot, rotated_name};
