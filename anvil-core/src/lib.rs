//! anvil core library.
//!
//! The phased provisioning workflow: validate the environment, compute a
//! partition layout, materialize filesystems and mounts, install the base
//! system, configure it from within its own root, and always release the
//! staging area on the way out.

pub mod configure;
pub mod context;
pub mod defaults;
pub mod errors;
pub mod executor;
pub mod installer;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod preflight;
pub mod report;
