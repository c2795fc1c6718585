//! # Vigil PDP
//!
//! `vigil_pdp` assembles the Vigil crates into an embeddable policy
//! decision point. A caller subscribes with an authorization subscription
//! and receives a live stream of decisions that follows every change of the
//! documents, the configuration and the attributes the decision depends
//! on.
//!
//! ## Crate Structure
//!
//! - **config**: The PDP configuration file
//! - **provider**: Configuration as change-over-time streams
//! - **attributes**: An in-memory attribute source
//! - **logging**: Tracing subscriber initialisation
//! - **pdp**: The embedded decision point

pub mod attributes;
pub mod config;
pub mod logging;
pub mod pdp;
pub mod provider;

// Re-export key types for convenience
pub use attributes::AttributeBroker;
pub use config::{LoggingConfig, PdpConfig, RESERVED_VARIABLES};
pub use logging::init_tracing;
pub use pdp::{EmbeddedPdp, EmbeddedPdpBuilder};
pub use provider::{ConfigurationProvider, Variables, WatchConfigurationProvider};
