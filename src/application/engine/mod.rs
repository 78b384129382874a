//! Application services for the real-time signal pipeline: the Market
//! Data Ingestor, HTF Context, Oracle Pool, Signal Composer, Broadcast &
//! Validator, and Executor & Monitor (§2). `system` wires the six
//! components together the way `application::system::Application` wires
//! the rest of this crate's services.

pub mod broadcast;
pub mod composer;
pub mod executor;
pub mod htf_context;
pub mod ingestor;
pub mod observability;
pub mod oracle_pool;
pub mod queue;
pub mod system;
