pub mod audit;
pub mod config;
pub mod executor;
pub mod lock;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod sot;
pub mod sot_store;
pub mod util;
