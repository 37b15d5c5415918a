pub mod backup;
pub mod codec;
pub mod config;
pub mod contract;
pub mod favorites;
pub mod favorites_store;
pub mod logging;
pub mod model;
pub mod ranking;
pub mod runtime;
pub mod settings;
pub mod transport;
