pub mod classifier;
pub mod connection_ops;
