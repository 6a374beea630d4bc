pub mod envelope;
pub mod requests;
