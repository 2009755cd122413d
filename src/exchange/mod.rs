pub mod client;
pub mod error;
pub mod profile;

pub use client::ExchangeClient;
pub use error::FetchError;
pub use profile::{ExchangeId, ExchangeProfile};
