pub mod history;

pub use history::{CandleSource, FetchOptions, FetchSummary, HistoryFetcher};
