pub mod http;
pub mod provider;

pub use http::HttpCricketApi;
pub use provider::{MatchSource, SecondarySource};
