pub mod detail;
pub mod feed;
pub mod store;

pub use detail::MatchDetailView;
pub use feed::FeedView;
