pub mod context;
pub mod fetch;
pub mod linker;

pub use context::{ContextAnalyzer, ContextScore};
pub use fetch::ContentFetcher;
pub use linker::TickerLinker;
