pub mod rendered;
pub mod robots;
pub mod static_fetcher;

pub use rendered::RenderedFetcher;
pub use static_fetcher::StaticFetcher;
