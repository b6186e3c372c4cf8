pub mod classifier;
pub mod collector;
pub mod fetcher;
pub mod resolver;
pub mod urls;
