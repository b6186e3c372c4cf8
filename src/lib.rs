pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod source;

pub use error::{InsightError, InsightResult};
pub use models::insights::{NodeKind, OutputRow, ProgressEvent, ResolvedEntity};
pub use services::fetcher::{FetchResponse, HttpFetcher, ReqwestFetcher};
pub use services::resolver::ItemSource;
pub use source::{InsightStream, SourceOptions, SourceState};
