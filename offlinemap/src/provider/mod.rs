//! Network collaborators of the downloader.
//!
//! The downloader only needs two capabilities from the network: fetching the
//! body of a URL and knowing whether the network is reachable at all. Both are
//! traits so tests can substitute in-memory fakes.

mod connectivity;
mod http;
mod types;

pub use connectivity::{AssumeOnline, Connectivity, TcpConnectivity};
pub use http::{Fetcher, ReqwestFetcher, DEFAULT_TIMEOUT_SECS};
pub use types::FetchError;

#[cfg(test)]
pub use http::tests::MockFetcher;
