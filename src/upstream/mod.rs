pub mod client;

pub use client::{HttpClient, UpstreamError, create_client};
