//! REST API access for the CRM backend.
//!
//! - `transport`: the raw HTTP layer (`reqwest` in production)
//! - `pipeline`: bearer-token injection and single-flight 401 recovery
//! - `client`: typed JSON helpers over the pipeline
//! - `resources`: endpoint paths
//! - `normalize`: list-envelope normalization

pub mod client;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod resources;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use normalize::normalize_list;
pub use pipeline::RequestPipeline;
pub use resources::Resource;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
