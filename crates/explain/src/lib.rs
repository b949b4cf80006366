//! # Readmit Explain
//!
//! HTTP client for the remote prediction service.
//!
//! Every explanation request walks an ordered list of candidate hosts, one attempt per host,
//! until one answers with a usable body. What counts as "this host failed" is a plain function
//! that callers can swap, and the transport itself sits behind [`ExplainTransport`] so the
//! fallback policy can be tested without a network.

pub mod client;
pub mod endpoints;
pub mod transport;

pub use client::{ExplainError, FallbackExplainer, HostHealth};
pub use endpoints::EndpointCandidates;
pub use transport::{
    default_host_failed, Attempt, EndpointUnreachable, ExplainTransport, FailurePredicate,
    RawResponse, ReqwestTransport, TransportError,
};
