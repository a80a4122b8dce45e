//! RPC-facing services. Each exposes `_`-prefixed inherent methods that take
//! an already resolved [`Viewer`](crate::access::Viewer), and a zel service
//! whose methods resolve the session token first.

pub mod accounts;
pub mod comments;
pub mod contact;
pub mod engagement;
pub mod newsletter;
pub mod posts;
pub mod taxonomy;
