//! Wire shapes for the linewire relay protocol.
//!
//! The relay speaks a line-oriented request/response protocol: the client
//! sends at most one logical request per message, and the server replies
//! with messages in which any subset of response fields may be populated.
//! This crate describes those shapes as plain data; how they are framed and
//! encoded on the wire is the transport's concern.
//!
//! # Components
//!
//! - [`Request`] / [`RequestBody`]: tagged-union client messages with an
//!   optional correlation id
//! - [`Response`]: server messages; each populated field is an independent
//!   event
//! - [`Window`] / [`Line`]: the client-side view models flattened out of
//!   response payloads
//!
//! # Invariants
//!
//! - One Variant Per Request: a [`Request`] carries exactly one
//!   [`RequestBody`] variant. "At most one interpretation per message" is
//!   enforced by the type, not by convention.
//! - Correlation: [`Request::expects_response`] is true iff the request
//!   populates a line query; only such requests carry an id.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod model;
mod request;
mod response;

pub use model::{Activity, Line, Window};
pub use request::{
    InfoQuery, InputRequest, LineQuery, LineRequest, Request, RequestBody, Subscription,
    SubscriptionChange, WindowGet, WindowRequest,
};
pub use response::{InfoPayload, ItemEntry, ItemPayload, LineEntry, LinePayload, Response, WindowEntry, WindowPayload};
