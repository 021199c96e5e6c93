//! Data provider adapters.
//!
//! The [`DataProvider`](crate::interfaces::DataProvider) trait lives in
//! [`interfaces`](crate::interfaces); this module holds wrappers layering
//! behavior over any implementation of it.

mod lifecycle;

pub use lifecycle::{
    with_lifecycle_callbacks, Callback, LifecycleCallbacks, ResourceCallbacks, ANY_RESOURCE,
};
