//! The uuid worker and the handle used to talk to it.
//!
//! - [`manager`] - [`manager::UuidDispatcher`], the sending side plus
//!   coordinated shutdown.
//! - [`worker`] - the task that owns the generator.
//! - [`request`] - messages exchanged between the two.

pub mod manager;
pub mod request;
pub mod worker;
