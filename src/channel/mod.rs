//! Typed event channel: schema-checked commands in, notifications out.

pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::{Command, Notification};
