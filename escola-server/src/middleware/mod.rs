//! HTTP middleware stack.
//!
//! Order on the way in: [`trace`] → [`cors`] → [`auth`], then the per-route
//! [`permission`] and [`throttle`] layers.

pub mod auth;
pub mod cors;
pub mod permission;
pub mod throttle;
pub mod trace;
