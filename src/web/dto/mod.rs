//! Data Transfer Objects for Web API.

pub mod request;

pub use request::*;
