#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! Shared utilities for confit: filesystem helpers and artifact naming.

pub mod fs;
pub mod id;
