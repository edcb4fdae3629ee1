// SPDX-License-Identifier: Apache-2.0

//! Axum HTTP/JSON wiring for the `ofslicer` controller core (spec.md §6,
//! §10). Owns one [`Switch`](ofslicer::Switch) per datapath behind a
//! [`Controller`] and stands a [`driver::LoggingDriver`] in for the real
//! OpenFlow session, which is external to this exercise.

pub mod api;
pub mod config;
pub mod controller;
pub mod driver;

pub use controller::{ChangeSet, Controller, LearnRequest};
pub use driver::LoggingDriver;
