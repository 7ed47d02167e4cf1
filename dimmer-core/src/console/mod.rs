//! Operator console shared between the firmware and the emulator.
//!
//! [`grammar`] turns a line into a [`grammar::Command`], [`commands`] applies it
//! to a [`crate::DimmerHandle`], and [`status`] renders the outcome. Everything
//! stays `no_std` so both front-ends share the same behaviour.

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod status;
