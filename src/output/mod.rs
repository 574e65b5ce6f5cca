//! Output subsystem: conversion, gapless tracking and the driver thread

pub mod convert;
pub mod driver;
pub mod gapless;

pub use driver::{DriverStats, PipeDriver, StatsSnapshot};
pub use gapless::GaplessTracker;
