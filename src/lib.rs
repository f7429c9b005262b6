//! Control library for Demura display-panel test fixtures.
//!
//! The fixture is driven through the vendor library DemuraDLL, loaded at
//! runtime. [`Dut`] maps each library export onto a method and turns nonzero
//! status codes into [`DutError`]s carrying the fixture error code.

extern crate custom_error;
extern crate dlopen;
#[macro_use]
extern crate dlopen_derive;

pub mod config;
pub mod dut;
pub mod errcode;
pub mod error;
pub mod library;
pub mod modes;
pub mod pattern;
pub mod sequence;

#[cfg(test)]
mod fake;

pub use config::Config;
pub use dut::{Dut, DEFAULT_HOST};
pub use error::DutError;
pub use library::{DemuraApi, DemuraLibrary};
pub use modes::{DscMode, EmmcImage, ImageWrite, Rotation, Tailor};
pub use pattern::SolidColor;
pub use sequence::{write_demura, DemuraPlan};
