#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod utils;

pub mod regs;
pub mod time;
pub mod pmu;

// Reexports
pub use pmu::{Config, Error, PowerController, SharedPowerController};
pub use regs::{Mmio, RegisterPort};
