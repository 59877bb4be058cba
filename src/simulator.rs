//! Synthetic sensor simulator
//!
//! Generates bounded, trending readings per registered sensor on
//! independent periodic schedules, announces sensor status, and applies
//! remote configuration/command messages.

pub mod config;
pub mod control;
pub mod engine;

pub use config::{SensorConfig, SimulatorError};
pub use control::SensorControl;
pub use engine::SensorSimulator;
