//! Device models and MNA+LCP stamps for switchsim.
//!
//! This crate provides:
//! - Passive elements: R, C, L, coupled inductors
//! - Sources: V, I (independent) with DC/SIN/PULSE waveforms
//! - Complementarity switches: ideal diode, power MOSFET with body diode
//! - Meta-components: transformer (flattened to coupled inductors)

pub mod diode;
pub mod mosfet;
pub mod passive;
pub mod sources;
pub mod transformer;
pub mod waveforms;

pub use diode::Diode;
pub use mosfet::{BodyDiode, GateDrive, Mosfet};
pub use passive::{Capacitor, CoupledInductors, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use transformer::Transformer;
pub use waveforms::Waveform;
