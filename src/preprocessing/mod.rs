//! Data preprocessing module
//!
//! The fitted feature transform applied to the numerical columns before
//! training and again, from the persisted bundle, before prediction.

mod scaler;

pub use scaler::{Scaler, ScalerType};
