//! Hearth Processing Library
//!
//! Intake validation and size-budget compression for uploaded images.

pub mod compression;
pub mod validator;

pub use compression::{
    BudgetPlan, CompressionError, CompressionExit, CompressionOutcome, CompressionSettings,
    EncodeState, SizeBudgetCompressor, Step,
};
pub use validator::{IntakePolicy, ValidationError};
