//! JSON Schema parameter validation (C1) and vendor response normalization
//! (C2) — both addressed by connector/operation identity rather than a
//! shared global validator.

pub mod normalizer;
pub mod validator;

pub use normalizer::{normalize, NormalizedPage};
pub use validator::{SchemaValidator, ValidationOutcome};
