//! Post-run quality checks.
//!
//! The validator reports a fixed set of independent pass/fail checks over the
//! final splits and written artifacts. Failures are data, not errors.

mod validator;

pub use validator::{MODEL_FILES, SPLIT_FILES, Validator, missing_check_name};
