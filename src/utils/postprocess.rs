//! Post-processing of model output before it is shown to a user.

pub mod markup;
