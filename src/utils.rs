pub mod diff;
pub mod postprocess;
pub mod prompt_processing;
pub mod timing;
pub mod token;
#[cfg(feature = "terminal_printing")]
pub mod printing;
