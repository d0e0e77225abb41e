//! Services shared by library and CLI frontends

pub mod progress;

pub use progress::{ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
