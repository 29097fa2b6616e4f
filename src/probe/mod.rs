pub mod prober;
pub mod sweep;

pub use prober::{ProbeOutcome, Prober, ProberSettings};
