pub mod benchmark;
pub mod ground_truth;
