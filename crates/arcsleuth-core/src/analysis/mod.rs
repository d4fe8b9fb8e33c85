/// Analysis modules: algorithms that run over the completed hash index.
pub mod discrepancy;

pub use discrepancy::{analyze, is_divergent, presence_vector, DiscrepancyReport};
