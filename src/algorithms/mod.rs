pub mod additive;
pub mod upgma;

pub use additive::additive_phylogeny;
pub use upgma::upgma;
