pub mod rooted_tree;
pub mod unrooted_tree;

pub use rooted_tree::RootedTree;
pub use unrooted_tree::UnrootedTree;
