pub mod io;
#[allow(clippy::module_inception)]
pub mod reconstruct;
