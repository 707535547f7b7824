pub mod star;
pub mod trending;

pub use star::*;
pub use trending::*;
