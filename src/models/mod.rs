mod product;
mod purchase;

pub use product::*;
pub use purchase::*;
