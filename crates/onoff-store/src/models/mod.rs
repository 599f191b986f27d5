mod organization;
mod package;
mod release;
mod repository;
pub use organization::*;
pub use package::*;
pub use release::*;
pub use repository::*;
