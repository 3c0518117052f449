pub mod daughter;
pub mod error;
pub mod primary;

pub use daughter::DaughterConnection;
pub use error::DbError;
pub use primary::PrimaryConnection;
