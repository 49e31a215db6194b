//! Safe SQL builder: identifiers from the sanitizer or the catalog only, values as parameters.

mod builder;
pub mod ident;
pub mod page;
pub mod params;
pub use builder::*;
pub use ident::Ident;
pub use page::*;
pub use params::*;
