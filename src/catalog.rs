//! Remote farm catalog: descriptor models and the cached, explicitly
//! refreshed descriptor source.

pub mod models;
pub mod source;

pub use models::{FarmCatalogResponse, FarmDescriptor};
pub use source::DescriptorSource;
