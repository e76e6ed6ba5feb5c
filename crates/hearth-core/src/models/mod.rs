pub mod media;

pub use media::{MediaAsset, NewMediaFile, ParentEntity};
