pub mod batch;
pub mod framer;
#[cfg(feature = "inspect")]
pub mod inspect;
pub mod metadata;
pub mod stream;
