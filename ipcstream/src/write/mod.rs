pub mod batch;
pub mod framer;
pub mod metadata;
pub mod stream;
