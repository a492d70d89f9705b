pub mod chunk;

pub use chunk::Chunk;
