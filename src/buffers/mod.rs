pub mod ring;

pub use ring::{ChunkRing, MAX_RING_CAPACITY};
