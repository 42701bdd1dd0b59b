mod image;
mod space;

pub use image::{MemoryImage, MemoryImageBuilder};
pub use space::{Address, AddressSpace};
