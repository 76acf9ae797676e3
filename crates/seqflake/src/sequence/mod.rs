mod allocator;
mod block;
#[cfg(test)]
mod tests;

pub use allocator::*;
pub use block::*;
