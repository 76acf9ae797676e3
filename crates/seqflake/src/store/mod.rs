mod cas;
#[cfg(feature = "etcd")]
mod etcd;
mod interface;
mod memory;

pub use cas::*;
#[cfg(feature = "etcd")]
pub use etcd::*;
pub use interface::*;
pub use memory::*;
