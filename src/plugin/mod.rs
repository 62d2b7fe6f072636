//! Component E: the linker-plugin adapter and the minimal transfer-vector
//! ABI it speaks to the driver (`ld`/`gold`/`lld -plugin`).

pub mod abi;
pub mod adapter;

pub use adapter::onload;
