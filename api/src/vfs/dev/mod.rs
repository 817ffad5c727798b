//! 设备驱动
//!
//! - `axidma`: AXI DMA 双通道 (MM2S / S2MM) 驱动与传输编排
//! - `resmem`: 保留内存中介设备

pub mod axidma;
pub mod mmio;
pub mod resmem;

pub use mmio::{MapError, MmioMapping, RegisterIo};
