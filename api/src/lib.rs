//! nnaccel 用户态驱动
//!
//! 通过 AXI DMA (MM2S / S2MM) 与 FPGA 上的推理 IP 交换数据，
//! 并通过保留内存中介设备安全地访问 DMA 可见的物理内存。

#[macro_use]
extern crate log;

pub mod accel;
pub mod config;
pub mod file;
pub mod vfs;

pub use accel::{AccelError, AccelResult, Accelerator, InferenceFrame};
pub use config::PlatformConfig;
pub use file::resmem::ReservedMem;
pub use vfs::dev::axidma::{
    ChannelKind, DmaChannel, DmaError, DmaResult, StatusFlags, Transfer, TransferDescriptor,
    TransferReport,
};
pub use vfs::dev::mmio::{MapError, MmioMapping, RegisterIo};
pub use vfs::dev::resmem::{BridgeRequest, ReservedMemDevice, ResMemError, ResMemResult};
