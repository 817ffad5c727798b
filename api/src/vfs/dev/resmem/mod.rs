//! 保留内存中介设备
//!
//! 一段固定的物理内存 (DMA 缓冲区) 只能通过本设备访问。每次请求是一条
//! 16 字节记录 `[word_offset, length, addr_lo, addr_hi]`：
//!
//! - `write`: 从调用者缓冲区复制 `length` 字节到区域的 `word_offset * 4` 处
//! - `read`: 从区域复制 `length` 字节到调用者缓冲区
//!
//! 设备持有一个访问令牌，同一时刻只允许一个请求；令牌被占用时请求立即失败。

mod device;
mod error;
mod region;
mod types;

pub use device::{ReservedMemDevice, ReservedMemGuard};
pub use error::{ResMemError, ResMemResult};
pub use region::ReservedRegion;
pub use types::{BridgeRequest, RECORD_SIZE};
pub(crate) use types::span_fits;
