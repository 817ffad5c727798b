//! AXI DMA (simple mode) 驱动
//!
//! 寄存器窗口通过 UIO 映射到用户态，包含两个互相独立的单向通道：
//! - MM2S: 保留内存 → 加速器数据流
//! - S2MM: 加速器数据流 → 保留内存
//!
//! 完成只通过轮询状态寄存器观测，不依赖中断回调。

mod channel;
mod error;
pub mod regs;
#[cfg(test)]
pub(crate) mod sim;
mod transfer;
mod types;

pub use channel::{DmaChannel, uio_path};
pub use error::{DmaError, DmaResult};
pub use regs::{ControlOp, StatusFlags, decode_status, encode_control};
pub use transfer::{Armed, ChannelPoll, Prepared, Started, Transfer, TransferReport};
pub use types::{ChannelKind, ChannelState, TransferDescriptor};
