//! 保留内存请求记录

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::error::{ResMemError, ResMemResult};

/// 请求记录字节数
pub const RECORD_SIZE: usize = core::mem::size_of::<BridgeRequest>();

/// `word_offset * 4 + length <= size`，在 64 位上计算，不会溢出
pub(crate) fn span_fits(word_offset: u32, length: u64, size: usize) -> bool {
    word_offset as u64 * 4 + length <= size as u64
}

/// 一次读/写请求
///
/// 线上格式为 4 个小端 u32：`[word_offset, length, addr_lo, addr_hi]`。
/// `word_offset` 以 4 字节为单位，`length` 以字节为单位，
/// `addr_lo | addr_hi << 32` 是调用者缓冲区地址。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct BridgeRequest {
    word_offset: U32,
    length: U32,
    addr_lo: U32,
    addr_hi: U32,
}

impl BridgeRequest {
    pub fn new(word_offset: u32, length: u32, caller_addr: u64) -> Self {
        Self {
            word_offset: U32::new(word_offset),
            length: U32::new(length),
            addr_lo: U32::new(caller_addr as u32),
            addr_hi: U32::new((caller_addr >> 32) as u32),
        }
    }

    pub fn word_offset(&self) -> u32 {
        self.word_offset.get()
    }

    pub fn length(&self) -> u32 {
        self.length.get()
    }

    /// 区域内的字节偏移
    pub fn byte_offset(&self) -> u64 {
        self.word_offset() as u64 * 4
    }

    /// 重新拼接的调用者缓冲区地址
    pub fn caller_addr(&self) -> u64 {
        ((self.addr_hi.get() as u64) << 32) | self.addr_lo.get() as u64
    }

    /// 请求是否完全落在 `size` 字节的区域内
    pub fn fits(&self, size: usize) -> bool {
        span_fits(self.word_offset(), self.length() as u64, size)
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// 从记录开头解析请求，多余字节被忽略
    pub fn parse(bytes: &[u8]) -> ResMemResult<Self> {
        Self::read_from_prefix(bytes)
            .map(|(req, _)| req)
            .map_err(|_| ResMemError::InvalidRecord(bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(RECORD_SIZE, 16);
        let req = BridgeRequest::new(0x10, 64, 0x0000_7FFF_DEAD_BEE0);
        assert_eq!(
            req.to_bytes(),
            [
                0x10, 0, 0, 0, //
                64, 0, 0, 0, //
                0xE0, 0xBE, 0xAD, 0xDE, //
                0xFF, 0x7F, 0, 0,
            ]
        );
    }

    #[test]
    fn test_caller_addr_reassembly() {
        for addr in [0u64, 0xFFFF_FFFF, 0x1_0000_0000, 0x0000_7FFF_DEAD_BEE0, u64::MAX] {
            let req = BridgeRequest::parse(&BridgeRequest::new(0, 4, addr).to_bytes()).unwrap();
            assert_eq!(req.caller_addr(), addr);
        }
    }

    #[test]
    fn test_parse_short_record() {
        assert_eq!(
            BridgeRequest::parse(&[0u8; 15]),
            Err(ResMemError::InvalidRecord(15))
        );
        let mut long = [0u8; 20];
        long[..16].copy_from_slice(&BridgeRequest::new(3, 8, 0x1000).to_bytes());
        let req = BridgeRequest::parse(&long).unwrap();
        assert_eq!(req.word_offset(), 3);
        assert_eq!(req.byte_offset(), 12);
        assert_eq!(req.length(), 8);
    }

    #[test]
    fn test_bounds_rule() {
        let size = 0x0100_0000;
        assert!(BridgeRequest::new(0, size as u32, 0).fits(size));
        assert!(BridgeRequest::new(0x3F_FFFF, 4, 0).fits(size));
        assert!(!BridgeRequest::new(0x3F_FFFF, 5, 0).fits(size));
        assert!(!BridgeRequest::new(u32::MAX, u32::MAX, 0).fits(size));
        assert!(!BridgeRequest::new(0, size as u32 + 1, 0).fits(size));
        assert!(span_fits(0x3F_FFFF, 4, size));
    }
}
