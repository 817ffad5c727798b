//! 设备驱动层

pub mod dev;
