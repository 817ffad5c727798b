//! 面向调用者的文件式接口

pub mod resmem;
