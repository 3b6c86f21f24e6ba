// 核心数据结构和类型定义

pub mod error;
pub mod types;

// 重新导出常用类型
pub use error::{CoreError, Result};
pub use types::*;
