// 机顶盒流媒体播放核心
//
// 负责把内容定位符变成送往显示端的解码帧序列：
// 容器解封装 → 解码器选择 → 播放状态机与解码/送显循环

pub mod core;
pub mod drivers;
pub mod pipeline;

pub use crate::core::{CoreError, PipelineState, Result};
pub use crate::pipeline::{CodecRegistry, ContainerService, StreamPipeline};
