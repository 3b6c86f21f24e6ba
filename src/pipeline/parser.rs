use crate::core::{ContainerFormat, CoreError, EncodedPacket, Result, TrackMetadata};

/// 容器解析器抽象接口
///
/// 定义所有解封装实现必须提供的方法。
/// 不同来源（mock、平台硬件解封装器）都可以实现这个接口，
/// 由容器服务在构造时注入
pub trait ContainerParser: Send {
    /// 打开容器（本地路径或流地址），填充轨道元数据与时长
    fn open_container(&mut self, locator: &str) -> Result<()>;

    /// 读取下一个数据包（容器序，跨所有轨道）
    ///
    /// 返回：
    /// - Ok(packet): 成功读取一个包，所有权交给调用方
    /// - Err(CoreError::Timeout): 当前暂无数据（不一定是流结束）
    fn read_packet(&mut self) -> Result<EncodedPacket>;

    /// Seek 到指定时间戳（微秒），落点为不晚于目标的关键帧
    ///
    /// 实现必须在 seek 的同时丢弃已缓冲未读出的包，
    /// 保证之后不会再返回 seek 前的旧包
    fn seek(&mut self, timestamp_us: i64) -> Result<()>;

    /// Seek 到字节偏移（渐进式/流式场景）
    fn seek_to_byte(&mut self, _offset: u64) -> Result<()> {
        Err(CoreError::NotSupported("字节级 seek".to_string()))
    }

    /// 当前容器的全部轨道元数据
    fn tracks(&self) -> Vec<TrackMetadata>;

    /// 容器总时长（微秒）；直播/流式发现场景允许返回 0
    fn duration_us(&self) -> i64;

    /// 关闭容器并释放资源
    fn close_container(&mut self) -> Result<()>;

    /// 是否具备指定容器格式的解析能力
    fn supports(&self, format: ContainerFormat) -> bool;

    /// 描述信息（用于调试）
    fn description(&self) -> String;
}
