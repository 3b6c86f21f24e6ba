use crate::core::{
    CodecCapabilities, DecodeError, DecodedFrame, EncodedPacket, Result, VideoCodec,
    VideoTrackInfo,
};

/// 单次解码结果
#[derive(Debug, Default)]
pub struct DecodeResult {
    pub error: DecodeError,             // None 表示本次无错误
    pub frame: Option<DecodedFrame>,    // 有可送显帧时为 Some
}

/// drain 时逐帧回调
pub type DrainCallback<'a> = &'a mut dyn FnMut(DecodedFrame);

/// 解码器抽象接口
///
/// 抽象 H.265 / AV1 / VP9 / MPEG-4 / ProRes 解码实现，
/// 是否走硬件加速由具体实现决定
pub trait CodecDecoder: Send {
    /// 按轨道参数初始化
    fn initialize(&mut self, codec: VideoCodec, track: &VideoTrackInfo) -> Result<()>;

    /// 解码一个数据包
    ///
    /// 一个包不一定产出一帧（B 帧重排、参考帧积累等），
    /// frame 为 None 且无错误时表示解码器还在积累数据
    fn decode_frame(&mut self, packet: &EncodedPacket) -> DecodeResult;

    /// 清空内部缓冲，丢弃未输出的帧（Seek 后使用）
    fn flush(&mut self) -> Result<()>;

    /// 排空解码器内剩余的帧（流结束时使用）
    fn drain(&mut self, callback: DrainCallback<'_>);

    /// 重置到初始状态
    fn reset(&mut self) -> Result<()>;

    /// 解码能力
    fn capabilities(&self) -> CodecCapabilities;

    /// 最近一次解码错误
    fn last_error(&self) -> DecodeError;

    /// 开关硬件加速
    fn set_hardware_acceleration(&mut self, enabled: bool);

    /// 是否支持指定编码
    fn supports(&self, codec: VideoCodec) -> bool;
}
