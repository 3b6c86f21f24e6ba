use crate::core::{
    CodecCapabilities, CoreError, DecodeError, DecodedFrame, EncodedPacket, PixelFormat, Result,
    VideoCodec, VideoTrackInfo,
};
use crate::pipeline::decoder::{CodecDecoder, DecodeResult, DrainCallback};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct DecoderStats {
    decoded_frames: u64,
    flushes: u32,
    resets: u32,
}

/// 测试探针 - 注入一次性解码错误、观测解码器行为
///
/// 同一个句柄可以在工厂闭包里 clone 给多次构造的解码器共用
#[derive(Clone, Default)]
pub struct MockDecoderHandle {
    script: Arc<Mutex<VecDeque<DecodeError>>>,
    stats: Arc<Mutex<DecoderStats>>,
}

impl MockDecoderHandle {
    /// 注入一个一次性解码错误，下一次 decode_frame 返回它
    pub fn inject_error(&self, error: DecodeError) {
        self.script.lock().push_back(error);
    }

    /// 已产出的帧数
    pub fn decoded_frames(&self) -> u64 {
        self.stats.lock().decoded_frames
    }

    /// flush 被调用的次数
    pub fn flushes(&self) -> u32 {
        self.stats.lock().flushes
    }

    /// reset 被调用的次数
    pub fn resets(&self) -> u32 {
        self.stats.lock().resets
    }
}

/// 可编排的内存解码器 - 测试与整机联调使用
///
/// 解码时按轨道尺寸生成 RGBA 帧并回写包的时间戳
pub struct MockCodecDecoder {
    codecs: Vec<VideoCodec>,
    codec: VideoCodec,
    track: VideoTrackInfo,
    hw_accel: bool,
    max_width: u32,
    max_height: u32,
    fail_initialize: bool,
    fail_reset: bool,
    last_error: DecodeError,
    handle: MockDecoderHandle,
}

impl MockCodecDecoder {
    pub fn new() -> Self {
        Self {
            codecs: vec![
                VideoCodec::H265Hevc,
                VideoCodec::Av1,
                VideoCodec::Vp9,
                VideoCodec::Mpeg4Part2,
                VideoCodec::ProRes,
            ],
            codec: VideoCodec::Unknown,
            track: VideoTrackInfo::default(),
            hw_accel: false,
            max_width: 3840,
            max_height: 2160,
            fail_initialize: false,
            fail_reset: false,
            last_error: DecodeError::None,
            handle: MockDecoderHandle::default(),
        }
    }

    /// 共用外部探针（错误脚本与统计走同一份状态）
    pub fn with_handle(handle: MockDecoderHandle) -> Self {
        Self {
            handle,
            ..Self::new()
        }
    }

    /// 变体：限定支持的编码集合
    pub fn with_codecs(mut self, codecs: Vec<VideoCodec>) -> Self {
        self.codecs = codecs;
        self
    }

    /// 变体：声明的最大解码宽度（区分不同注册的能力）
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    /// 变体：initialize 必定失败
    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// 变体：reset 必定失败
    pub fn failing_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    /// 获取测试探针
    pub fn handle(&self) -> MockDecoderHandle {
        self.handle.clone()
    }
}

impl Default for MockCodecDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecDecoder for MockCodecDecoder {
    fn initialize(&mut self, codec: VideoCodec, track: &VideoTrackInfo) -> Result<()> {
        if self.fail_initialize {
            return Err(CoreError::Other("初始化失败（测试编排）".to_string()));
        }
        self.codec = codec;
        self.track = track.clone();
        self.last_error = DecodeError::None;
        Ok(())
    }

    fn decode_frame(&mut self, packet: &EncodedPacket) -> DecodeResult {
        if let Some(error) = self.handle.script.lock().pop_front() {
            self.last_error = error;
            return DecodeResult { error, frame: None };
        }
        self.last_error = DecodeError::None;

        if packet.data.is_empty() {
            // 空包不产出帧
            return DecodeResult::default();
        }

        self.handle.stats.lock().decoded_frames += 1;
        let stride = self.track.width * 4;
        let frame = DecodedFrame {
            data: vec![0u8; (stride * self.track.height) as usize],
            width: self.track.width,
            height: self.track.height,
            stride,
            format: PixelFormat::Rgba8888,
            timing: packet.timing,
            hdr: self.track.hdr,
        };
        DecodeResult {
            error: DecodeError::None,
            frame: Some(frame),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.handle.stats.lock().flushes += 1;
        Ok(())
    }

    fn drain(&mut self, _callback: DrainCallback<'_>) {
        // 内存解码器没有积压帧，无帧可排空
    }

    fn reset(&mut self) -> Result<()> {
        self.handle.stats.lock().resets += 1;
        if self.fail_reset {
            self.last_error = DecodeError::ResetFailed;
            return Err(CoreError::Other("重置失败（测试编排）".to_string()));
        }
        self.codec = VideoCodec::Unknown;
        self.track = VideoTrackInfo::default();
        Ok(())
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            codec: self.codec,
            max_width: self.max_width,
            max_height: self.max_height,
            hardware_accelerated: self.hw_accel,
            hdr_support: matches!(self.codec, VideoCodec::H265Hevc | VideoCodec::Av1),
            drm_support: false,
        }
    }

    fn last_error(&self) -> DecodeError {
        self.last_error
    }

    fn set_hardware_acceleration(&mut self, enabled: bool) {
        self.hw_accel = enabled;
    }

    fn supports(&self, codec: VideoCodec) -> bool {
        self.codecs.contains(&codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameTiming;

    fn packet(pts: i64) -> EncodedPacket {
        EncodedPacket {
            data: vec![0u8; 64],
            timing: FrameTiming {
                pts,
                dts: pts,
                duration_us: 41_708,
            },
            track_id: 1,
            is_keyframe: true,
        }
    }

    #[test]
    fn test_decode_echoes_packet_timing() {
        let mut decoder = MockCodecDecoder::new();
        let track = VideoTrackInfo {
            codec: VideoCodec::H265Hevc,
            width: 64,
            height: 32,
            ..Default::default()
        };
        decoder.initialize(VideoCodec::H265Hevc, &track).unwrap();

        let result = decoder.decode_frame(&packet(42));
        assert_eq!(result.error, DecodeError::None);
        let frame = result.frame.unwrap();
        assert_eq!(frame.timing.pts, 42);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.stride, 64 * 4);
        assert_eq!(frame.data.len(), (64 * 4 * 32) as usize);
    }

    #[test]
    fn test_injected_error_is_one_shot() {
        let mut decoder = MockCodecDecoder::new();
        decoder
            .initialize(VideoCodec::Vp9, &VideoTrackInfo { codec: VideoCodec::Vp9, width: 16, height: 16, ..Default::default() })
            .unwrap();

        decoder.handle().inject_error(DecodeError::CorruptFrame);
        let result = decoder.decode_frame(&packet(0));
        assert_eq!(result.error, DecodeError::CorruptFrame);
        assert!(result.frame.is_none());
        assert_eq!(decoder.last_error(), DecodeError::CorruptFrame);

        let result = decoder.decode_frame(&packet(1));
        assert_eq!(result.error, DecodeError::None);
        assert!(result.frame.is_some());
    }

    #[test]
    fn test_empty_packet_produces_no_frame() {
        let mut decoder = MockCodecDecoder::new();
        decoder
            .initialize(VideoCodec::Av1, &VideoTrackInfo::default())
            .unwrap();
        let result = decoder.decode_frame(&EncodedPacket::default());
        assert_eq!(result.error, DecodeError::None);
        assert!(result.frame.is_none());
    }

    #[test]
    fn test_supports_restriction() {
        let decoder = MockCodecDecoder::new().with_codecs(vec![VideoCodec::Av1]);
        assert!(decoder.supports(VideoCodec::Av1));
        assert!(!decoder.supports(VideoCodec::H265Hevc));
    }
}
