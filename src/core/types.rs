use serde::{Deserialize, Serialize};

/// 视频编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoCodec {
    #[default]
    Unknown,
    H265Hevc,
    Av1,
    Vp9,
    Mpeg4Part2,
    ProRes,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::Unknown => "unknown",
            VideoCodec::H265Hevc => "hevc",
            VideoCodec::Av1 => "av1",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Mpeg4Part2 => "mpeg4",
            VideoCodec::ProRes => "prores",
        }
    }
}

/// 音频编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioCodec {
    #[default]
    Unknown,
    Aac,
    Ac3,
    Eac3,
    Mp3,
    Pcm,
}

/// 容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    #[default]
    Unknown,
    Mp4,
    Mov,
    Mkv,
}

impl ContainerFormat {
    /// 根据定位符后缀识别容器格式
    ///
    /// 仅做精确后缀匹配，不读取内容；无法识别的后缀返回 Unknown
    pub fn from_locator(locator: &str) -> Self {
        if locator.ends_with(".mp4") {
            ContainerFormat::Mp4
        } else if locator.ends_with(".mov") {
            ContainerFormat::Mov
        } else if locator.ends_with(".mkv") || locator.ends_with(".webm") {
            ContainerFormat::Mkv
        } else {
            ContainerFormat::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::Unknown => "unknown",
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Mkv => "mkv",
        }
    }
}

/// 色彩原色 (ITU-T H.273)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorPrimaries {
    #[default]
    Unspecified,
    Bt709,
    Bt2020,
    Smpte240m,
    P3D65,
}

/// 传递特性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferCharacteristics {
    #[default]
    Unspecified,
    Bt709,
    Smpte2084,   // HDR10 PQ
    AribStdB67,  // HLG
}

/// 矩阵系数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatrixCoefficients {
    #[default]
    Unspecified,
    Bt709,
    Bt2020Ncl,
}

/// 主控显示色彩体积 (SMPTE ST 2086)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MasteringDisplayInfo {
    pub display_primaries_x: [f32; 3],
    pub display_primaries_y: [f32; 3],
    pub white_point_x: f32,
    pub white_point_y: f32,
    pub max_display_mastering_luminance: f32,
    pub min_display_mastering_luminance: f32,
}

/// 内容光照信息 (MaxCLL / MaxFALL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentLightLevel {
    pub max_content_light_level: u16,
    pub max_frame_average_light_level: u16,
}

/// HDR 元数据集合
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HdrMetadata {
    pub color_primaries: ColorPrimaries,
    pub transfer: TransferCharacteristics,
    pub matrix: MatrixCoefficients,
    pub mastering_display: MasteringDisplayInfo,
    pub content_light: ContentLightLevel,
    pub is_hdr10: bool,
    pub is_hlg: bool,
}

impl HdrMetadata {
    /// 是否为 HDR 内容
    pub fn is_hdr(&self) -> bool {
        self.is_hdr10 || self.is_hlg
    }
}

/// 轨道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackType {
    #[default]
    Video,
    Audio,
    Subtitle,
}

/// 视频轨参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackInfo {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub bit_depth: u32,
    pub hdr: HdrMetadata,
}

impl Default for VideoTrackInfo {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Unknown,
            width: 0,
            height: 0,
            frame_rate_num: 0,
            frame_rate_den: 1,
            bit_depth: 8,
            hdr: HdrMetadata::default(),
        }
    }
}

/// 音频轨参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_depth: u32,
}

/// 字幕轨参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubtitleTrackInfo {
    pub language: String,
    pub is_forced: bool,
}

/// 轨道元数据
///
/// 打开容器后由容器服务持有，对外总是复制返回；关闭容器后失效
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_type: TrackType,
    pub track_id: u32,
    pub language: String,
    pub duration_us: i64,       // 轨道时长（微秒）
    pub bitrate: i64,
    pub video: VideoTrackInfo,
    pub audio: AudioTrackInfo,
    pub subtitle: SubtitleTrackInfo,
}

/// 帧时间戳信息（微秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameTiming {
    pub pts: i64,           // 显示时间戳
    pub dts: i64,           // 解码时间戳
    pub duration_us: i64,   // 持续时长
}

/// 解封装输出的编码数据包
///
/// 所有权随 read_packet 交给调用方，容器服务不缓存已读出的包
#[derive(Debug, Clone, Default)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    pub timing: FrameTiming,
    pub track_id: u32,
    pub is_keyframe: bool,
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Unknown,
    Yuv420p,
    Nv12,
    P010,       // 10bit HDR
    Rgba8888,
    Bgra8888,
}

/// 解码后的视频帧
///
/// 帧缓冲由解码器负责，送显完成后管线不得再持有
#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub timing: FrameTiming,
    pub hdr: HdrMetadata,
}

/// 解码器能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecCapabilities {
    pub codec: VideoCodec,
    pub max_width: u32,
    pub max_height: u32,
    pub hardware_accelerated: bool,
    pub hdr_support: bool,
    pub drm_support: bool,
}

/// 解码错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecodeError {
    #[default]
    None,
    CorruptFrame,
    Unsupported,
    BufferUnderrun,
    FormatMismatch,
    DrmFailed,
    FlushFailed,
    ResetFailed,
}

impl DecodeError {
    /// 是否为致命错误
    ///
    /// 致命错误要求 stop() + open() 才能恢复；
    /// 非致命错误（坏帧、缓冲不足）由管线内部消化
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::Unsupported
                | DecodeError::FormatMismatch
                | DecodeError::DrmFailed
                | DecodeError::ResetFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeError::None => "none",
            DecodeError::CorruptFrame => "corrupt_frame",
            DecodeError::Unsupported => "unsupported",
            DecodeError::BufferUnderrun => "buffer_underrun",
            DecodeError::FormatMismatch => "format_mismatch",
            DecodeError::DrmFailed => "drm_failed",
            DecodeError::FlushFailed => "flush_failed",
            DecodeError::ResetFailed => "reset_failed",
        }
    }
}

/// 管线播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Opening,
    Playing,
    Paused,
    Seeking,
    Buffering,
    Error,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Opening => "opening",
            PipelineState::Playing => "playing",
            PipelineState::Paused => "paused",
            PipelineState::Seeking => "seeking",
            PipelineState::Buffering => "buffering",
            PipelineState::Error => "error",
        }
    }
}

/// 管线状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub current_pts: i64,       // 当前播放位置（微秒）
    pub duration_us: i64,       // 总时长（微秒）
    pub video_track: Option<TrackMetadata>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            current_pts: 0,
            duration_us: 0,
            video_track: None,
        }
    }
}
