use crate::core::{
    AudioCodec, AudioTrackInfo, ColorPrimaries, ContainerFormat, CoreError, EncodedPacket,
    FrameTiming, HdrMetadata, MatrixCoefficients, Result, TrackMetadata, TrackType,
    TransferCharacteristics, VideoCodec, VideoTrackInfo,
};
use crate::pipeline::parser::ContainerParser;
use crossbeam::queue::SegQueue;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;

/// 造一个视频包（测试用）
pub fn video_packet(pts_us: i64, is_keyframe: bool) -> EncodedPacket {
    EncodedPacket {
        data: vec![0u8; 256],
        timing: FrameTiming {
            pts: pts_us,
            dts: pts_us,
            duration_us: 41_708, // 约 24fps
        },
        track_id: 1,
        is_keyframe,
    }
}

#[derive(Default)]
struct ProbeState {
    open_calls: u32,
    last_seek_us: Option<i64>,
}

/// 测试探针 - 解析器移交给容器服务后仍可注包与观测
#[derive(Clone)]
pub struct MockParserHandle {
    packets: Arc<SegQueue<EncodedPacket>>,
    probe: Arc<Mutex<ProbeState>>,
}

impl MockParserHandle {
    /// 注入一个数据包（任意线程）
    pub fn inject_packet(&self, packet: EncodedPacket) {
        self.packets.push(packet);
    }

    /// 未读出的包数量
    pub fn pending_packets(&self) -> usize {
        self.packets.len()
    }

    /// 最近一次 seek 的目标位置
    pub fn last_seek_us(&self) -> Option<i64> {
        self.probe.lock().last_seek_us
    }

    /// open_container 被调用的次数
    pub fn open_calls(&self) -> u32 {
        self.probe.lock().open_calls
    }
}

/// 内存容器解析器 - 测试与整机联调使用
///
/// open 时生成固定的视频/音频轨道元数据（H.265 1080p24 + AAC 双声道，
/// 时长 2 分钟），数据包通过探针从任意线程注入
pub struct MockContainerParser {
    packets: Arc<SegQueue<EncodedPacket>>,
    probe: Arc<Mutex<ProbeState>>,
    tracks: Vec<TrackMetadata>,
    duration_us: i64,
    open: bool,
    with_video: bool,
    hdr_video: bool,
    fail_open: bool,
    fail_seek: bool,
    locator: String,
}

impl MockContainerParser {
    pub fn new() -> Self {
        Self {
            packets: Arc::new(SegQueue::new()),
            probe: Arc::new(Mutex::new(ProbeState::default())),
            tracks: Vec::new(),
            duration_us: 0,
            open: false,
            with_video: true,
            hdr_video: false,
            fail_open: false,
            fail_seek: false,
            locator: String::new(),
        }
    }

    /// 变体：不带视频轨（只有音频）
    pub fn without_video(mut self) -> Self {
        self.with_video = false;
        self
    }

    /// 变体：视频轨带 HDR10 元数据
    pub fn with_hdr(mut self) -> Self {
        self.hdr_video = true;
        self
    }

    /// 变体：open 必定失败（模拟资源不可达）
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// 变体：seek 必定失败
    pub fn failing_seek(mut self) -> Self {
        self.fail_seek = true;
        self
    }

    /// 获取测试探针
    pub fn handle(&self) -> MockParserHandle {
        MockParserHandle {
            packets: self.packets.clone(),
            probe: self.probe.clone(),
        }
    }

    fn video_track(&self) -> TrackMetadata {
        let hdr = if self.hdr_video {
            HdrMetadata {
                color_primaries: ColorPrimaries::Bt2020,
                transfer: TransferCharacteristics::Smpte2084,
                matrix: MatrixCoefficients::Bt2020Ncl,
                is_hdr10: true,
                ..HdrMetadata::default()
            }
        } else {
            HdrMetadata::default()
        };
        TrackMetadata {
            track_type: TrackType::Video,
            track_id: 1,
            duration_us: self.duration_us,
            video: VideoTrackInfo {
                codec: VideoCodec::H265Hevc,
                width: 1920,
                height: 1080,
                frame_rate_num: 24,
                frame_rate_den: 1,
                bit_depth: if self.hdr_video { 10 } else { 8 },
                hdr,
            },
            ..TrackMetadata::default()
        }
    }

    fn audio_track(&self) -> TrackMetadata {
        TrackMetadata {
            track_type: TrackType::Audio,
            track_id: 2,
            duration_us: self.duration_us,
            audio: AudioTrackInfo {
                codec: AudioCodec::Aac,
                sample_rate: 48_000,
                channels: 2,
                bit_depth: 16,
            },
            ..TrackMetadata::default()
        }
    }
}

impl Default for MockContainerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerParser for MockContainerParser {
    fn open_container(&mut self, locator: &str) -> Result<()> {
        self.probe.lock().open_calls += 1;
        if self.fail_open {
            return Err(CoreError::Io(format!("无法打开资源: {}", locator)));
        }
        self.locator = locator.to_string();
        self.duration_us = 120_000_000; // 2 分钟
        self.tracks.clear();
        if self.with_video {
            let video = self.video_track();
            self.tracks.push(video);
        }
        let audio = self.audio_track();
        self.tracks.push(audio);
        self.open = true;
        Ok(())
    }

    fn read_packet(&mut self) -> Result<EncodedPacket> {
        if !self.open {
            return Err(CoreError::Timeout);
        }
        self.packets.pop().ok_or(CoreError::Timeout)
    }

    fn seek(&mut self, timestamp_us: i64) -> Result<()> {
        if self.fail_seek {
            return Err(CoreError::Io("seek 失败".to_string()));
        }
        // seek 与清空未读包一并完成，之后不会再读到旧包
        let mut cleared = 0usize;
        while self.packets.pop().is_some() {
            cleared += 1;
        }
        self.probe.lock().last_seek_us = Some(timestamp_us);
        debug!("Mock 解析器 seek 到 {}us，清空 {} 个未读包", timestamp_us, cleared);
        Ok(())
    }

    fn seek_to_byte(&mut self, _offset: u64) -> Result<()> {
        Ok(())
    }

    fn tracks(&self) -> Vec<TrackMetadata> {
        self.tracks.clone()
    }

    fn duration_us(&self) -> i64 {
        self.duration_us
    }

    fn close_container(&mut self) -> Result<()> {
        self.open = false;
        self.tracks.clear();
        while self.packets.pop().is_some() {}
        Ok(())
    }

    fn supports(&self, format: ContainerFormat) -> bool {
        matches!(
            format,
            ContainerFormat::Mp4 | ContainerFormat::Mov | ContainerFormat::Mkv
        )
    }

    fn description(&self) -> String {
        format!("MockContainerParser: {}", self.locator)
    }
}
