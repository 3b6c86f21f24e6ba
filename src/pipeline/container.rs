use crate::core::{ContainerFormat, CoreError, EncodedPacket, Result, TrackMetadata, TrackType};
use crate::pipeline::parser::ContainerParser;
use log::{info, warn};

/// 容器服务 - 把内容定位符映射为轨道/数据包流
///
/// 负责格式识别、轨道元数据的持有与投影；
/// 实际的字节级解析委托给注入的解析器
pub struct ContainerService {
    parser: Box<dyn ContainerParser>,
    format: ContainerFormat,
    tracks: Vec<TrackMetadata>,
    duration_us: i64,
    open: bool,
}

impl ContainerService {
    pub fn new(parser: Box<dyn ContainerParser>) -> Self {
        Self {
            parser,
            format: ContainerFormat::Unknown,
            tracks: Vec::new(),
            duration_us: 0,
            open: false,
        }
    }

    /// 打开内容定位符
    ///
    /// 先按后缀识别格式，解析器没有对应格式能力时在任何 IO 之前
    /// 返回 NotSupported；解析器打开失败时原样传出其错误
    pub fn open(&mut self, locator: &str) -> Result<()> {
        self.format = ContainerFormat::from_locator(locator);
        if self.format == ContainerFormat::Unknown || !self.parser.supports(self.format) {
            warn!("⚠️ 不支持的容器格式: {} ({})", self.format.as_str(), locator);
            return Err(CoreError::NotSupported(format!(
                "容器格式 {}",
                self.format.as_str()
            )));
        }

        self.parser.open_container(locator)?;
        self.tracks = self.parser.tracks();
        self.duration_us = self.parser.duration_us();
        self.open = true;
        info!(
            "📦 容器已打开: {} [{}] 轨道数 {} 时长 {}us",
            locator,
            self.format.as_str(),
            self.tracks.len(),
            self.duration_us
        );
        Ok(())
    }

    /// 读取下一个数据包（容器序）；暂无数据时返回 Timeout
    pub fn read_packet(&mut self) -> Result<EncodedPacket> {
        if !self.open {
            return Err(CoreError::Busy("容器未打开".to_string()));
        }
        self.parser.read_packet()
    }

    /// Seek 到指定时间戳（微秒）
    ///
    /// 解析器保证 seek 与丢弃未读包一并完成，之后不会再读到旧包
    pub fn seek(&mut self, timestamp_us: i64) -> Result<()> {
        if !self.open {
            return Err(CoreError::Busy("容器未打开".to_string()));
        }
        self.parser.seek(timestamp_us)
    }

    /// 全部轨道元数据（复制返回；未打开时为空）
    pub fn tracks(&self) -> Vec<TrackMetadata> {
        self.tracks.clone()
    }

    /// 视频轨投影
    pub fn video_tracks(&self) -> Vec<TrackMetadata> {
        self.tracks_of(TrackType::Video)
    }

    /// 音频轨投影
    pub fn audio_tracks(&self) -> Vec<TrackMetadata> {
        self.tracks_of(TrackType::Audio)
    }

    /// 字幕轨投影
    pub fn subtitle_tracks(&self) -> Vec<TrackMetadata> {
        self.tracks_of(TrackType::Subtitle)
    }

    fn tracks_of(&self, track_type: TrackType) -> Vec<TrackMetadata> {
        self.tracks
            .iter()
            .filter(|track| track.track_type == track_type)
            .cloned()
            .collect()
    }

    /// 容器总时长（微秒）
    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    /// 最近一次识别出的容器格式
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 关闭容器并清空轨道状态；可重复调用
    pub fn close(&mut self) -> Result<()> {
        let result = if self.open {
            let closed = self.parser.close_container();
            info!("📦 容器已关闭: {}", self.parser.description());
            closed
        } else {
            Ok(())
        };
        self.open = false;
        self.tracks.clear();
        self.duration_us = 0;
        self.format = ContainerFormat::Unknown;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{video_packet, MockContainerParser};

    fn open_service() -> (ContainerService, crate::drivers::MockParserHandle) {
        let parser = MockContainerParser::new();
        let handle = parser.handle();
        let mut service = ContainerService::new(Box::new(parser));
        service.open("movie.mp4").unwrap();
        (service, handle)
    }

    #[test]
    fn test_unknown_suffix_rejected_before_io() {
        let parser = MockContainerParser::new().failing_open();
        let handle = parser.handle();
        let mut service = ContainerService::new(Box::new(parser));

        let err = service.open("movie.avi").unwrap_err();
        assert!(matches!(err, CoreError::NotSupported(_)));
        // 后缀不认识时不应触碰解析器
        assert_eq!(handle.open_calls(), 0);
        assert!(!service.is_open());
    }

    #[test]
    fn test_open_failure_propagates() {
        let parser = MockContainerParser::new().failing_open();
        let mut service = ContainerService::new(Box::new(parser));

        let err = service.open("movie.mp4").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(!service.is_open());
        assert!(service.tracks().is_empty());
    }

    #[test]
    fn test_tracks_empty_before_open() {
        let service = ContainerService::new(Box::new(MockContainerParser::new()));
        assert!(service.tracks().is_empty());
        assert!(service.video_tracks().is_empty());
        assert!(service.audio_tracks().is_empty());
        assert!(service.subtitle_tracks().is_empty());
        assert_eq!(service.duration_us(), 0);
    }

    #[test]
    fn test_open_populates_tracks_and_projections() {
        let (service, _handle) = open_service();
        assert!(service.is_open());
        assert_eq!(service.format(), ContainerFormat::Mp4);
        assert_eq!(service.tracks().len(), 2);
        assert_eq!(service.video_tracks().len(), 1);
        assert_eq!(service.audio_tracks().len(), 1);
        assert!(service.subtitle_tracks().is_empty());
        assert_eq!(service.duration_us(), 120_000_000);
        assert_eq!(service.video_tracks()[0].track_id, 1);
    }

    #[test]
    fn test_read_packet_in_injection_order() {
        let (mut service, handle) = open_service();
        handle.inject_packet(video_packet(0, true));
        handle.inject_packet(video_packet(41_708, false));

        assert_eq!(service.read_packet().unwrap().timing.pts, 0);
        assert_eq!(service.read_packet().unwrap().timing.pts, 41_708);
        assert_eq!(service.read_packet().unwrap_err(), CoreError::Timeout);
    }

    #[test]
    fn test_seek_invalidates_pending_packets() {
        let (mut service, handle) = open_service();
        handle.inject_packet(video_packet(0, true));
        handle.inject_packet(video_packet(41_708, false));

        service.seek(5_000_000).unwrap();
        assert_eq!(handle.last_seek_us(), Some(5_000_000));
        // seek 之前的旧包不允许再被读出
        assert_eq!(service.read_packet().unwrap_err(), CoreError::Timeout);
    }

    #[test]
    fn test_close_idempotent() {
        let (mut service, _handle) = open_service();
        service.close().unwrap();
        assert!(!service.is_open());
        assert!(service.tracks().is_empty());
        assert_eq!(service.format(), ContainerFormat::Unknown);

        // 重复关闭不报错
        service.close().unwrap();
        // 关闭后读包属于状态错误
        assert!(matches!(service.read_packet().unwrap_err(), CoreError::Busy(_)));
    }
}
