use crate::core::{CodecCapabilities, CoreError, Result, VideoCodec, VideoTrackInfo};
use crate::pipeline::decoder::CodecDecoder;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// 解码器注册信息 - 注册后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct CodecRegistration {
    pub codec: VideoCodec,
    pub name: String,
    pub hardware_preferred: bool,
    pub priority: i32,
}

/// 解码器构造工厂
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn CodecDecoder> + Send + Sync>;

struct Entry {
    info: CodecRegistration,
    factory: DecoderFactory,
}

/// 解码器注册表 - 按编码格式维护有序的解码器工厂列表
///
/// 同一编码允许注册多个实现（例如软件实现和硬件实现各一个），
/// create_decoder 按硬件偏好 + 优先级选出最合适的一个，
/// 管线侧不需要任何编码相关的特判
pub struct CodecRegistry {
    factories: Mutex<HashMap<VideoCodec, Vec<Entry>>>,
    prefer_hardware: AtomicBool,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            factories: Mutex::new(HashMap::new()),
            prefer_hardware: AtomicBool::new(true),
        }
    }

    /// 注册解码器工厂
    ///
    /// 同一编码可以注册多次；注册信息不合法时返回 InvalidParam
    pub fn register_codec(
        &self,
        codec: VideoCodec,
        factory: DecoderFactory,
        info: CodecRegistration,
    ) -> Result<()> {
        if codec == VideoCodec::Unknown || info.codec == VideoCodec::Unknown {
            return Err(CoreError::InvalidParam("注册编码不能为 Unknown".to_string()));
        }
        if info.name.is_empty() {
            return Err(CoreError::InvalidParam("注册名称不能为空".to_string()));
        }

        let mut factories = self.factories.lock();
        info!(
            "📋 注册解码器: {} ({}, 硬件优先: {}, 优先级: {})",
            info.name,
            codec.as_str(),
            info.hardware_preferred,
            info.priority
        );
        factories.entry(codec).or_default().push(Entry { info, factory });
        Ok(())
    }

    /// 已注册的全部解码器信息
    pub fn registered_codecs(&self) -> Vec<CodecRegistration> {
        let factories = self.factories.lock();
        factories
            .values()
            .flat_map(|list| list.iter().map(|entry| entry.info.clone()))
            .collect()
    }

    /// 查询编码能力
    ///
    /// 实例化第一个注册的工厂读取能力；调用方不应假设该实例会被复用于解码
    pub fn capabilities(&self, codec: VideoCodec) -> CodecCapabilities {
        let factories = self.factories.lock();
        match factories.get(&codec).and_then(|list| list.first()) {
            Some(entry) => (entry.factory)().capabilities(),
            None => CodecCapabilities::default(),
        }
    }

    /// 是否存在至少一个注册
    pub fn is_supported(&self, codec: VideoCodec) -> bool {
        self.factories
            .lock()
            .get(&codec)
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    /// 设置注册表级硬件加速偏好（create_decoder 未显式传入时生效）
    pub fn set_hardware_acceleration_preferred(&self, preferred: bool) {
        self.prefer_hardware.store(preferred, Ordering::SeqCst);
    }

    /// 为指定视频轨创建最合适的解码器
    ///
    /// 选择算法：
    /// 1. 取出该编码的全部注册
    /// 2. 稳定排序：硬件标志与偏好一致的排前，其次按优先级降序，
    ///    平局保持注册顺序
    /// 3. 依次构造候选，要求 supports() 通过且 initialize() 成功，
    ///    取第一个成功者
    ///
    /// 硬件偏好只是排序键，不是过滤条件：偏好硬件但只有软件注册时
    /// 仍会返回软件解码器。全部候选失败时返回 None（可恢复）
    pub fn create_decoder(
        &self,
        track: &VideoTrackInfo,
        prefer_hardware: Option<bool>,
    ) -> Option<Box<dyn CodecDecoder>> {
        let prefer =
            prefer_hardware.unwrap_or_else(|| self.prefer_hardware.load(Ordering::SeqCst));
        let factories = self.factories.lock();
        let list = factories.get(&track.codec)?;

        let mut order: Vec<usize> = (0..list.len()).collect();
        order.sort_by_key(|&i| {
            let info = &list[i].info;
            (info.hardware_preferred != prefer, Reverse(info.priority))
        });

        for &i in &order {
            let entry = &list[i];
            let mut decoder = (entry.factory)();
            if !decoder.supports(track.codec) {
                debug!("候选 {} 不支持 {}，跳过", entry.info.name, track.codec.as_str());
                continue;
            }
            decoder.set_hardware_acceleration(prefer);
            match decoder.initialize(track.codec, track) {
                Ok(()) => {
                    info!(
                        "✅ 选中解码器: {} ({}x{}, 硬件偏好: {})",
                        entry.info.name, track.width, track.height, prefer
                    );
                    return Some(decoder);
                }
                Err(e) => {
                    warn!("候选 {} 初始化失败: {}，尝试下一个", entry.info.name, e);
                }
            }
        }

        warn!("⚠️ 编码 {} 没有可用的解码器", track.codec.as_str());
        None
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::MockCodecDecoder;

    fn registration(codec: VideoCodec, name: &str, hw: bool, priority: i32) -> CodecRegistration {
        CodecRegistration {
            codec,
            name: name.to_string(),
            hardware_preferred: hw,
            priority,
        }
    }

    fn factory_with_width(width: u32) -> DecoderFactory {
        Box::new(move || {
            Box::new(MockCodecDecoder::new().with_max_width(width)) as Box<dyn CodecDecoder>
        })
    }

    fn failing_factory() -> DecoderFactory {
        Box::new(|| Box::new(MockCodecDecoder::new().failing_initialize()) as Box<dyn CodecDecoder>)
    }

    fn hevc_track() -> VideoTrackInfo {
        VideoTrackInfo {
            codec: VideoCodec::H265Hevc,
            width: 1920,
            height: 1080,
            frame_rate_num: 24,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_supported() {
        let registry = CodecRegistry::new();
        assert!(!registry.is_supported(VideoCodec::H265Hevc));

        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(3840),
                registration(VideoCodec::H265Hevc, "HEVC", false, 0),
            )
            .unwrap();

        assert!(registry.is_supported(VideoCodec::H265Hevc));
        assert!(!registry.is_supported(VideoCodec::Vp9));
    }

    #[test]
    fn test_register_rejects_invalid_info() {
        let registry = CodecRegistry::new();

        let err = registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(3840),
                registration(VideoCodec::H265Hevc, "", false, 0),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidParam(_)));

        let err = registry
            .register_codec(
                VideoCodec::Unknown,
                factory_with_width(3840),
                registration(VideoCodec::Unknown, "X", false, 0),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidParam(_)));

        assert!(registry.registered_codecs().is_empty());
    }

    #[test]
    fn test_prefer_hardware_picks_hardware_registration() {
        let registry = CodecRegistry::new();
        // 硬件注册优先级 0，软件注册优先级 10：偏好硬件时硬件排前
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(4000),
                registration(VideoCodec::H265Hevc, "hevc-hw", true, 0),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2000),
                registration(VideoCodec::H265Hevc, "hevc-sw", false, 10),
            )
            .unwrap();

        let decoder = registry.create_decoder(&hevc_track(), Some(true)).unwrap();
        assert_eq!(decoder.capabilities().max_width, 4000);
        assert!(decoder.capabilities().hardware_accelerated);
    }

    #[test]
    fn test_prefer_hardware_falls_back_to_software() {
        let registry = CodecRegistry::new();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2000),
                registration(VideoCodec::H265Hevc, "hevc-sw", false, 0),
            )
            .unwrap();

        // 偏好只是排序键，只有软件注册时仍应成功
        let decoder = registry.create_decoder(&hevc_track(), Some(true));
        assert!(decoder.is_some());
    }

    #[test]
    fn test_priority_orders_candidates() {
        let registry = CodecRegistry::new();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2000),
                registration(VideoCodec::H265Hevc, "low", false, 5),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(4000),
                registration(VideoCodec::H265Hevc, "high", false, 10),
            )
            .unwrap();

        let decoder = registry.create_decoder(&hevc_track(), Some(false)).unwrap();
        assert_eq!(decoder.capabilities().max_width, 4000);
    }

    #[test]
    fn test_priority_tie_preserves_registration_order() {
        let registry = CodecRegistry::new();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(1111),
                registration(VideoCodec::H265Hevc, "first", false, 0),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2222),
                registration(VideoCodec::H265Hevc, "second", false, 0),
            )
            .unwrap();

        let decoder = registry.create_decoder(&hevc_track(), Some(false)).unwrap();
        assert_eq!(decoder.capabilities().max_width, 1111);
    }

    #[test]
    fn test_failed_initialize_falls_through_to_next() {
        let registry = CodecRegistry::new();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                failing_factory(),
                registration(VideoCodec::H265Hevc, "broken", false, 10),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2000),
                registration(VideoCodec::H265Hevc, "working", false, 0),
            )
            .unwrap();

        let decoder = registry.create_decoder(&hevc_track(), Some(false)).unwrap();
        assert_eq!(decoder.capabilities().max_width, 2000);
    }

    #[test]
    fn test_all_candidates_failing_returns_none() {
        let registry = CodecRegistry::new();
        assert!(registry.create_decoder(&hevc_track(), None).is_none());

        registry
            .register_codec(
                VideoCodec::H265Hevc,
                failing_factory(),
                registration(VideoCodec::H265Hevc, "broken", false, 0),
            )
            .unwrap();
        assert!(registry.create_decoder(&hevc_track(), None).is_none());
    }

    #[test]
    fn test_per_call_preference_overrides_default() {
        let registry = CodecRegistry::new();
        registry.set_hardware_acceleration_preferred(false);
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(4000),
                registration(VideoCodec::H265Hevc, "hevc-hw", true, 0),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::H265Hevc,
                factory_with_width(2000),
                registration(VideoCodec::H265Hevc, "hevc-sw", false, 0),
            )
            .unwrap();

        // 注册表默认偏好软件
        let decoder = registry.create_decoder(&hevc_track(), None).unwrap();
        assert_eq!(decoder.capabilities().max_width, 2000);

        // 按调用覆盖为硬件
        let decoder = registry.create_decoder(&hevc_track(), Some(true)).unwrap();
        assert_eq!(decoder.capabilities().max_width, 4000);
    }

    #[test]
    fn test_registered_codecs_roundtrip() {
        let registry = CodecRegistry::new();
        let expected = [("a", 1), ("b", 2), ("c", 3)];
        for (name, priority) in expected {
            registry
                .register_codec(
                    VideoCodec::Vp9,
                    factory_with_width(2000),
                    registration(VideoCodec::Vp9, name, false, priority),
                )
                .unwrap();
        }

        let mut registered: Vec<(String, i32)> = registry
            .registered_codecs()
            .into_iter()
            .filter(|info| info.codec == VideoCodec::Vp9)
            .map(|info| (info.name, info.priority))
            .collect();
        registered.sort();

        assert_eq!(
            registered,
            expected
                .iter()
                .map(|(name, priority)| (name.to_string(), *priority))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_capabilities_uses_first_registration() {
        let registry = CodecRegistry::new();
        assert_eq!(registry.capabilities(VideoCodec::Av1), CodecCapabilities::default());

        registry
            .register_codec(
                VideoCodec::Av1,
                factory_with_width(1234),
                registration(VideoCodec::Av1, "av1-a", false, 0),
            )
            .unwrap();
        registry
            .register_codec(
                VideoCodec::Av1,
                factory_with_width(5678),
                registration(VideoCodec::Av1, "av1-b", false, 99),
            )
            .unwrap();

        assert_eq!(registry.capabilities(VideoCodec::Av1).max_width, 1234);
    }
}
