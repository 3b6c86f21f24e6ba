// 可注入的驱动实现
//
// 解析器 / 解码器 / 送显端都是构造时注入的能力接口，
// 这里提供内存实现，供测试与整机联调使用

pub mod mock_decoder;
pub mod mock_parser;
pub mod mock_sink;

pub use mock_decoder::{MockCodecDecoder, MockDecoderHandle};
pub use mock_parser::{video_packet, MockContainerParser, MockParserHandle};
pub use mock_sink::MockPresentationSink;

use crate::core::VideoCodec;
use crate::pipeline::decoder::CodecDecoder;
use crate::pipeline::registry::{CodecRegistration, CodecRegistry};
use log::error;

/// 注册默认的软件解码器集合
pub fn install_mock_codecs(registry: &CodecRegistry) {
    for (codec, name) in [
        (VideoCodec::H265Hevc, "HEVC"),
        (VideoCodec::Av1, "AV1"),
        (VideoCodec::Vp9, "VP9"),
        (VideoCodec::Mpeg4Part2, "MPEG-4"),
        (VideoCodec::ProRes, "ProRes"),
    ] {
        let result = registry.register_codec(
            codec,
            Box::new(|| Box::new(MockCodecDecoder::new()) as Box<dyn CodecDecoder>),
            CodecRegistration {
                codec,
                name: name.to_string(),
                hardware_preferred: false,
                priority: 0,
            },
        );
        if let Err(e) = result {
            error!("注册 {} 失败: {}", name, e);
        }
    }
}
