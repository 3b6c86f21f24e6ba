use crate::core::{ColorPrimaries, DecodedFrame, HdrMetadata, Result, TransferCharacteristics};
use crate::pipeline::sink::{PresentCallback, PresentationSink};
use parking_lot::Mutex;

/// 送显记录器 - 记录送显帧的 PTS 与 HDR 配置，立即回调完成
#[derive(Default)]
pub struct MockPresentationSink {
    presented: Mutex<Vec<i64>>,
    color_space: Mutex<Option<(ColorPrimaries, TransferCharacteristics)>>,
    hdr: Mutex<Option<HdrMetadata>>,
}

impl MockPresentationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已送显帧的 PTS 列表（送显顺序）
    pub fn presented_pts(&self) -> Vec<i64> {
        self.presented.lock().clone()
    }

    /// 已送显帧数
    pub fn presented_count(&self) -> usize {
        self.presented.lock().len()
    }

    /// 最近设置的输出色彩空间
    pub fn color_space(&self) -> Option<(ColorPrimaries, TransferCharacteristics)> {
        *self.color_space.lock()
    }

    /// 最近设置的 HDR 元数据
    pub fn hdr_metadata(&self) -> Option<HdrMetadata> {
        *self.hdr.lock()
    }
}

impl PresentationSink for MockPresentationSink {
    fn submit_frame(&self, frame: &DecodedFrame, on_present: PresentCallback) -> Result<()> {
        self.presented.lock().push(frame.timing.pts);
        on_present(Ok(()));
        Ok(())
    }

    fn set_output_color_space(
        &self,
        primaries: ColorPrimaries,
        transfer: TransferCharacteristics,
    ) -> Result<()> {
        *self.color_space.lock() = Some((primaries, transfer));
        Ok(())
    }

    fn set_hdr_metadata(&self, metadata: &HdrMetadata) -> Result<()> {
        *self.hdr.lock() = Some(*metadata);
        Ok(())
    }
}
