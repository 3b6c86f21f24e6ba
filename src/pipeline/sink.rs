use crate::core::{ColorPrimaries, DecodedFrame, HdrMetadata, Result, TransferCharacteristics};

/// 帧送显完成回调
pub type PresentCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// 送显接口
///
/// 解码帧经色彩转换 / HDR 处理后交给合成器输出，具体实现在显示子系统。
/// 管线提交帧时只借出引用，送显方不得在调用返回后继续持有帧数据
pub trait PresentationSink: Send + Sync {
    /// 提交一帧待显示，完成后触发回调
    fn submit_frame(&self, frame: &DecodedFrame, on_present: PresentCallback) -> Result<()>;

    /// 设置输出色彩空间（HDR 直通等场景）
    fn set_output_color_space(
        &self,
        primaries: ColorPrimaries,
        transfer: TransferCharacteristics,
    ) -> Result<()>;

    /// 设置 HDMI 输出的 HDR 元数据
    fn set_hdr_metadata(&self, metadata: &HdrMetadata) -> Result<()>;
}
