use crate::core::{
    CoreError, DecodeError, PipelineState, PipelineStatus, Result, TrackMetadata,
};
use crate::pipeline::container::ContainerService;
use crate::pipeline::decoder::CodecDecoder;
use crate::pipeline::events::{EventDispatcher, EventSender, StatusCallback, TelemetryCallback};
use crate::pipeline::parser::ContainerParser;
use crate::pipeline::registry::CodecRegistry;
use crate::pipeline::sink::PresentationSink;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::json;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn log_ctx() -> String {
    format!("[pid:{}-tid:{:?}]", process::id(), thread::current().id())
}

/// 进入 Buffering 前容忍的连续空读次数（单次读空不算缓冲，避免状态抖动）
const EMPTY_READS_BEFORE_BUFFERING: u32 = 5;
/// 无数据时的重试退避区间
const BACKOFF_MIN: Duration = Duration::from_millis(5);
const BACKOFF_MAX: Duration = Duration::from_millis(100);
/// 非播放状态下循环的空转间隔
const IDLE_POLL: Duration = Duration::from_millis(10);

/// 管线会话状态 - 控制线程与解码循环共用的单一互斥边界
///
/// 不变量：decoder 存在当且仅当 state 为
/// Playing / Paused / Seeking / Buffering；Error 状态不持有会话
struct PipelineInner {
    state: PipelineState,
    container: ContainerService,
    decoder: Option<Box<dyn CodecDecoder>>,
    video_track: Option<TrackMetadata>,
    current_pts: i64,   // 最近送显帧的 PTS（微秒）
    empty_reads: u32,   // 连续读空计数
}

struct PipelineShared {
    inner: Mutex<PipelineInner>,
    running: AtomicBool,
    events: EventSender,
    sink: Arc<dyn PresentationSink>,
}

impl PipelineShared {
    fn set_state(&self, inner: &mut PipelineInner, state: PipelineState, message: &str) {
        inner.state = state;
        self.events.status(state, message);
    }

    /// 进入 Error 状态：释放解码器、关闭容器，恢复需要重新 open
    fn fail_session(&self, inner: &mut PipelineInner, message: &str) {
        error!("{} ❌ {}", log_ctx(), message);
        if let Some(mut decoder) = inner.decoder.take() {
            if let Err(e) = decoder.reset() {
                warn!("{} ⚠️ 出错清理时重置解码器失败: {}", log_ctx(), e);
            }
        }
        if let Err(e) = inner.container.close() {
            warn!("{} ⚠️ 出错清理时关闭容器失败: {}", log_ctx(), e);
        }
        inner.video_track = None;
        self.set_state(inner, PipelineState::Error, message);
    }
}

/// 流播放管线 - 播放状态机与解码/送显循环的编排者
///
/// 同一时刻至多持有一个会话（一个打开的容器 + 一个活跃解码器）。
/// open / play / pause / seek / stop 可以从控制线程（如输入事件线程）调用，
/// 与解码循环通过同一把锁串行化；状态/遥测回调经分发线程异步送达观察者
pub struct StreamPipeline {
    shared: Arc<PipelineShared>,
    registry: Arc<CodecRegistry>,
    dispatcher: EventDispatcher,
    decode_thread: Option<JoinHandle<()>>,
}

impl StreamPipeline {
    /// 创建管线
    ///
    /// 容器解析器、解码器注册表、送显接口全部由外部注入，
    /// mock 与硬件实现在构造处选择
    pub fn new(
        parser: Box<dyn ContainerParser>,
        registry: Arc<CodecRegistry>,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        info!("{} 🎮 创建播放管线", log_ctx());
        let dispatcher = EventDispatcher::new();
        let shared = Arc::new(PipelineShared {
            inner: Mutex::new(PipelineInner {
                state: PipelineState::Idle,
                container: ContainerService::new(parser),
                decoder: None,
                video_track: None,
                current_pts: 0,
                empty_reads: 0,
            }),
            running: AtomicBool::new(false),
            events: dispatcher.sender(),
            sink,
        });
        Self {
            shared,
            registry,
            dispatcher,
            decode_thread: None,
        }
    }

    /// 打开内容定位符并准备会话
    ///
    /// 仅允许从 Idle / Error 发起，其余状态返回 Busy（已有会话在进行）。
    /// 成功后进入 Paused 等待 play()；任何一步失败都终止在 Error
    pub fn open(&mut self, locator: &str) -> Result<()> {
        let result = {
            let mut inner = self.shared.inner.lock();
            if inner.state != PipelineState::Idle && inner.state != PipelineState::Error {
                return Err(CoreError::Busy(format!(
                    "当前状态 {} 不允许 open",
                    inner.state.as_str()
                )));
            }
            self.open_locked(&mut inner, locator)
        };
        if result.is_ok() {
            self.ensure_decode_thread();
        }
        result
    }

    fn open_locked(&self, inner: &mut PipelineInner, locator: &str) -> Result<()> {
        info!("{} 📂 打开媒体: {}", log_ctx(), locator);
        self.shared.set_state(inner, PipelineState::Opening, "Opening...");

        if let Err(e) = inner.container.open(locator) {
            self.shared.fail_session(inner, &format!("打开容器失败: {}", e));
            return Err(e);
        }

        let Some(track) = inner.container.video_tracks().into_iter().next() else {
            self.shared.fail_session(inner, "容器中没有视频轨");
            return Err(CoreError::NotFound("视频轨".to_string()));
        };

        let Some(decoder) = self.registry.create_decoder(&track.video, None) else {
            self.shared
                .fail_session(inner, &format!("编码 {} 没有可用解码器", track.video.codec.as_str()));
            return Err(CoreError::NotSupported(format!(
                "编码 {}",
                track.video.codec.as_str()
            )));
        };

        // HDR 内容：把色彩空间与 HDR 元数据透传给送显端
        if track.video.hdr.is_hdr() {
            info!("{} 🌈 HDR 内容，配置送显端色彩空间", log_ctx());
            if let Err(e) = self
                .shared
                .sink
                .set_output_color_space(track.video.hdr.color_primaries, track.video.hdr.transfer)
            {
                warn!("{} ⚠️ 设置输出色彩空间失败: {}", log_ctx(), e);
            }
            if let Err(e) = self.shared.sink.set_hdr_metadata(&track.video.hdr) {
                warn!("{} ⚠️ 设置 HDR 元数据失败: {}", log_ctx(), e);
            }
        }

        inner.video_track = Some(track);
        inner.decoder = Some(decoder);
        inner.current_pts = 0;
        inner.empty_reads = 0;
        self.shared.set_state(inner, PipelineState::Paused, "Ready");
        Ok(())
    }

    /// 开始播放。仅允许从 Paused 发起，其余状态（含 Playing）返回 Busy
    pub fn play(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != PipelineState::Paused {
            return Err(CoreError::Busy(format!(
                "当前状态 {} 不允许 play",
                inner.state.as_str()
            )));
        }
        info!("{} 🎬 播放", log_ctx());
        self.shared.set_state(&mut inner, PipelineState::Playing, "Playing");
        Ok(())
    }

    /// 暂停播放
    ///
    /// 需要存在活跃会话：Idle / Opening / Error 下返回 Busy；
    /// 已处于 Paused 时重复调用视为成功
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            PipelineState::Idle | PipelineState::Opening | PipelineState::Error => {
                Err(CoreError::Busy(format!(
                    "当前状态 {} 不允许 pause",
                    inner.state.as_str()
                )))
            }
            PipelineState::Paused => Ok(()),
            _ => {
                info!("{} ⏸️ 暂停", log_ctx());
                self.shared.set_state(&mut inner, PipelineState::Paused, "Paused");
                Ok(())
            }
        }
    }

    /// Seek 到指定时间戳（微秒）
    ///
    /// 成功后进入 Playing；当前 PTS 先设为请求位置，
    /// 下一个送显帧到达时再校准为实际位置。
    /// seek 之前读出但尚未送显的包一律丢弃，不会乱序送显
    pub fn seek(&self, timestamp_us: i64) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            PipelineState::Idle | PipelineState::Opening | PipelineState::Error => {
                return Err(CoreError::Busy(format!(
                    "当前状态 {} 不允许 seek",
                    inner.state.as_str()
                )));
            }
            _ => {}
        }

        info!("{} 🎯 Seek 到 {} us", log_ctx(), timestamp_us);
        self.shared.set_state(&mut inner, PipelineState::Seeking, "Seeking...");

        if let Err(e) = inner.container.seek(timestamp_us) {
            let message = format!("Seek 失败: {}", e);
            self.shared.fail_session(&mut inner, &message);
            return Err(match e {
                CoreError::Io(msg) => CoreError::Io(msg),
                other => CoreError::Io(other.to_string()),
            });
        }

        // 丢弃解码器内未输出的帧，避免 seek 后送显旧画面
        if let Some(decoder) = inner.decoder.as_mut() {
            if let Err(e) = decoder.flush() {
                warn!("{} ⚠️ Seek 后解码器 flush 失败: {}", log_ctx(), e);
            }
        }

        inner.current_pts = timestamp_us;
        inner.empty_reads = 0;
        self.shared.set_state(&mut inner, PipelineState::Playing, "Playing");
        Ok(())
    }

    /// 停止并清理会话。任何状态下都可调用，可重复调用
    ///
    /// 解码器重置失败只记录，不阻塞清理
    pub fn stop(&mut self) -> Result<()> {
        info!("{} ⏹️ 停止播放", log_ctx());
        self.shared.running.store(false, Ordering::SeqCst);
        {
            let mut inner = self.shared.inner.lock();
            if let Some(mut decoder) = inner.decoder.take() {
                if let Err(e) = decoder.reset() {
                    warn!("{} ⚠️ 停止时重置解码器失败: {}", log_ctx(), e);
                }
            }
            if let Err(e) = inner.container.close() {
                warn!("{} ⚠️ 停止时关闭容器失败: {}", log_ctx(), e);
            }
            inner.video_track = None;
            inner.current_pts = 0;
            inner.empty_reads = 0;
            if inner.state != PipelineState::Idle {
                self.shared.set_state(&mut inner, PipelineState::Idle, "Stopped");
            }
        }
        if let Some(handle) = self.decode_thread.take() {
            let _ = handle.join();
            info!("{} ✅ 解码循环线程已结束", log_ctx());
        }
        Ok(())
    }

    /// 当前管线状态
    pub fn state(&self) -> PipelineState {
        self.shared.inner.lock().state
    }

    /// 当前播放位置（微秒，最近送显帧的 PTS；seek 后为请求位置）
    pub fn current_pts(&self) -> i64 {
        self.shared.inner.lock().current_pts
    }

    /// 状态快照
    pub fn status(&self) -> PipelineStatus {
        let inner = self.shared.inner.lock();
        PipelineStatus {
            state: inner.state,
            current_pts: inner.current_pts,
            duration_us: inner.container.duration_us(),
            video_track: inner.video_track.clone(),
        }
    }

    /// 设置状态回调（每次状态迁移触发，在分发线程执行）
    pub fn set_status_callback(&self, cb: StatusCallback) {
        self.dispatcher.set_status_callback(cb);
    }

    /// 设置遥测回调（解码错误、缓冲等事件）
    pub fn set_telemetry_callback(&self, cb: TelemetryCallback) {
        self.dispatcher.set_telemetry_callback(cb);
    }

    /// 等待已产生的回调全部分发完成
    pub fn flush_events(&self) {
        self.dispatcher.flush();
    }

    fn ensure_decode_thread(&mut self) {
        if self.decode_thread.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        self.decode_thread = Some(thread::spawn(move || decode_loop(shared)));
    }
}

impl Drop for StreamPipeline {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.decode_thread.take() {
            let _ = handle.join();
        }
    }
}

/// 解码/送显循环
///
/// 会话的唯一包消费者、唯一送显生产者。
/// 每一步在锁内完成"读包 → 解码 → 送显"，步与步之间释放锁，
/// 因此并发的 stop()/seek() 在下一步边界生效，
/// seek 之前读出的包不会再被送显
fn decode_loop(shared: Arc<PipelineShared>) {
    info!("{} 🎞️ 解码循环线程启动", log_ctx());
    let mut backoff = BACKOFF_MIN;

    while shared.running.load(Ordering::SeqCst) {
        let wait = {
            let mut inner = shared.inner.lock();
            match inner.state {
                PipelineState::Playing | PipelineState::Buffering => {
                    pump_once(&shared, &mut inner, &mut backoff)
                }
                _ => Some(IDLE_POLL),
            }
        };
        if let Some(wait) = wait {
            thread::sleep(wait);
        }
    }

    info!("{} 🛑 解码循环线程退出", log_ctx());
}

/// 执行一步读包 → 解码 → 送显
///
/// 返回 Some(d) 表示这一步之后需要等待 d 再继续
fn pump_once(
    shared: &PipelineShared,
    inner: &mut PipelineInner,
    backoff: &mut Duration,
) -> Option<Duration> {
    let packet = match inner.container.read_packet() {
        Ok(packet) => packet,
        Err(CoreError::Timeout) => {
            // 暂无数据：退避重试，连续读空才进入 Buffering
            inner.empty_reads += 1;
            if inner.state == PipelineState::Playing
                && inner.empty_reads >= EMPTY_READS_BEFORE_BUFFERING
            {
                debug!("{} 连续 {} 次读空，进入缓冲", log_ctx(), inner.empty_reads);
                shared.set_state(inner, PipelineState::Buffering, "Buffering");
                shared.events.telemetry(
                    "buffering",
                    json!({ "reason": "no_packet", "pts": inner.current_pts }).to_string(),
                );
            }
            let wait = *backoff;
            *backoff = (*backoff * 2).min(BACKOFF_MAX);
            return Some(wait);
        }
        Err(e) => {
            shared
                .events
                .telemetry("container_error", json!({ "error": e.to_string() }).to_string());
            shared.fail_session(inner, &format!("读取数据包失败: {}", e));
            return Some(IDLE_POLL);
        }
    };

    inner.empty_reads = 0;
    *backoff = BACKOFF_MIN;

    // 数据恢复，退出缓冲
    if inner.state == PipelineState::Buffering {
        info!("{} ✅ 缓冲结束，恢复播放", log_ctx());
        shared.set_state(inner, PipelineState::Playing, "Playing");
    }

    let result = match inner.decoder.as_mut() {
        Some(decoder) => decoder.decode_frame(&packet),
        None => return Some(IDLE_POLL),
    };

    if result.error != DecodeError::None {
        let details = json!({
            "error": result.error.as_str(),
            "track": packet.track_id,
            "pts": packet.timing.pts,
        })
        .to_string();

        if result.error.is_fatal() {
            shared.events.telemetry("decode_error", details);
            shared.fail_session(
                inner,
                &format!("致命解码错误: {}", result.error.as_str()),
            );
            return Some(IDLE_POLL);
        }

        match result.error {
            DecodeError::BufferUnderrun => {
                shared.events.telemetry("buffering", details);
                if inner.state == PipelineState::Playing {
                    shared.set_state(inner, PipelineState::Buffering, "Buffering");
                }
                let wait = *backoff;
                *backoff = (*backoff * 2).min(BACKOFF_MAX);
                return Some(wait);
            }
            _ => {
                // 坏帧：上报后跳过这个包，继续播放
                shared.events.telemetry("decode_error", details);
                return None;
            }
        }
    }

    if let Some(frame) = result.frame {
        let pts = frame.timing.pts;
        let events = shared.events.clone();
        match shared.sink.submit_frame(
            &frame,
            Box::new(move |presented| {
                if let Err(e) = presented {
                    events.telemetry(
                        "present_error",
                        json!({ "error": e.to_string() }).to_string(),
                    );
                }
            }),
        ) {
            Ok(()) => {
                inner.current_pts = pts;
            }
            Err(e) => {
                warn!("{} ⚠️ 送显失败: {}", log_ctx(), e);
                shared.events.telemetry(
                    "present_error",
                    json!({ "error": e.to_string(), "pts": pts }).to_string(),
                );
            }
        }
    }
    None
}
