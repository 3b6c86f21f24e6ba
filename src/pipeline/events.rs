use crate::core::PipelineState;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::warn;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// 状态回调 - 每次状态迁移时携带新状态与可读消息
pub type StatusCallback = Box<dyn Fn(PipelineState, &str) + Send>;

/// 遥测回调 - 事件名 + 详情（JSON 字符串）
pub type TelemetryCallback = Box<dyn Fn(&str, &str) + Send>;

/// 回调队列深度 - 有界，慢观察者不能无限堆积事件
const EVENT_QUEUE_DEPTH: usize = 64;

enum Event {
    Status(PipelineState, String),
    Telemetry(String, String),
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct Callbacks {
    status: Option<StatusCallback>,
    telemetry: Option<TelemetryCallback>,
}

/// 事件发送端 - 管线各线程共享
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// 上报状态迁移
    ///
    /// 状态事件不可丢失且必须保序，队列满时阻塞等待分发线程消费
    pub fn status(&self, state: PipelineState, message: &str) {
        let _ = self.tx.send(Event::Status(state, message.to_string()));
    }

    /// 上报遥测事件
    ///
    /// 队列满时丢弃本条并计数，绝不阻塞调用线程
    pub fn telemetry(&self, event: &str, details: String) {
        match self.tx.try_send(Event::Telemetry(event.to_string(), details)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                warn!("⚠️ 遥测队列已满，丢弃事件 {} (累计丢弃 {})", event, dropped);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// 累计丢弃的遥测事件数
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// 事件分发器
///
/// 回调在独立的分发线程中执行，观察者耗时不会拖慢解码循环；
/// 观察者仍应保持轻量（入队转发等），阻塞过久会让有界队列涨满
pub struct EventDispatcher {
    sender: EventSender,
    callbacks: Arc<Mutex<Callbacks>>,
    worker: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<Event>(EVENT_QUEUE_DEPTH);
        let callbacks = Arc::new(Mutex::new(Callbacks::default()));
        let worker_callbacks = callbacks.clone();
        let worker = thread::spawn(move || Self::dispatch_loop(rx, worker_callbacks));
        Self {
            sender: EventSender {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            callbacks,
            worker: Some(worker),
        }
    }

    fn dispatch_loop(rx: Receiver<Event>, callbacks: Arc<Mutex<Callbacks>>) {
        for event in rx.iter() {
            match event {
                Event::Status(state, message) => {
                    let guard = callbacks.lock();
                    if let Some(cb) = guard.status.as_ref() {
                        cb(state, &message);
                    }
                }
                Event::Telemetry(name, details) => {
                    let guard = callbacks.lock();
                    if let Some(cb) = guard.telemetry.as_ref() {
                        cb(&name, &details);
                    }
                }
                Event::Flush(ack) => {
                    let _ = ack.send(());
                }
                Event::Shutdown => break,
            }
        }
    }

    /// 获取事件发送端（可随意 clone 到其他线程）
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// 设置状态回调
    pub fn set_status_callback(&self, cb: StatusCallback) {
        self.callbacks.lock().status = Some(cb);
    }

    /// 设置遥测回调
    pub fn set_telemetry_callback(&self, cb: TelemetryCallback) {
        self.callbacks.lock().telemetry = Some(cb);
    }

    /// 等待队列中已有的事件全部分发完成
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if self.sender.tx.send(Event::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        let _ = self.sender.tx.send(Event::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
