//! # Modal 模块
//!
//! 模态窗口契约与数据模型。
//!
//! ## 设计说明
//!
//! - 模态构成纯 LIFO 栈，没有返回 / 前进语义
//! - 在已有模态之上打开新模态时，旧模态被休眠（Deactive）而不是销毁，
//!   除非指定 [`ModalOptions::keep_front_modal`]
//! - 打开前回调的错误在管理器边界被吞掉：记录日志、状态置为
//!   `OpenError`，调用方通过返回的句柄检查状态而不是捕获错误

pub mod manager;

pub use manager::{ModalLoader, ModalManager};

use std::cell::RefCell;
use std::future::ready;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::BoxFuture;
use crate::payload::Payload;

/// 模态的唯一标识（由管理器的自增计数器分配）
pub type ModalId = u64;

/// 模态的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalState {
    /// 待机中
    Idle,
    /// 已打开
    Opened,
    /// 已关闭
    Closed,
    /// 被移除（跳过关闭回调）
    Removed,
    /// 休眠中（被上层模态覆盖）
    Deactive,
    /// 打开失败
    OpenError,
}

/// 资源加载状态通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalLoadState {
    /// 开始加载
    Begin,
    /// 加载结束
    End,
}

/// 打开模态时的选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalOptions {
    /// 打开时保持最前面的模态不被休眠
    pub keep_front_modal: bool,
}

impl ModalOptions {
    /// 保持最前模态的选项
    pub fn keep_front() -> Self {
        Self {
            keep_front_modal: true,
        }
    }
}

/// 模态窗口契约
pub trait ModalWindow {
    /// 打开流程开始时由管理器调用，传入自身句柄
    ///
    /// 需要自行关闭的模态在此保存句柄。
    fn on_attached(&self, _handle: ModalHandle) {}

    /// 激活状态变更通知
    fn on_set_active(&self, _active: bool) {}

    /// 打开前回调
    ///
    /// 返回错误不会向调用方传播：管理器记录日志、强制关闭该模态
    /// 并把状态置为 [`ModalState::OpenError`]。
    fn on_pre_open(&self, _args: Payload) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(ready(Ok(())))
    }

    /// 激活后回调（从休眠中恢复时也会调用）
    fn on_open(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    /// 关闭前回调（被上层模态休眠时也会调用）
    fn on_pre_close(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    /// 关闭后回调
    fn on_closed(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }
}

/// 管理器内部的模态记录
pub(crate) struct ModalRecord {
    pub(crate) id: ModalId,
    pub(crate) options: ModalOptions,
    pub(crate) args: Payload,
    pub(crate) content: Rc<dyn ModalWindow>,
    state_tx: watch::Sender<ModalState>,
    state_rx: watch::Receiver<ModalState>,
    pub(crate) close_param: RefCell<Payload>,
}

impl ModalRecord {
    pub(crate) fn new(
        id: ModalId,
        options: ModalOptions,
        args: Payload,
        content: Rc<dyn ModalWindow>,
    ) -> Rc<Self> {
        let (state_tx, state_rx) = watch::channel(ModalState::Idle);
        Rc::new(Self {
            id,
            options,
            args,
            content,
            state_tx,
            state_rx,
            close_param: RefCell::new(Payload::none()),
        })
    }

    pub(crate) fn state(&self) -> ModalState {
        *self.state_rx.borrow()
    }

    pub(crate) fn set_state(&self, state: ModalState) {
        let _ = self.state_tx.send(state);
    }

    pub(crate) fn state_watch(&self) -> watch::Receiver<ModalState> {
        self.state_rx.clone()
    }
}

/// 句柄回连管理器的内部接口
pub(crate) trait ModalHost {
    fn close_record(&self, record: Rc<ModalRecord>) -> BoxFuture<'_, Payload>;
}

/// 打开的模态的句柄
///
/// `open_modal` 返回给调用方，同时通过 [`ModalWindow::on_attached`]
/// 下发给内容自身。打开失败时同样返回句柄，
/// 通过 [`ModalHandle::state`] 判断结果。
#[derive(Clone)]
pub struct ModalHandle {
    pub(crate) record: Rc<ModalRecord>,
    pub(crate) host: Weak<dyn ModalHost>,
}

impl ModalHandle {
    /// 模态 Id
    pub fn id(&self) -> ModalId {
        self.record.id
    }

    /// 当前状态
    pub fn state(&self) -> ModalState {
        self.record.state()
    }

    /// 打开时的选项
    pub fn options(&self) -> ModalOptions {
        self.record.options
    }

    /// 打开时的参数
    pub fn args(&self) -> Payload {
        self.record.args.clone()
    }

    /// 模态内容
    pub fn content(&self) -> Rc<dyn ModalWindow> {
        self.record.content.clone()
    }

    /// 设置关闭时返回给等待方的参数
    pub fn set_close_param(&self, param: Payload) {
        *self.record.close_param.borrow_mut() = param;
    }

    /// 关闭该模态，返回关闭参数
    pub async fn close(&self) -> Payload {
        match self.host.upgrade() {
            Some(host) => host.close_record(self.record.clone()).await,
            None => self.record.close_param.borrow().clone(),
        }
    }

    /// 等待该模态关闭（Closed 或 Removed），返回关闭参数
    pub async fn wait_close(&self) -> Payload {
        let mut state = self.record.state_watch();
        let _ = state
            .wait_for(|s| matches!(s, ModalState::Closed | ModalState::Removed))
            .await;
        self.record.close_param.borrow().clone()
    }
}
