//! # ModalManager 模块
//!
//! LIFO 模态栈管理器。
//!
//! ## 执行模型
//!
//! 同时只允许一个打开流程：并发的 `open_modal` 经由独占闸门排队，
//! 后到者等待前一个完成。关闭不排队（与打开互不阻塞，
//! 打开失败的强制关闭正依赖这一点）。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, error};

use super::{
    ModalHandle, ModalHost, ModalId, ModalLoadState, ModalOptions, ModalRecord, ModalState,
    ModalWindow,
};
use crate::error::LoadError;
use crate::payload::Payload;
use crate::{BoxFuture, NavKey};

/// 模态资源加载契约
pub trait ModalLoader<K: NavKey> {
    /// 模态资源的解析（由具体画面实现，对管理器不透明）
    fn load_modal(&self, key: K) -> BoxFuture<'_, Result<Rc<dyn ModalWindow>, LoadError>>;

    /// 背景遮罩的激活状态变更
    fn set_backdrop(&self, _visible: bool) {}

    /// 资源加载状态通知
    fn on_loading(&self, _state: ModalLoadState) {}

    /// 最后一个模态关闭后的通知
    fn on_close_last_modal(&self) {}
}

struct ModalInner {
    next_id: ModalId,
    list: HashMap<ModalId, Rc<ModalRecord>>,
    stack: Vec<ModalId>,
}

struct ModalShared<K: NavKey> {
    loader: Rc<dyn ModalLoader<K>>,
    /// 打开闸门：同时只允许一个打开流程
    gate: Mutex<()>,
    inner: RefCell<ModalInner>,
}

impl<K: NavKey> ModalShared<K> {
    fn record(&self, id: ModalId) -> Option<Rc<ModalRecord>> {
        self.inner.borrow().list.get(&id).cloned()
    }

    fn top_record(&self) -> Option<Rc<ModalRecord>> {
        let inner = self.inner.borrow();
        inner.stack.last().and_then(|id| inner.list.get(id).cloned())
    }

    fn remove_record(&self, record: &Rc<ModalRecord>, change_state: bool) {
        if change_state {
            record.set_state(ModalState::Removed);
        }
        let mut inner = self.inner.borrow_mut();
        inner.list.remove(&record.id);
        inner.stack.retain(|id| *id != record.id);
    }

    /// 全部关闭时熄灭背景遮罩并通知宿主
    fn check_modal_list(&self) {
        if self.inner.borrow().list.is_empty() {
            self.loader.set_backdrop(false);
            self.loader.on_close_last_modal();
        }
    }

    async fn close_record_inner(&self, record: Rc<ModalRecord>) -> Payload {
        self.loader.on_loading(ModalLoadState::Begin);
        let is_top = self.inner.borrow().stack.last() == Some(&record.id);

        record.content.on_pre_close().await;
        self.remove_record(&record, false);

        // 关闭的是最上层时唤醒新的最上层
        if is_top && !record.options.keep_front_modal {
            if let Some(top) = self.top_record() {
                top.set_state(ModalState::Opened);
                top.content.on_set_active(true);
                top.content.on_open().await;
            }
        }

        self.check_modal_list();

        record.content.on_closed().await;
        self.loader.on_loading(ModalLoadState::End);
        record.set_state(ModalState::Closed);
        debug!(id = record.id, "模态已关闭");
        record.close_param.borrow().clone()
    }
}

impl<K: NavKey> ModalHost for ModalShared<K> {
    fn close_record(&self, record: Rc<ModalRecord>) -> BoxFuture<'_, Payload> {
        Box::pin(self.close_record_inner(record))
    }
}

/// LIFO 模态栈管理器
///
/// 句柄可廉价克隆，克隆共享同一内部状态。
pub struct ModalManager<K: NavKey> {
    shared: Rc<ModalShared<K>>,
}

impl<K: NavKey> Clone for ModalManager<K> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: NavKey> ModalManager<K> {
    /// 创建管理器
    pub fn new(loader: Rc<dyn ModalLoader<K>>) -> Self {
        Self {
            shared: Rc::new(ModalShared {
                loader,
                gate: Mutex::new(()),
                inner: RefCell::new(ModalInner {
                    next_id: 0,
                    list: HashMap::new(),
                    stack: Vec::new(),
                }),
            }),
        }
    }

    fn handle_for(&self, record: Rc<ModalRecord>) -> ModalHandle {
        let shared: Rc<dyn ModalHost> = self.shared.clone();
        let host: Weak<dyn ModalHost> = Rc::downgrade(&shared);
        ModalHandle { record, host }
    }

    /// 打开模态
    ///
    /// 打开前回调的错误在这里被吞掉（记录日志、状态置为 `OpenError`），
    /// 调用方通过返回句柄的状态判断结果；只有资源加载失败返回 `Err`。
    pub async fn open_modal(
        &self,
        key: K,
        args: Payload,
        options: ModalOptions,
    ) -> Result<ModalHandle, LoadError> {
        let shared = &self.shared;
        shared.loader.on_loading(ModalLoadState::Begin);

        // 同时只允许一个打开流程，后到者排队
        let _gate = shared.gate.lock().await;

        // 已有最前模态时先休眠（KeepFrontModal 则保留）
        if !options.keep_front_modal {
            if let Some(top) = shared.top_record() {
                top.content.on_pre_close().await;
                top.set_state(ModalState::Deactive);
                top.content.on_set_active(false);
            }
        }

        let content = match shared.loader.load_modal(key).await {
            Ok(content) => content,
            Err(e) => {
                error!(?key, error = %e, "模态资源加载失败");
                shared.loader.on_loading(ModalLoadState::End);
                return Err(e);
            }
        };

        let record = {
            let mut inner = shared.inner.borrow_mut();
            inner.next_id += 1;
            let record = ModalRecord::new(inner.next_id, options, args.clone(), content);
            inner.list.insert(record.id, record.clone());
            inner.stack.push(record.id);
            record
        };
        debug!(?key, id = record.id, "模态入栈");

        shared.loader.set_backdrop(true);

        let handle = self.handle_for(record.clone());
        record.content.on_attached(handle.clone());

        // 打开前回调的错误在此边界吞掉：强制关闭并置为 OpenError
        if let Err(e) = record.content.on_pre_open(args).await {
            error!(?key, id = record.id, error = %e, "模态打开前回调失败");
            shared.close_record_inner(record.clone()).await;
            record.set_state(ModalState::OpenError);
            shared.loader.on_loading(ModalLoadState::End);
            return Ok(handle);
        }

        record.content.on_set_active(true);
        record.content.on_open().await;

        shared.loader.on_loading(ModalLoadState::End);
        record.set_state(ModalState::Opened);
        Ok(handle)
    }

    /// 关闭指定模态，返回关闭参数
    pub async fn close_modal(&self, handle: &ModalHandle) -> Payload {
        self.shared.close_record_inner(handle.record.clone()).await
    }

    /// 关闭最上层的模态，返回其关闭参数
    pub async fn close_top_modal(&self) -> Option<Payload> {
        match self.shared.top_record() {
            Some(record) => Some(self.shared.close_record_inner(record).await),
            None => None,
        }
    }

    /// 取得指定 Id 的模态句柄
    pub fn get_modal(&self, id: ModalId) -> Option<ModalHandle> {
        self.shared.record(id).map(|record| self.handle_for(record))
    }

    /// 最上层的模态
    pub fn top_modal(&self) -> Option<ModalHandle> {
        self.shared.top_record().map(|record| self.handle_for(record))
    }

    /// 模态栈快照（自底向顶）
    pub fn modal_stack(&self) -> Vec<ModalId> {
        self.shared.inner.borrow().stack.clone()
    }

    /// 打开中的模态数
    pub fn modal_count(&self) -> usize {
        self.shared.inner.borrow().list.len()
    }

    /// 自顶向下移除模态，跳过最上层
    pub fn remove_top_modals_ignore_top(&self, should_remove: impl Fn(&ModalHandle) -> bool) {
        self.remove_top_modals(should_remove, 1);
    }

    /// 自顶向下移除模态，遇到第一个不满足条件的即停止
    ///
    /// 被移除的模态状态置为 `Removed`，不经过关闭回调。
    pub fn remove_top_modals(
        &self,
        should_remove: impl Fn(&ModalHandle) -> bool,
        ignore_count: usize,
    ) {
        let ids = self.modal_stack();
        let Some(start) = ids.len().checked_sub(1 + ignore_count) else {
            return;
        };
        for i in (0..=start).rev() {
            let Some(handle) = self.get_modal(ids[i]) else {
                break;
            };
            if should_remove(&handle) {
                self.shared.remove_record(&handle.record, true);
            } else {
                break;
            }
        }
        self.shared.check_modal_list();
    }

    /// 移除满足条件的所有模态
    pub fn remove_modals(&self, should_remove: impl Fn(&ModalHandle) -> bool) {
        let ids = self.modal_stack();
        for id in ids.into_iter().rev() {
            let Some(handle) = self.get_modal(id) else {
                continue;
            };
            if should_remove(&handle) {
                self.shared.remove_record(&handle.record, true);
            }
        }
        self.shared.check_modal_list();
    }

    /// 移除所有模态
    pub fn remove_all_modals(&self) {
        self.remove_modals(|_| true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum ModalKey {
        Message,
        Confirm,
    }

    /// 记录所有回调调用的测试模态
    struct TestModal {
        name: String,
        log: Rc<RefCell<Vec<String>>>,
        fail_pre_open: bool,
        handle: RefCell<Option<ModalHandle>>,
    }

    impl TestModal {
        fn new(name: &str, log: Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                name: name.to_string(),
                log,
                fail_pre_open: false,
                handle: RefCell::new(None),
            })
        }

        fn record(&self, hook: &str) {
            self.log.borrow_mut().push(format!("{}.{}", self.name, hook));
        }
    }

    impl ModalWindow for TestModal {
        fn on_attached(&self, handle: ModalHandle) {
            *self.handle.borrow_mut() = Some(handle);
        }

        fn on_set_active(&self, active: bool) {
            self.record(if active { "set_active.true" } else { "set_active.false" });
        }

        fn on_pre_open(&self, _args: Payload) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.record("pre_open");
                if self.fail_pre_open {
                    anyhow::bail!("预算不足");
                }
                Ok(())
            })
        }

        fn on_open(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.record("open");
            })
        }

        fn on_pre_close(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.record("pre_close");
            })
        }

        fn on_closed(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.record("closed");
            })
        }
    }

    struct TestModalLoader {
        log: Rc<RefCell<Vec<String>>>,
        prepared: RefCell<HashMap<ModalKey, Rc<dyn ModalWindow>>>,
        counter: std::cell::Cell<u32>,
    }

    impl TestModalLoader {
        fn new(log: Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                log,
                prepared: RefCell::new(HashMap::new()),
                counter: std::cell::Cell::new(0),
            })
        }

        fn prepare(&self, key: ModalKey, modal: Rc<dyn ModalWindow>) {
            self.prepared.borrow_mut().insert(key, modal);
        }
    }

    impl ModalLoader<ModalKey> for TestModalLoader {
        fn load_modal(&self, key: ModalKey) -> BoxFuture<'_, Result<Rc<dyn ModalWindow>, LoadError>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                if let Some(modal) = self.prepared.borrow().get(&key) {
                    return Ok(modal.clone());
                }
                // 每次加载生成独立实例（模态不缓存复用）
                self.counter.set(self.counter.get() + 1);
                let name = format!("{:?}{}", key, self.counter.get()).to_lowercase();
                Ok(TestModal::new(&name, self.log.clone()) as Rc<dyn ModalWindow>)
            })
        }

        fn set_backdrop(&self, visible: bool) {
            self.log.borrow_mut().push(format!("backdrop.{visible}"));
        }

        fn on_close_last_modal(&self) {
            self.log.borrow_mut().push("last_modal_closed".to_string());
        }
    }

    fn setup() -> (ModalManager<ModalKey>, Rc<TestModalLoader>, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let loader = TestModalLoader::new(log.clone());
        let manager = ModalManager::new(loader.clone() as Rc<dyn ModalLoader<ModalKey>>);
        (manager, loader, log)
    }

    #[tokio::test]
    async fn test_open_and_close_modal() {
        let (manager, _loader, log) = setup();

        let handle = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        assert_eq!(handle.id(), 1);
        assert_eq!(handle.state(), ModalState::Opened);
        assert_eq!(manager.modal_stack(), vec![1]);
        assert!(log.borrow().contains(&"backdrop.true".to_string()));

        let _ = manager.close_modal(&handle).await;
        assert_eq!(handle.state(), ModalState::Closed);
        assert_eq!(manager.modal_count(), 0);

        let recorded = log.borrow().clone();
        assert!(recorded.contains(&"backdrop.false".to_string()));
        assert!(recorded.contains(&"last_modal_closed".to_string()));
    }

    #[tokio::test]
    async fn test_second_modal_deactivates_first() {
        let (manager, _loader, log) = setup();

        let first = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        let second = manager
            .open_modal(ModalKey::Confirm, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);

        // 下层模态休眠而不是销毁
        assert_eq!(first.state(), ModalState::Deactive);
        assert!(manager.get_modal(1).is_some());
        assert_eq!(manager.modal_stack(), vec![1, 2]);

        // 关闭上层后下层恢复
        let _ = manager.close_modal(&second).await;
        assert_eq!(first.state(), ModalState::Opened);
        assert_eq!(manager.modal_stack(), vec![1]);

        // 恢复时重新收到激活与 on_open
        let recorded = log.borrow().clone();
        let reopens = recorded.iter().filter(|e| *e == "message1.open").count();
        assert_eq!(reopens, 2);
    }

    #[tokio::test]
    async fn test_keep_front_modal_preserves_previous() {
        let (manager, _loader, log) = setup();

        let first = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        let second = manager
            .open_modal(ModalKey::Confirm, Payload::none(), ModalOptions::keep_front())
            .await
            .unwrap();

        // KeepFrontModal：下层保持打开
        assert_eq!(first.state(), ModalState::Opened);

        let _ = manager.close_modal(&second).await;
        // 下层不需要恢复流程
        let recorded = log.borrow().clone();
        let reopens = recorded.iter().filter(|e| *e == "message1.open").count();
        assert_eq!(reopens, 1);
        assert_eq!(first.state(), ModalState::Opened);
    }

    #[tokio::test]
    async fn test_pre_open_error_becomes_open_error_state() {
        let (manager, loader, log) = setup();

        let modal = Rc::new(TestModal {
            name: "broken".to_string(),
            log: log.clone(),
            fail_pre_open: true,
            handle: RefCell::new(None),
        });
        loader.prepare(ModalKey::Message, modal);

        // 错误不向调用方传播，通过句柄状态表达
        let handle = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        assert_eq!(handle.state(), ModalState::OpenError);
        assert_eq!(manager.modal_count(), 0);

        let recorded = log.borrow().clone();
        assert!(recorded.contains(&"broken.pre_close".to_string()));
        assert!(recorded.contains(&"last_modal_closed".to_string()));
    }

    #[tokio::test]
    async fn test_wait_close_returns_close_param() {
        let (manager, _loader, _log) = setup();

        let handle = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        handle.set_close_param(Payload::new("ok"));

        let waiter = handle.clone();
        let (param, _) = tokio::join!(waiter.wait_close(), manager.close_modal(&handle));
        assert_eq!(param.downcast_ref::<&str>(), Some(&"ok"));
    }

    #[tokio::test]
    async fn test_modal_close_via_handle() {
        let (manager, _loader, _log) = setup();

        let handle = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        let _ = handle.close().await;
        assert_eq!(handle.state(), ModalState::Closed);
        assert_eq!(manager.modal_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_top_modals_ignore_top() {
        let (manager, _loader, _log) = setup();

        let first = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        let second = manager
            .open_modal(ModalKey::Confirm, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        let third = manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();

        manager.remove_top_modals_ignore_top(|_| true);

        // 最上层保留，其余被移除（状态 Removed，跳过关闭回调）
        assert_eq!(manager.modal_stack(), vec![third.id()]);
        assert_eq!(first.state(), ModalState::Removed);
        assert_eq!(second.state(), ModalState::Removed);
        assert_eq!(third.state(), ModalState::Opened);
    }

    #[tokio::test]
    async fn test_remove_all_modals() {
        let (manager, _loader, log) = setup();

        manager
            .open_modal(ModalKey::Message, Payload::none(), ModalOptions::default())
            .await
            .unwrap();
        manager
            .open_modal(ModalKey::Confirm, Payload::none(), ModalOptions::default())
            .await
            .unwrap();

        manager.remove_all_modals();
        assert_eq!(manager.modal_count(), 0);
        assert!(log.borrow().contains(&"last_modal_closed".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_opens_are_serialized() {
        let (manager, _loader, log) = setup();

        let (first, second) = tokio::join!(
            manager.open_modal(ModalKey::Message, Payload::none(), ModalOptions::default()),
            manager.open_modal(ModalKey::Confirm, Payload::none(), ModalOptions::default()),
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(manager.modal_stack(), vec![1, 2]);

        // 第一个模态完整打开后第二个才开始入栈
        let recorded = log.borrow().clone();
        let first_open = recorded.iter().position(|e| e == "message1.open").unwrap();
        let second_pre = recorded.iter().position(|e| e == "confirm2.pre_open").unwrap();
        assert!(first_open < second_pre);
    }
}
