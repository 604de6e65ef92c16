//! # PageManager 模块
//!
//! 带历史栈的页面路由器，nav-runtime 的核心类型。
//!
//! ## 执行模型
//!
//! 一次 `open_page` 按固定顺序驱动生命周期（见 [`super`] 模块说明），
//! 页面实例按键缓存、懒加载、跨打开复用。历史栈以光标表示当前位置：
//! `back` / `next` 只移动光标，`Open` 迁移会截断光标之后的前进历史
//! （与浏览器历史一致）。
//!
//! ## 迁移排队
//!
//! 同一路由器内同时只允许一个迁移在途：并发的打开请求经由独占闸门
//! 严格排队执行，后到者等待而不是交错。因此陈旧的加载续体不可能
//! 覆盖更新的提交，收敛结果由最后一个请求决定。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::ready;
use std::rc::Rc;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::lifecycle::{
    PageEntry, call_after_fade_in, call_after_fade_out, call_before_fade_in, call_before_fade_out,
    call_closed, call_fade_in, call_fade_out, call_pre_close, call_pre_open, call_set_active,
};
use super::{
    OwnerLink, Page, PageContext, PageFadeResult, PageResult, PageState, PageTransition, RouterNode,
};
use crate::error::LoadError;
use crate::payload::Payload;
use crate::{BoxFuture, NavKey};

/// 页面资源加载契约
///
/// 路由器把页面标识符到页面实例的解析交给宿主实现，
/// 同时提供若干子页生命周期通知与路由器级的淡入淡出效果槽。
pub trait PageLoader<K: NavKey> {
    /// 页面资源的解析（由具体画面实现，对路由器不透明）
    fn load_page(&self, key: K) -> BoxFuture<'_, Result<Rc<dyn Page>, LoadError>>;

    /// 缓存页面被销毁时的通知
    fn on_destroy_page(&self, _key: K) {}

    /// 子页打开前的通知；非 Success 中止迁移
    fn on_pre_open_child(&self, _key: K) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 子页打开后的通知
    fn on_open_child(&self, _key: K) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 子页关闭后的通知
    fn on_close_child(&self, _key: K) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 路由器级淡出效果槽（委托链的根，返回 `Play` 时链上不再播放）
    fn on_fade_out(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(ready(PageFadeResult::None))
    }

    /// 路由器级淡入效果槽
    fn on_fade_in(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(ready(PageFadeResult::None))
    }
}

/// 历史栈条目
#[derive(Clone)]
struct StackEntry<K> {
    key: K,
    args: Payload,
}

/// 路由器内部状态
struct Inner<K: NavKey> {
    /// 页面缓存：每个标识符至多一个存活实例
    cache: HashMap<K, PageEntry>,
    /// 历史栈
    stack: Vec<StackEntry<K>>,
    /// 历史栈光标，`0 ≤ stack_index ≤ stack.len()`
    stack_index: usize,
    /// 当前页
    current: Option<K>,
    /// 迁移中的页面
    loading: Option<K>,
    /// 迁移序号（单调递增）
    open_seq: u64,
}

struct Shared<K: NavKey> {
    loader: Rc<dyn PageLoader<K>>,
    /// 迁移闸门：同一路由器内的迁移严格排队
    gate: Mutex<()>,
    /// 打开流程在途标记（嵌套路由器经由 OwnerLink 观察）
    open_flag: Rc<Cell<bool>>,
    /// 所属路由器句柄（自身作为页面被嵌套时设置）
    parent: RefCell<OwnerLink>,
    inner: RefCell<Inner<K>>,
}

/// 带历史栈的页面路由器
///
/// 句柄可廉价克隆，克隆共享同一内部状态；页面实现侧可持有克隆
/// 以触发导航（显式依赖注入，没有全局单例）。
pub struct PageManager<K: NavKey> {
    shared: Rc<Shared<K>>,
}

impl<K: NavKey> Clone for PageManager<K> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: NavKey> PageManager<K> {
    /// 创建路由器
    pub fn new(loader: Rc<dyn PageLoader<K>>) -> Self {
        Self {
            shared: Rc::new(Shared {
                loader,
                gate: Mutex::new(()),
                open_flag: Rc::new(Cell::new(false)),
                parent: RefCell::new(OwnerLink::default()),
                inner: RefCell::new(Inner {
                    cache: HashMap::new(),
                    stack: Vec::new(),
                    stack_index: 0,
                    current: None,
                    loading: None,
                    open_seq: 0,
                }),
            }),
        }
    }

    /// 当前页
    pub fn current_page_type(&self) -> Option<K> {
        self.shared.inner.borrow().current
    }

    /// 迁移中的页面
    pub fn loading_page_type(&self) -> Option<K> {
        self.shared.inner.borrow().loading
    }

    /// 是否正处于打开流程中
    pub fn is_open_state(&self) -> bool {
        self.shared.open_flag.get()
    }

    /// 历史栈长度
    pub fn page_stack_len(&self) -> usize {
        self.shared.inner.borrow().stack.len()
    }

    /// 历史栈光标位置
    pub fn page_stack_index(&self) -> usize {
        self.shared.inner.borrow().stack_index
    }

    /// 取得缓存中的页面实例
    pub fn get_page(&self, key: K) -> Option<Rc<dyn Page>> {
        self.entry(key).map(|entry| entry.page.clone())
    }

    /// 取得当前页实例
    pub fn current_page(&self) -> Option<Rc<dyn Page>> {
        self.current_entry().map(|entry| entry.page.clone())
    }

    /// 取得缓存页面的状态
    pub fn page_state(&self, key: K) -> Option<PageState> {
        self.entry(key).map(|entry| entry.meta.state.get())
    }

    /// 缓存页面当前是否激活
    pub fn is_page_active(&self, key: K) -> bool {
        self.entry(key)
            .map(|entry| entry.meta.active.get())
            .unwrap_or(false)
    }

    /// 缓存页面最近一次被打开时的迁移类型
    pub fn page_transition(&self, key: K) -> Option<PageTransition> {
        self.entry(key).map(|entry| entry.meta.transition.get())
    }

    /// 设置所属路由器句柄（自身作为页面被嵌套时，从 `attach_owner` 转交）
    pub fn set_parent(&self, owner: OwnerLink) {
        *self.shared.parent.borrow_mut() = owner;
    }

    /// 下发给子页的所属路由器句柄
    pub fn owner_link(&self) -> OwnerLink {
        OwnerLink::new(self.shared.open_flag.clone())
    }

    /// 向历史栈追加一个条目并推进光标
    pub fn add_page_stack(&self, key: K, args: Payload) {
        let mut inner = self.shared.inner.borrow_mut();
        inner.stack.push(StackEntry { key, args });
        inner.stack_index += 1;
    }

    /// 从历史栈移除最近的一个指定页面条目，并修正光标
    pub fn remove_page_stack(&self, key: K) {
        let mut inner = self.shared.inner.borrow_mut();
        if let Some(pos) = inner.stack.iter().rposition(|entry| entry.key == key) {
            if inner.stack_index > pos {
                inner.stack_index -= 1;
            }
            inner.stack.remove(pos);
        }
    }

    /// 清空历史栈
    pub fn clear_page_stack(&self) {
        let mut inner = self.shared.inner.borrow_mut();
        inner.stack.clear();
        inner.stack_index = 0;
    }

    /// 清空自身与所有缓存子路由器的历史（不销毁缓存页面）
    pub fn clear_page_stack_all(&self) {
        self.clear_page_stack();
        let entries: Vec<PageEntry> = self.shared.inner.borrow().cache.values().cloned().collect();
        for entry in entries {
            if let Some(router) = entry.page.as_router() {
                router.clear_page_stack_all();
            }
        }
    }

    /// 清空页面缓存并通知销毁，同时清空历史栈
    pub fn clear_page_cache(&self) {
        let keys: Vec<K> = {
            let mut inner = self.shared.inner.borrow_mut();
            inner.current = None;
            inner.cache.drain().map(|(key, _)| key).collect()
        };
        for key in keys {
            self.shared.loader.on_destroy_page(key);
        }
        self.clear_page_stack();
    }

    /// 打开页面
    ///
    /// `add_to_stack` 为 true 时成功后把 `(key, args)` 追加到历史栈。
    /// 同一路由器内并发的打开请求排队执行，最终状态由最后的请求决定。
    pub async fn open_page(&self, key: K, add_to_stack: bool, args: Payload) -> PageResult {
        let _gate = self.shared.gate.lock().await;
        self.run_open(key, add_to_stack, args, PageTransition::Open).await
    }

    /// 返回上一页
    ///
    /// 先交给当前子页处理（子路由成功处理自己的返回则到此为止），
    /// 否则回退本路由器的光标并按 `Back` 迁移重新打开。
    /// 光标已在最前时返回 `Cancel`，状态不变。
    pub async fn back_page(&self) -> PageResult {
        // 子路由优先
        if let Some(entry) = self.current_entry() {
            if let Some(router) = entry.page.as_router() {
                if router.back().await == PageResult::Success {
                    return PageResult::Success;
                }
            }
        }

        let _gate = self.shared.gate.lock().await;
        let stack_entry = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stack_index <= 1 {
                return PageResult::Cancel;
            }
            inner.stack_index -= 1;
            inner.stack[inner.stack_index - 1].clone()
        };

        let result = self
            .run_open(stack_entry.key, false, stack_entry.args, PageTransition::Back)
            .await;
        if result != PageResult::Success {
            // 打开失败时光标回到原处
            self.shared.inner.borrow_mut().stack_index += 1;
        }
        result
    }

    /// 前进到下一页
    ///
    /// 与 [`Self::back_page`] 对称；光标已在末尾时返回 `Cancel`。
    pub async fn next_page(&self) -> PageResult {
        // 子路由优先
        if let Some(entry) = self.current_entry() {
            if let Some(router) = entry.page.as_router() {
                if router.next().await == PageResult::Success {
                    return PageResult::Success;
                }
            }
        }

        let _gate = self.shared.gate.lock().await;
        let stack_entry = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.stack_index >= inner.stack.len() {
                return PageResult::Cancel;
            }
            let entry = inner.stack[inner.stack_index].clone();
            inner.stack_index += 1;
            entry
        };

        let result = self
            .run_open(stack_entry.key, false, stack_entry.args, PageTransition::Next)
            .await;
        if result != PageResult::Success {
            self.shared.inner.borrow_mut().stack_index -= 1;
        }
        result
    }

    /// 关闭当前页（不触碰历史栈）
    pub async fn close_current_page(&self) -> PageResult {
        let _gate = self.shared.gate.lock().await;
        let entry = match self.current_entry() {
            Some(entry) => entry,
            None => return PageResult::Success,
        };

        let result = call_pre_close(&entry).await;
        if result != PageResult::Success {
            return result;
        }
        let result = call_closed(&entry).await;
        if result != PageResult::Success {
            return result;
        }

        entry.meta.state.set(PageState::Closed);
        call_set_active(&entry, false);
        self.shared.inner.borrow_mut().current = None;
        PageResult::Success
    }

    fn entry(&self, key: K) -> Option<PageEntry> {
        self.shared.inner.borrow().cache.get(&key).cloned()
    }

    fn current_entry(&self) -> Option<PageEntry> {
        let inner = self.shared.inner.borrow();
        inner.current.and_then(|key| inner.cache.get(&key).cloned())
    }

    /// 在闸门保护下执行一次迁移，维护在途标记与迁移中页面
    async fn run_open(
        &self,
        key: K,
        add_to_stack: bool,
        args: Payload,
        transition: PageTransition,
    ) -> PageResult {
        self.shared.open_flag.set(true);
        let result = self.open_core(key, add_to_stack, args, transition).await;
        self.shared.open_flag.set(false);
        self.shared.inner.borrow_mut().loading = None;
        result
    }

    /// 加载（或取缓存）页面条目
    async fn load_entry(&self, key: K) -> Result<PageEntry, LoadError> {
        if let Some(entry) = self.entry(key) {
            return Ok(entry);
        }
        let page = self.shared.loader.load_page(key).await?;
        page.attach_owner(self.owner_link());
        let entry = PageEntry::new(page);
        // 加载完成即入缓存，初始为未激活
        call_set_active(&entry, false);
        self.shared.inner.borrow_mut().cache.insert(key, entry.clone());
        Ok(entry)
    }

    /// 迁移主流程（调用方持有闸门）
    async fn open_core(
        &self,
        key: K,
        add_to_stack: bool,
        args: Payload,
        transition: PageTransition,
    ) -> PageResult {
        let shared = &self.shared;
        let seq = {
            let mut inner = shared.inner.borrow_mut();
            inner.open_seq += 1;
            inner.open_seq
        };
        debug!(?key, seq, ?transition, "开始页面迁移");

        // 打开的就是当前页时跳过关闭流程（允许重跑打开回调）
        let (close_entry, close_key) = {
            let inner = shared.inner.borrow();
            if inner.current == Some(key) {
                (None, None)
            } else {
                let close_key = inner.current;
                let entry = close_key.and_then(|k| inner.cache.get(&k).cloned());
                (entry, close_key)
            }
        };

        // 旧页的关闭前回调；失败则整体中止，当前页保持不变
        if let Some(entry) = &close_entry {
            if entry.meta.state.get() == PageState::Opened {
                let result = call_pre_close(entry).await;
                if result != PageResult::Success {
                    warn!(?key, seq, ?result, "旧页关闭前回调未通过，迁移中止");
                    return result;
                }
            }
        }

        shared.inner.borrow_mut().loading = Some(key);

        // Open 迁移使光标之后的前进历史失效（浏览器式截断）
        if transition == PageTransition::Open {
            let mut inner = shared.inner.borrow_mut();
            let cursor = inner.stack_index;
            inner.stack.truncate(cursor);
        }

        let new_entry = match self.load_entry(key).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(?key, seq, error = %e, "页面加载失败，迁移中止");
                return PageResult::Failed;
            }
        };
        *new_entry.meta.args.borrow_mut() = args.clone();
        new_entry.meta.transition.set(transition);

        // Open 迁移进入嵌套路由时清空其全部历史
        if transition == PageTransition::Open {
            if let Some(router) = new_entry.page.as_router() {
                router.clear_page_stack_all();
            }
        }

        let result = shared.loader.on_pre_open_child(key).await;
        if result != PageResult::Success {
            return result;
        }

        // 新页的打开前回调；失败时回退到迁移前状态
        let ctx = PageContext {
            transition,
            args: args.clone(),
        };
        let result = call_pre_open(&new_entry, ctx).await;
        if result != PageResult::Success {
            call_set_active(&new_entry, false);
            warn!(?key, seq, ?result, "打开前回调未通过，迁移中止");
            return result;
        }
        new_entry.meta.state.set(PageState::Opened);

        // 父路由正处于打开流程中：淡入淡出等后续阶段交给父级的遍历，
        // 这里只提交当前页与历史，避免父子各自淡入造成双重效果
        if shared.parent.borrow().is_open_state() {
            let mut inner = shared.inner.borrow_mut();
            inner.current = Some(key);
            if add_to_stack {
                inner.stack.push(StackEntry { key, args });
                inner.stack_index += 1;
            }
            return PageResult::Success;
        }

        let result = call_before_fade_out(&new_entry).await;
        if result != PageResult::Success {
            return result;
        }

        // 关闭旧页
        if let Some(entry) = &close_entry {
            if entry.meta.state.get() == PageState::Opened {
                // 淡出效果：路由器效果槽优先，其次旧页链上最深的实现
                if shared.loader.on_fade_out().await == PageFadeResult::None {
                    call_fade_out(entry).await;
                }
                if let Some(old_key) = close_key {
                    let _ = shared.loader.on_close_child(old_key).await;
                }
                let result = call_closed(entry).await;
                if result != PageResult::Success {
                    return result;
                }
                entry.meta.state.set(PageState::Closed);
                call_set_active(entry, false);
                if entry.page.is_destroy_on_closed() {
                    if let Some(old_key) = close_key {
                        shared.inner.borrow_mut().cache.remove(&old_key);
                        shared.loader.on_destroy_page(old_key);
                    }
                }
            }
        }

        // 提交：从这里起新页成为当前页
        shared.inner.borrow_mut().current = Some(key);
        let _ = shared.loader.on_open_child(key).await;

        call_set_active(&new_entry, true);
        let result = call_after_fade_out(&new_entry).await;
        if result != PageResult::Success {
            return result;
        }
        let result = call_before_fade_in(&new_entry).await;
        if result != PageResult::Success {
            return result;
        }

        // 淡入效果：路由器效果槽优先，其次新页链上最深的实现
        if shared.loader.on_fade_in().await == PageFadeResult::None {
            call_fade_in(&new_entry).await;
        }

        let result = call_after_fade_in(&new_entry).await;
        if result != PageResult::Success {
            return result;
        }

        if add_to_stack {
            let mut inner = shared.inner.borrow_mut();
            inner.stack.push(StackEntry { key, args });
            inner.stack_index += 1;
        }
        debug!(?key, seq, "页面迁移完成");
        PageResult::Success
    }
}

impl<K: NavKey> RouterNode for PageManager<K> {
    fn is_open_state(&self) -> bool {
        PageManager::is_open_state(self)
    }

    fn set_parent(&self, owner: OwnerLink) {
        PageManager::set_parent(self, owner);
    }

    fn clear_page_stack_all(&self) {
        PageManager::clear_page_stack_all(self);
    }

    fn pre_open_snapshot(&self) -> u64 {
        self.shared.inner.borrow().open_seq
    }

    fn visit_set_active(&self, active: bool) {
        if let Some(entry) = self.current_entry() {
            call_set_active(&entry, active);
        }
    }

    fn visit_pre_open(
        &self,
        snapshot: u64,
        transition: PageTransition,
    ) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            let entry = {
                let inner = self.shared.inner.borrow();
                // 快照后发生了新的打开（页面自身的回调触发了导航），
                // 旧的子页不再在这里重复打开
                if inner.open_seq != snapshot {
                    return PageResult::Success;
                }
                match inner.current.and_then(|key| inner.cache.get(&key).cloned()) {
                    Some(entry) => entry,
                    None => return PageResult::Success,
                }
            };
            entry.meta.transition.set(transition);
            let ctx = PageContext {
                transition,
                args: entry.meta.args.borrow().clone(),
            };
            let result = call_pre_open(&entry, ctx).await;
            if result == PageResult::Success {
                entry.meta.state.set(PageState::Opened);
            }
            result
        })
    }

    fn visit_pre_close(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_pre_close(&entry).await,
                None => PageResult::Success,
            }
        })
    }

    fn visit_closed(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            if let Some(entry) = self.current_entry() {
                let result = call_closed(&entry).await;
                if result != PageResult::Success {
                    return result;
                }
                entry.meta.state.set(PageState::Closed);
            }
            PageResult::Success
        })
    }

    fn visit_before_fade_out(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_before_fade_out(&entry).await,
                None => PageResult::Success,
            }
        })
    }

    fn visit_after_fade_out(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_after_fade_out(&entry).await,
                None => PageResult::Success,
            }
        })
    }

    fn visit_before_fade_in(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_before_fade_in(&entry).await,
                None => PageResult::Success,
            }
        })
    }

    fn visit_after_fade_in(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_after_fade_in(&entry).await,
                None => PageResult::Success,
            }
        })
    }

    fn visit_fade_out(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_fade_out(&entry).await,
                None => PageFadeResult::None,
            }
        })
    }

    fn visit_fade_in(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(async move {
            match self.current_entry() {
                Some(entry) => call_fade_in(&entry).await,
                None => PageFadeResult::None,
            }
        })
    }

    fn back(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(self.back_page())
    }

    fn next(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(self.next_page())
    }
}
