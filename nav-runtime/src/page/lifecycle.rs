//! # Lifecycle 模块
//!
//! 页面树的生命周期遍历。
//!
//! ## 设计说明
//!
//! - 页面可以嵌套：页面通过 [`Page::as_router`] 暴露其内部路由器，
//!   路由器又持有当前子页，构成一条"当前激活链"
//! - 每个生命周期阶段由这里的遍历函数沿激活链自祖先向后代走一遍，
//!   结果回调在第一个失败处短路，淡入淡出在第一个 `Play` 处短路
//! - 关闭类回调（`pre_close` / `closed`）先访问后代再访问自身，
//!   与打开方向相反

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{OwnerLink, Page, PageContext, PageFadeResult, PageResult, PageState, PageTransition};
use crate::BoxFuture;
use crate::payload::Payload;

/// 嵌套路由器的类型擦除接口
///
/// [`super::PageManager`] 对所有键类型实现此接口，
/// 生命周期遍历经由它递归进入当前子页。
pub trait RouterNode {
    /// 是否正处于打开流程中
    fn is_open_state(&self) -> bool;

    /// 设置所属路由器句柄
    fn set_parent(&self, owner: OwnerLink);

    /// 递归清空自身与所有缓存子路由器的历史（不销毁缓存页面）
    fn clear_page_stack_all(&self);

    /// 打开前遍历用的迁移序号快照
    fn pre_open_snapshot(&self) -> u64;

    /// 激活状态沿激活链传播
    fn visit_set_active(&self, active: bool);

    /// 打开前回调进入当前子页
    ///
    /// `snapshot` 与当前迁移序号不一致时说明快照后发生了新的打开，
    /// 旧的子页不再在这里重复打开。
    fn visit_pre_open(&self, snapshot: u64, transition: PageTransition)
    -> BoxFuture<'_, PageResult>;

    /// 关闭前回调进入当前子页
    fn visit_pre_close(&self) -> BoxFuture<'_, PageResult>;

    /// 关闭回调进入当前子页
    fn visit_closed(&self) -> BoxFuture<'_, PageResult>;

    /// 淡出前回调进入当前子页
    fn visit_before_fade_out(&self) -> BoxFuture<'_, PageResult>;

    /// 淡出后回调进入当前子页
    fn visit_after_fade_out(&self) -> BoxFuture<'_, PageResult>;

    /// 淡入前回调进入当前子页
    fn visit_before_fade_in(&self) -> BoxFuture<'_, PageResult>;

    /// 淡入后回调进入当前子页
    fn visit_after_fade_in(&self) -> BoxFuture<'_, PageResult>;

    /// 淡出效果进入当前子页
    fn visit_fade_out(&self) -> BoxFuture<'_, PageFadeResult>;

    /// 淡入效果进入当前子页
    fn visit_fade_in(&self) -> BoxFuture<'_, PageFadeResult>;

    /// 返回上一页
    fn back(&self) -> BoxFuture<'_, PageResult>;

    /// 前进到下一页
    fn next(&self) -> BoxFuture<'_, PageResult>;
}

/// 路由器缓存中的页面条目
///
/// 页面实例与框架侧状态共享所有权，迁移过程中会把条目快照到局部，
/// 所有对路由器内部结构的修改都发生在非挂起区段（先快照后修改）。
#[derive(Clone)]
pub(crate) struct PageEntry {
    pub(crate) page: Rc<dyn Page>,
    pub(crate) meta: Rc<PageMeta>,
}

/// 框架侧维护的页面状态
pub(crate) struct PageMeta {
    pub(crate) state: Cell<PageState>,
    pub(crate) transition: Cell<PageTransition>,
    pub(crate) args: RefCell<Payload>,
    pub(crate) active: Cell<bool>,
}

impl PageEntry {
    pub(crate) fn new(page: Rc<dyn Page>) -> Self {
        Self {
            page,
            meta: Rc::new(PageMeta {
                state: Cell::new(PageState::Idle),
                transition: Cell::new(PageTransition::Open),
                args: RefCell::new(Payload::none()),
                active: Cell::new(false),
            }),
        }
    }
}

/// 激活状态传播：自身之后递归当前子页
pub(crate) fn call_set_active(entry: &PageEntry, active: bool) {
    entry.meta.active.set(active);
    entry.page.on_set_active(active);
    if let Some(router) = entry.page.as_router() {
        router.visit_set_active(active);
    }
}

/// 打开前回调：自身成功后进入子页
///
/// 页面自身的回调期间可能已触发新的子页打开（嵌套路由器打开默认页等），
/// 此时序号快照失配，不再按旧的子页重复打开。
pub(crate) async fn call_pre_open(entry: &PageEntry, ctx: PageContext) -> PageResult {
    let snapshot = entry.page.as_router().map(|router| router.pre_open_snapshot());
    let result = entry.page.on_pre_open(ctx.clone()).await;
    if result != PageResult::Success {
        return result;
    }
    match (entry.page.as_router(), snapshot) {
        (Some(router), Some(snapshot)) => router.visit_pre_open(snapshot, ctx.transition).await,
        _ => PageResult::Success,
    }
}

/// 关闭前回调：先子页后自身
pub(crate) async fn call_pre_close(entry: &PageEntry) -> PageResult {
    if let Some(router) = entry.page.as_router() {
        let result = router.visit_pre_close().await;
        if result != PageResult::Success {
            return result;
        }
    }
    entry.page.on_pre_close().await
}

/// 关闭回调：先子页后自身
pub(crate) async fn call_closed(entry: &PageEntry) -> PageResult {
    if let Some(router) = entry.page.as_router() {
        let result = router.visit_closed().await;
        if result != PageResult::Success {
            return result;
        }
    }
    entry.page.on_closed().await
}

/// 淡出前回调：自身之后子页
pub(crate) async fn call_before_fade_out(entry: &PageEntry) -> PageResult {
    let result = entry.page.on_before_fade_out().await;
    if result != PageResult::Success {
        return result;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_before_fade_out().await,
        None => PageResult::Success,
    }
}

/// 淡出后回调：自身之后子页
pub(crate) async fn call_after_fade_out(entry: &PageEntry) -> PageResult {
    let result = entry.page.on_after_fade_out().await;
    if result != PageResult::Success {
        return result;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_after_fade_out().await,
        None => PageResult::Success,
    }
}

/// 淡入前回调：自身之后子页
pub(crate) async fn call_before_fade_in(entry: &PageEntry) -> PageResult {
    let result = entry.page.on_before_fade_in().await;
    if result != PageResult::Success {
        return result;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_before_fade_in().await,
        None => PageResult::Success,
    }
}

/// 淡入后回调：自身之后子页
pub(crate) async fn call_after_fade_in(entry: &PageEntry) -> PageResult {
    let result = entry.page.on_after_fade_in().await;
    if result != PageResult::Success {
        return result;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_after_fade_in().await,
        None => PageResult::Success,
    }
}

/// 淡出效果：链上第一个 `Play` 生效
pub(crate) async fn call_fade_out(entry: &PageEntry) -> PageFadeResult {
    if entry.page.on_fade_out().await == PageFadeResult::Play {
        return PageFadeResult::Play;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_fade_out().await,
        None => PageFadeResult::None,
    }
}

/// 淡入效果：链上第一个 `Play` 生效
pub(crate) async fn call_fade_in(entry: &PageEntry) -> PageFadeResult {
    if entry.page.on_fade_in().await == PageFadeResult::Play {
        return PageFadeResult::Play;
    }
    match entry.page.as_router() {
        Some(router) => router.visit_fade_in().await,
        None => PageFadeResult::None,
    }
}
