//! # Page 模块
//!
//! 页面契约与生命周期类型定义。
//!
//! ## 生命周期
//!
//! 一次打开迁移中，回调的调用顺序固定：
//!
//! ```text
//! on_pre_open
//!   → on_before_fade_out → [淡出效果] → (关闭旧页)
//!   → on_after_fade_out → on_before_fade_in → [淡入效果]
//!   → on_after_fade_in
//! ```
//!
//! `on_pre_close` / `on_closed` 在页面被替换时对旧页调用。
//! `on_pre_open` / `on_pre_close` 返回非 Success 会中止整个迁移，
//! 旧页保持为当前页，新页不会被提交。

pub mod lifecycle;
pub mod manager;

pub use lifecycle::RouterNode;
pub use manager::{PageLoader, PageManager};

use std::cell::Cell;
use std::future::ready;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::BoxFuture;
use crate::payload::Payload;

/// 页面迁移的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageResult {
    /// 成功
    Success,
    /// 失败
    Failed,
    /// 取消（例如历史栈已到边界）
    Cancel,
}

/// 淡入淡出效果的执行结果
///
/// 委托链上第一个返回 `Play` 的实现生效，祖先不再叠加播放自己的效果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFadeResult {
    /// 没有播放效果
    None,
    /// 播放了效果
    Play,
}

/// 页面的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageState {
    /// 待机中
    Idle,
    /// 已打开
    Opened,
    /// 关闭
    Closed,
}

impl Default for PageState {
    fn default() -> Self {
        PageState::Idle
    }
}

/// 迁移类型
///
/// 描述页面因何被打开，影响历史栈的变化方式：
/// `Open` 会截断光标之后的前进历史，`Back` / `Next` 只移动光标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageTransition {
    /// 普通打开
    Open,
    /// 返回上一页
    Back,
    /// 前进到下一页
    Next,
}

impl Default for PageTransition {
    fn default() -> Self {
        PageTransition::Open
    }
}

/// 打开页面时传给回调的上下文
#[derive(Debug, Clone)]
pub struct PageContext {
    /// 迁移类型
    pub transition: PageTransition,
    /// 打开参数（不透明载荷）
    pub args: Payload,
}

/// 所属路由器的句柄
///
/// 页面加载完成时由路由器下发（见 [`Page::attach_owner`]）。
/// 嵌套路由器凭此判断父级是否正处于打开流程中，
/// 是则把淡入淡出等后续阶段交给父级的遍历统一执行，避免双重淡入。
#[derive(Clone, Default)]
pub struct OwnerLink {
    open_flag: Option<Rc<Cell<bool>>>,
}

impl OwnerLink {
    pub(crate) fn new(open_flag: Rc<Cell<bool>>) -> Self {
        Self {
            open_flag: Some(open_flag),
        }
    }

    /// 所属路由器是否正在打开流程中
    pub fn is_open_state(&self) -> bool {
        self.open_flag.as_ref().map(|flag| flag.get()).unwrap_or(false)
    }
}

/// 页面契约
///
/// 所有回调都有默认实现（Success / None），页面只需覆写自己关心的阶段。
/// 回调返回装箱 Future，运行时在每个回调处让出。
pub trait Page {
    /// 关闭时是否从缓存中销毁（默认缓存复用）
    fn is_destroy_on_closed(&self) -> bool {
        false
    }

    /// 加载完成时由所属路由器调用
    ///
    /// 内嵌路由器的页面应把 `owner` 转交给 [`PageManager::set_parent`]。
    fn attach_owner(&self, _owner: OwnerLink) {}

    /// 页面自身是嵌套路由器时返回其类型擦除接口，参与生命周期遍历
    fn as_router(&self) -> Option<&dyn RouterNode> {
        None
    }

    /// 激活状态变更通知
    fn on_set_active(&self, _active: bool) {}

    /// 打开前回调；非 Success 中止迁移
    fn on_pre_open(&self, _ctx: PageContext) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 关闭前回调；非 Success 中止迁移
    fn on_pre_close(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 关闭时回调
    fn on_closed(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 淡出前回调
    fn on_before_fade_out(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 淡出后回调
    fn on_after_fade_out(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 淡入前回调
    fn on_before_fade_in(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 淡入后回调
    fn on_after_fade_in(&self) -> BoxFuture<'_, PageResult> {
        Box::pin(ready(PageResult::Success))
    }

    /// 淡出效果槽
    fn on_fade_out(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(ready(PageFadeResult::None))
    }

    /// 淡入效果槽
    fn on_fade_in(&self) -> BoxFuture<'_, PageFadeResult> {
        Box::pin(ready(PageFadeResult::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(PageState::default(), PageState::Idle);
        assert_eq!(PageTransition::default(), PageTransition::Open);
        // 没有所属路由器时视为不在打开流程中
        assert!(!OwnerLink::default().is_open_state());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PageState::Opened).unwrap();
        let state: PageState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, PageState::Opened);

        let json = serde_json::to_string(&PageTransition::Back).unwrap();
        let transition: PageTransition = serde_json::from_str(&json).unwrap();
        assert_eq!(transition, PageTransition::Back);
    }
}
