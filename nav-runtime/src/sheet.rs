//! # Sheet 模块
//!
//! 平铺的标签页容器：一组互斥的内容面板由标签切换，没有历史。
//!
//! ## 设计说明
//!
//! - 同一容器内同时只有一个（或没有）激活的面板
//! - 切换时先等旧面板关闭、再打开新面板，两者绝不同时进行
//! - 切换进行中的并发请求被丢弃（忙标记语义），而不是排队

use std::cell::{Cell, RefCell};
use std::future::ready;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::BoxFuture;

/// 标签的标识（注册时由容器分配）
pub type TabId = u64;

/// 标签切换的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetSelectResult {
    /// 切换完成
    Selected,
    /// 已是选中的标签，无动作
    AlreadySelected,
    /// 有切换正在进行，本次请求被丢弃
    Busy,
    /// 标签未注册
    NotRegistered,
}

/// 面板契约
pub trait Sheet {
    /// 激活状态变更通知
    fn on_set_active(&self, _active: bool) {}

    /// 打开前回调
    fn on_pre_open(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    /// 打开后回调
    fn on_open(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }

    /// 关闭时回调
    fn on_close(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }
}

/// 标签契约
///
/// 标签可以不挂面板（只接收开闭通知，用于纯视觉状态的标签）。
pub trait SheetTab {
    /// 标签对应的面板
    fn sheet(&self) -> Option<Rc<dyn Sheet>> {
        None
    }

    /// 标签被选中时的通知（面板激活之后）
    fn on_open_sheet(&self) {}

    /// 标签被取消选中时的通知
    fn on_close_sheet(&self) {}
}

/// 标签页容器
pub struct SheetManager {
    tabs: RefCell<Vec<(TabId, Rc<dyn SheetTab>)>>,
    selected: Cell<Option<TabId>>,
    next_id: Cell<TabId>,
    /// 切换进行中标记：并发的切换请求被丢弃
    busy: Cell<bool>,
}

impl Default for SheetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetManager {
    /// 创建容器
    pub fn new() -> Self {
        Self {
            tabs: RefCell::new(Vec::new()),
            selected: Cell::new(None),
            next_id: Cell::new(0),
            busy: Cell::new(false),
        }
    }

    /// 注册标签，返回分配的标识
    ///
    /// 注册时标签初始化为未选中（面板熄灭）。初始选中由调用方
    /// 在注册完成后显式 `select_tab`。
    pub fn register_tab(&self, tab: Rc<dyn SheetTab>) -> TabId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        tab.on_close_sheet();
        if let Some(sheet) = tab.sheet() {
            sheet.on_set_active(false);
        }
        self.tabs.borrow_mut().push((id, tab));
        id
    }

    /// 注销标签
    pub fn unregister_tab(&self, id: TabId) {
        self.tabs.borrow_mut().retain(|(tab_id, _)| *tab_id != id);
        if self.selected.get() == Some(id) {
            self.selected.set(None);
        }
    }

    /// 选中的标签
    pub fn selected_tab(&self) -> Option<TabId> {
        self.selected.get()
    }

    /// 注册的标签数
    pub fn tab_count(&self) -> usize {
        self.tabs.borrow().len()
    }

    fn tab(&self, id: TabId) -> Option<Rc<dyn SheetTab>> {
        self.tabs
            .borrow()
            .iter()
            .find(|(tab_id, _)| *tab_id == id)
            .map(|(_, tab)| tab.clone())
    }

    /// 切换标签
    ///
    /// 已选中时无动作；切换进行中时本次请求被丢弃（`Busy`）。
    /// 先等旧面板关闭、再打开新面板。
    pub async fn select_tab(&self, id: TabId) -> SheetSelectResult {
        if self.selected.get() == Some(id) {
            return SheetSelectResult::AlreadySelected;
        }
        let Some(new_tab) = self.tab(id) else {
            return SheetSelectResult::NotRegistered;
        };
        if self.busy.get() {
            warn!(id, "标签切换进行中，本次请求被丢弃");
            return SheetSelectResult::Busy;
        }
        self.busy.set(true);
        debug!(id, "切换标签");

        // 关闭当前面板
        if let Some(old_id) = self.selected.get() {
            if let Some(old_tab) = self.tab(old_id) {
                match old_tab.sheet() {
                    Some(sheet) => {
                        sheet.on_close().await;
                        old_tab.on_close_sheet();
                        sheet.on_set_active(false);
                    }
                    None => old_tab.on_close_sheet(),
                }
            }
        }

        self.selected.set(Some(id));

        // 打开新面板
        match new_tab.sheet() {
            Some(sheet) => {
                sheet.on_pre_open().await;
                sheet.on_set_active(true);
                new_tab.on_open_sheet();
                sheet.on_open().await;
            }
            None => new_tab.on_open_sheet(),
        }

        self.busy.set(false);
        SheetSelectResult::Selected
    }
}
