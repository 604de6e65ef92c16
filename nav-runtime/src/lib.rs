//! # Nav Runtime
//!
//! 页面 / 模态 / 标签页导航的核心运行时库。
//!
//! ## 架构概述
//!
//! `nav-runtime` 是纯逻辑核心，不依赖任何 IO 或渲染引擎。
//! 画面资源的解析通过 **加载器契约** 交给宿主层（Host）实现：
//!
//! ```text
//! Host                              Runtime
//!   │                                  │
//!   │◄── PageLoader::load_page ───────│ open_page()
//!   │                                  │ 生命周期遍历
//!   │◄── Page::on_pre_open / 淡入淡出 ─│
//!   │                                  │
//! ```
//!
//! 三种导航容器各自独立，可同时存在：
//!
//! - [`PageManager`]：带历史栈（返回 / 前进）的页面路由器，支持页面嵌套
//! - [`ModalManager`]：LIFO 模态栈，无返回 / 前进语义
//! - [`SheetManager`]：平铺的标签页容器，同时只有一个激活，无历史
//!
//! ## 并发模型
//!
//! 单线程协作式调度：所有迁移在同一逻辑线程上通过 await 让出，
//! 同一路由器内的迁移经由独占闸门严格排队，不会交错执行。
//! 因此句柄基于 [`std::rc::Rc`]，Future 均为非 `Send`。
//!
//! ## 模块结构
//!
//! - [`page`]：页面契约、生命周期遍历与页面路由器
//! - [`modal`]：模态窗口契约与模态栈管理器
//! - [`sheet`]：标签页容器
//! - [`payload`]：不透明参数载荷
//! - [`error`]：错误类型定义

pub mod error;
pub mod modal;
pub mod page;
pub mod payload;
pub mod sheet;

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;

/// 单线程协作模型下的装箱 Future（非 `Send`）
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// 页面 / 模态标识符的约束
///
/// 每个管理器实例以一组标识符为可导航目的地，作为缓存与历史栈的键。
/// 满足约束的类型（典型为无数据的枚举）自动实现。
pub trait NavKey: Copy + Eq + Hash + fmt::Debug + 'static {}

impl<T: Copy + Eq + Hash + fmt::Debug + 'static> NavKey for T {}

// 重导出核心类型
pub use error::{LoadError, LoadResult};
pub use modal::{
    ModalHandle, ModalId, ModalLoadState, ModalLoader, ModalManager, ModalOptions, ModalState,
    ModalWindow,
};
pub use page::{
    OwnerLink, Page, PageContext, PageFadeResult, PageLoader, PageManager, PageResult, PageState,
    PageTransition, RouterNode,
};
pub use payload::Payload;
pub use sheet::{Sheet, SheetManager, SheetSelectResult, SheetTab, TabId};
