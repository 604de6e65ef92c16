//! # Error 模块
//!
//! 定义 nav-runtime 中使用的错误类型。

use thiserror::Error;

/// 资源加载错误
///
/// 加载器契约（[`crate::PageLoader`] / [`crate::ModalLoader`]）的失败形态。
/// 页面加载失败会使迁移以 `Failed` 中止；模态加载失败直接返回给调用方。
#[derive(Error, Debug)]
pub enum LoadError {
    /// 页面资源加载失败
    #[error("页面资源加载失败: {reason}")]
    Page { reason: String },

    /// 模态资源加载失败
    #[error("模态资源加载失败: {reason}")]
    Modal { reason: String },

    /// 加载器内部错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    /// 创建页面加载错误
    pub fn page(reason: impl Into<String>) -> Self {
        Self::Page {
            reason: reason.into(),
        }
    }

    /// 创建模态加载错误
    pub fn modal(reason: impl Into<String>) -> Self {
        Self::Modal {
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type LoadResult<T> = Result<T, LoadError>;
