//! # Payload 模块
//!
//! 打开页面 / 模态时传递的不透明参数载荷。
//!
//! ## 设计说明
//!
//! - 调用方与页面实现之间的参数对运行时来说完全不透明
//! - 历史栈中会保存参数副本（返回 / 前进时原样重放），因此要求可廉价克隆
//! - 页面实现侧通过 [`Payload::downcast_ref`] 取回具体类型

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// 不透明参数载荷
///
/// 语义上等价于"可能为空的任意值"。克隆只复制引用。
#[derive(Clone, Default)]
pub struct Payload(Option<Rc<dyn Any>>);

impl Payload {
    /// 包装一个值
    pub fn new<T: 'static>(value: T) -> Self {
        Self(Some(Rc::new(value)))
    }

    /// 空载荷
    pub fn none() -> Self {
        Self(None)
    }

    /// 是否为空
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// 按具体类型取回引用；类型不匹配或为空时返回 None
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Payload(..)"),
            None => f.write_str("Payload(none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let payload = Payload::new(String::from("chapter-3"));
        assert!(!payload.is_none());
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "chapter-3");
        // 类型不匹配
        assert!(payload.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_payload_none() {
        let payload = Payload::none();
        assert!(payload.is_none());
        assert!(payload.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_payload_clone_shares_value() {
        let payload = Payload::new(7u32);
        let cloned = payload.clone();
        assert_eq!(cloned.downcast_ref::<u32>(), Some(&7));
    }
}
