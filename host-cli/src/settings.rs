//! # Settings 模块
//!
//! 终端宿主的用户设置（与 CLI 参数分离，保存用户偏好）。

use serde::{Deserialize, Serialize};
use tracing::warn;

/// 用户设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// 淡入淡出的每帧延迟（毫秒）
    pub fade_frame_millis: u64,
    /// 淡入淡出的帧数
    pub fade_frames: u32,
    /// 章节列表的默认章节号
    pub default_chapter: u32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            fade_frame_millis: 40,
            fade_frames: 6,
            default_chapter: 1,
        }
    }
}

impl UserSettings {
    /// 从文件加载设置，失败时使用默认值
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(error = %e, "解析用户设置失败，使用默认值");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// 保存设置到文件
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = UserSettings::default();
        assert_eq!(settings.fade_frames, 6);
        assert_eq!(settings.default_chapter, 1);
    }

    #[test]
    fn test_settings_load_missing_file_uses_default() {
        let settings = UserSettings::load("does/not/exist.json");
        assert_eq!(settings.fade_frame_millis, 40);
    }

    #[test]
    fn test_settings_roundtrip() {
        let settings = UserSettings {
            fade_frame_millis: 10,
            fade_frames: 2,
            default_chapter: 3,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: UserSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.default_chapter, 3);
    }
}
