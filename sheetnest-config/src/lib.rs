use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "SHEETNEST_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub tessellation: TessellationConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.sheet.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `SHEETNEST_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        let current_dir = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(env::var_os(CONFIG_ENV).map(PathBuf::from), &current_dir)
    }

    /// `discover` 的可测试版本：显式给出环境变量取值与工作目录。
    pub fn discover_in(explicit: Option<PathBuf>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = dir.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 板材尺寸（毫米，亦即占位图栅格单元）与排样选项。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SheetConfig {
    #[serde(default = "SheetConfig::default_width")]
    pub width: usize,
    #[serde(default = "SheetConfig::default_height")]
    pub height: usize,
    #[serde(default = "SheetConfig::default_spacing")]
    pub spacing: usize,
    #[serde(default)]
    pub allow_mirror: bool,
}

impl SheetConfig {
    fn default_width() -> usize {
        1000
    }

    fn default_height() -> usize {
        500
    }

    fn default_spacing() -> usize {
        2
    }

    fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "板材尺寸必须为正（{}x{}）",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            spacing: Self::default_spacing(),
            allow_mirror: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TessellationConfig {
    /// 作业未声明单位时采用的 `$INSUNITS` 代码（4 = 毫米）。
    #[serde(default = "TessellationConfig::default_insunits")]
    pub insunits: i32,
}

impl TessellationConfig {
    fn default_insunits() -> i32 {
        4
    }
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            insunits: Self::default_insunits(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置文件 {path:?} 无效: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// 出错的配置文件路径；无法确定工作目录时为空。
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::Parse { path, .. } | Self::Invalid { path, .. } => {
                Some(path.as_path())
            }
            Self::Context { .. } => None,
        }
    }
}
