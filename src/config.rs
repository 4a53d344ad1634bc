//! 配置模块，负责加载 SQL 编译器使用的 JSON 模型配置

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 模型配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 从主表可以关联到的表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub table: String,
    /// `table` 上引用主表 `id` 的列
    pub foreign_key: String,
}

/// 属性路径到数据库表的映射
///
/// ```json
/// {
///   "base_table": "cube",
///   "relationships": {
///     "parent": { "table": "parents", "foreign_key": "cube_id" }
///   },
///   "case_insensitive": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_table: String,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
    /// 字符串比较时两侧都使用 `lower()`
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

fn default_case_insensitive() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_table: "records".to_string(),
            relationships: HashMap::new(),
            case_insensitive: true,
        }
    }
}

impl ModelConfig {
    pub fn new(base_table: impl Into<String>) -> Self {
        Self {
            base_table: base_table.into(),
            ..Default::default()
        }
    }

    pub fn with_relationship(
        mut self,
        name: impl Into<String>,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.relationships.insert(
            name.into(),
            Relationship {
                table: table.into(),
                foreign_key: foreign_key.into(),
            },
        );
        self
    }

    /// 从JSON文件加载模型配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "loaded model config");
        Ok(config)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }
}
