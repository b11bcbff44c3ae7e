//! 配置文件读写与带注释生成。
//!
//! 配置以 YAML 存储。首次运行时写出带注释的默认配置；
//! 之后每次启动都会把用户文件缺失的字段用默认值补齐并写回，
//! 保证磁盘上的配置始终包含全部字段。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

/// 单个配置字段的元信息，用于生成带注释的 YAML。
#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

/// 可持久化的配置类型。
///
/// `fields()` 的顺序决定写出 YAML 时字段的排列顺序。
pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 读取配置；文件不存在时写出默认配置并返回默认值。
///
/// 传入 `None` 时使用当前目录下的 `T::FILE_NAME`。
pub fn load_or_create<T: ConfigSpec>(config_path: Option<&Path>) -> Result<T, ConfigError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(T::FILE_NAME));
    ensure_parent(&path)?;

    if !path.exists() {
        let defaults = T::default();
        write_with_comments(&defaults, &path)?;
        return Ok(defaults);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    let complete = has_all_fields::<T>(&user_yaml);

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    let config: T =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;

    // 用户文件缺字段时把补齐后的内容写回磁盘
    if !complete {
        write_with_comments(&config, &path)?;
    }

    Ok(config)
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    ensure_parent(path)?;
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }

    Ok(lines.join("\n"))
}

/// 顶层映射是否已包含全部已知字段。
fn has_all_fields<T: ConfigSpec>(user: &Value) -> bool {
    let Value::Mapping(map) = user else {
        return false;
    };
    T::fields()
        .iter()
        .all(|field| map.contains_key(Value::String(field.name.to_string())))
}

/// 把用户值递归合并进默认值，用户侧优先。
fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default = "default_count")]
        count: u32,
    }

    fn default_name() -> String {
        "demo".to_string()
    }

    fn default_count() -> u32 {
        3
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                name: default_name(),
                count: default_count(),
            }
        }
    }

    impl ConfigSpec for TestConfig {
        const FILE_NAME: &'static str = "test_config.yml";

        fn fields() -> &'static [FieldMeta] {
            &[
                FieldMeta {
                    name: "name",
                    description: "名称",
                },
                FieldMeta {
                    name: "count",
                    description: "数量",
                },
            ]
        }
    }

    #[test]
    fn creates_commented_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.yml");

        let cfg: TestConfig = load_or_create(Some(&path)).unwrap();
        assert_eq!(cfg.name, "demo");
        assert_eq!(cfg.count, 3);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("# 名称"));
        assert!(text.contains("# 数量"));
        assert!(text.contains("count: 3"));
    }

    #[test]
    fn merges_missing_fields_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.yml");
        fs::write(&path, "count: 9\n").unwrap();

        let cfg: TestConfig = load_or_create(Some(&path)).unwrap();
        assert_eq!(cfg.count, 9);
        assert_eq!(cfg.name, "demo");

        // 补齐后的文件应包含缺失过的字段
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("name: demo"));
        assert!(text.contains("count: 9"));
    }

    #[test]
    fn keeps_user_values_when_file_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.yml");
        fs::write(&path, "name: custom\ncount: 5\n").unwrap();

        let cfg: TestConfig = load_or_create(Some(&path)).unwrap();
        assert_eq!(cfg.name, "custom");
        assert_eq!(cfg.count, 5);
    }

    #[test]
    fn rejects_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.yml");
        fs::write(&path, "count: [unterminated\n").unwrap();

        let result: Result<TestConfig, ConfigError> = load_or_create(Some(&path));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
