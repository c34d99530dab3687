//! 任务目录
//!
//! 任务根目录下每个子目录即一个任务，目录内的描述文件（默认 taskDescription.md）为任务描述。
//! 列表顺序即目录遍历顺序；根目录不存在时返回空列表。

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::core::TaskError;

/// 描述文件缺失或不可读时的占位文本
pub const NO_DESCRIPTION: &str = "No description available";
/// 列表中描述的最大字符数
const SUMMARY_CHARS: usize = 150;

/// 任务摘要（GET /tasks 的列表项）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub description: String,
}

/// 超过 SUMMARY_CHARS 个字符时截断并追加 "..."
pub fn summarize(text: &str) -> String {
    if text.chars().count() > SUMMARY_CHARS {
        format!("{}...", text.chars().take(SUMMARY_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

pub struct TaskCatalog {
    root: PathBuf,
    description_file: String,
}

impl TaskCatalog {
    pub fn new(root: impl AsRef<Path>, description_file: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            description_file: description_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 列出全部任务及其截断描述
    pub async fn list_tasks(&self) -> Result<Vec<TaskSummary>, TaskError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(root = %self.root.display(), "tasks root missing, listing empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let description = match tokio::fs::read_to_string(entry.path().join(&self.description_file)).await {
                Ok(text) => summarize(&text),
                Err(e) => {
                    tracing::debug!(task = %name, error = %e, "task description unavailable");
                    NO_DESCRIPTION.to_string()
                }
            };
            tasks.push(TaskSummary { name, description });
        }

        tracing::debug!("Listed {} tasks", tasks.len());
        Ok(tasks)
    }

    /// 读取任务完整描述；任务目录或描述文件不存在时返回 NotFound
    pub async fn load_task_description(&self, name: &str) -> Result<String, TaskError> {
        let path = self
            .description_path(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TaskError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// 只接受单段普通路径作为任务名
    fn description_path(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {
                Some(self.root.join(name).join(&self.description_file))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog_with(tasks: &[(&str, Option<&str>)]) -> (TempDir, TaskCatalog) {
        let dir = TempDir::new().unwrap();
        for (name, description) in tasks {
            let task_dir = dir.path().join(name);
            std::fs::create_dir_all(&task_dir).unwrap();
            if let Some(text) = description {
                std::fs::write(task_dir.join("taskDescription.md"), text).unwrap();
            }
        }
        let catalog = TaskCatalog::new(dir.path(), "taskDescription.md");
        (dir, catalog)
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize("short"), "short");
        let exact = "a".repeat(150);
        assert_eq!(summarize(&exact), exact);
        let long = "b".repeat(151);
        assert_eq!(summarize(&long), format!("{}...", "b".repeat(150)));
        // 按字符计数，不拆分多字节字符
        let cjk = "任".repeat(200);
        assert_eq!(summarize(&cjk).chars().count(), 153);
    }

    #[tokio::test]
    async fn test_list_tasks_scenario() {
        let long = "x".repeat(200);
        let (dir, catalog) = catalog_with(&[("summarize", Some(&long)), ("unknown_dir", None)]);
        std::fs::write(dir.path().join("README.md"), "not a task").unwrap();

        let mut tasks = catalog.list_tasks().await.unwrap();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            tasks,
            vec![
                TaskSummary {
                    name: "summarize".to_string(),
                    description: format!("{}...", "x".repeat(150)),
                },
                TaskSummary {
                    name: "unknown_dir".to_string(),
                    description: NO_DESCRIPTION.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_root_lists_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = TaskCatalog::new(dir.path().join("absent"), "taskDescription.md");
        assert!(catalog.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_task_description() {
        let (_dir, catalog) = catalog_with(&[("summarize", Some("Summarize the text.")), ("empty", None)]);
        assert_eq!(
            catalog.load_task_description("summarize").await.unwrap(),
            "Summarize the text."
        );
        assert!(catalog.load_task_description("empty").await.unwrap_err().is_not_found());
        assert!(catalog.load_task_description("missing").await.unwrap_err().is_not_found());
        assert!(catalog.load_task_description("../summarize").await.unwrap_err().is_not_found());
        assert!(catalog.load_task_description("..").await.unwrap_err().is_not_found());
    }
}
