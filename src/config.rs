//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKHIVE__*` 覆盖（双下划线表示嵌套，如 `TASKHIVE__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::GenerationParams;
use crate::observability::DEFAULT_TRACE_CAPACITY;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub web: WebSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub observability: ObservabilitySection,
}

/// [app] 段：应用名、任务目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 任务根目录，每个子目录是一个任务
    pub tasks_dir: PathBuf,
    /// 任务目录内的描述文件名
    pub description_file: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            tasks_dir: PathBuf::from("specialTasks"),
            description_file: "taskDescription.md".to_string(),
        }
    }
}

/// [web] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub host: String,
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// [llm] 段：后端选择、生成参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        let params = GenerationParams::default();
        Self {
            provider: "openai".to_string(),
            model: params.model,
            base_url: None,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [agent] 段：思考阶段最多执行的工具轮数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_tool_steps: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self { max_tool_steps: 3 }
    }
}

/// [observability] 段：进程内保留的 trace 数量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilitySection {
    pub trace_capacity: usize,
}

impl Default for ObservabilitySection {
    fn default() -> Self {
        Self {
            trace_capacity: DEFAULT_TRACE_CAPACITY,
        }
    }
}

/// [tools] 段：工具超时与中心上报
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub central: CentralSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            central: CentralSection::default(),
        }
    }
}

/// [tools.central] 段：上报地址与密钥所在的环境变量名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CentralSection {
    pub report_url: String,
    pub api_key_env: String,
}

impl Default for CentralSection {
    fn default() -> Self {
        Self {
            report_url: "https://centrala.ag3nts.org/report".to_string(),
            api_key_env: "CENTRAL_API_KEY".to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TASKHIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKHIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKHIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
