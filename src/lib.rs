//! Taskhive - Rust 智能体任务执行核心
//!
//! 模块划分：
//! - **agent**: 运行时装配（LLM、工具注册表、任务执行器）
//! - **api**: HTTP 接口（任务列表、任务执行、健康检查）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话状态与单写者状态存储
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息与工具结果文档
//! - **observability**: 日志初始化与追踪 span
//! - **react**: Planner 解析、Prompt 模板、think 步骤
//! - **tasks**: 任务目录与单任务状态机
//! - **tools**: 工具注册表、分派器与工具（api、central）

pub mod agent;
pub mod api;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tasks;
pub mod tools;
