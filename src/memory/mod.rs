//! 记忆层：对话消息与工具结果文档

pub mod conversation;
pub mod document;

pub use conversation::{Message, Role};
pub use document::{
    Document, DocumentFactory, DocumentMetadata, DocumentSource, DocumentType, Outcome,
    UNKNOWN_CONVERSATION,
};
