pub mod audit;
pub mod crawler;
pub mod error;
pub mod pool;
pub mod render;
pub mod result;
pub mod robots;
pub mod scope;
pub mod violations;

#[cfg(test)]
mod testing;

pub use audit::{AuditOptions, Auditor, RawAudit, RemoteAuditor};
pub use crawler::{Crawler, ProgressCallback};
pub use error::ScanError;
pub use pool::WorkerPool;
pub use render::{HttpRenderer, RenderOptions, RenderedPage, Renderer, WaitUntil};
pub use result::{Impact, PageAuditResult, PageMeta, ViolationNode, ViolationRecord};
pub use robots::RobotsRules;
pub use scope::ScopePolicy;
