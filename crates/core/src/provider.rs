use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// State of one VM as reported by its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatus {
    pub name: String,
    pub state: String,
    pub running: bool,
}

/// A tool that owns the VM fleet, such as Vagrant.
///
/// Every call is slow; callers are expected to cache the result of
/// [`VmProvider::status`].
#[async_trait]
pub trait VmProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    async fn status(&self) -> Result<Vec<VmStatus>>;
    async fn up(&self, vm: &str) -> Result<()>;
    async fn halt(&self, vm: &str) -> Result<()>;
}
