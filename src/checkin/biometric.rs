use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::IdentitySummary;
use crate::error::Result;

/// Identity capture run in the first step of the verified check-in flow.
#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    async fn capture(&self, identity: &IdentitySummary) -> Result<()>;
}

/// Face capture stand-in: waits, then always succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedFaceCapture {
    delay: Duration,
}

impl SimulatedFaceCapture {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedFaceCapture {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl BiometricVerifier for SimulatedFaceCapture {
    async fn capture(&self, identity: &IdentitySummary) -> Result<()> {
        debug!("Simulating face capture for {}", identity.name);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
