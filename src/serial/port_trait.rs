//! Trait abstraction for capture sources to enable testing without hardware

use super::{RawCapture, SerialSession};
use crate::error::Result;
use async_trait::async_trait;

/// Anything that can produce one raw capture of the VE.Direct stream
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptureSource: Send {
    /// Perform one bounded capture
    async fn capture(&mut self) -> Result<RawCapture>;
}

#[async_trait]
impl CaptureSource for SerialSession {
    async fn capture(&mut self) -> Result<RawCapture> {
        SerialSession::capture(self).await
    }
}
