//! Core kernel traits.
//!
//! - `AnalysisKernel`: base trait exposing kernel metadata
//! - `BatchKernel`: async request/response wrapper around a pure computation
//!
//! The computations behind every kernel are plain functions over an input
//! series with no shared state, so callers are free to run kernels for
//! different animals or days concurrently.

use crate::error::Result;
use crate::kernel::KernelMetadata;
use async_trait::async_trait;
use std::fmt::Debug;

/// Base trait for all analysis kernels.
pub trait AnalysisKernel: Send + Sync + Debug {
    /// Returns the kernel metadata.
    fn metadata(&self) -> &KernelMetadata;

    /// Validate kernel configuration.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the kernel ID.
    fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Trait for batch kernels.
///
/// # Type Parameters
///
/// - `I`: Input message type
/// - `O`: Output message type
#[async_trait]
pub trait BatchKernel<I, O>: AnalysisKernel
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Execute the kernel with the given input.
    async fn execute(&self, input: I) -> Result<O>;

    /// Validate the input before execution.
    ///
    /// Override to provide custom input validation.
    fn validate_input(&self, _input: &I) -> Result<()> {
        Ok(())
    }

    /// Validate the kernel and the input, then execute.
    async fn execute_validated(&self, input: I) -> Result<O> {
        self.validate()?;
        self.validate_input(&input)?;
        self.execute(input).await
    }
}
