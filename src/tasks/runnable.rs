//! # Task-body abstraction and function-backed implementation.
//!
//! This module defines the [`Runnable`] trait (the opaque task-body contract)
//! and a convenient function-backed implementation [`RunnableFn`]. The common
//! handle type is [`RunnableRef`], an `Arc<dyn Runnable>` suitable for sharing
//! across the runtime.
//!
//! A task body receives the descriptor's current properties and may return a
//! replacement map; `Ok(None)` (or an empty map) means "no change".

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::descriptor::Properties;

/// Shared handle to a task body.
pub type RunnableRef = Arc<dyn Runnable>;

/// # Opaque task-body contract.
///
/// Invoked solely by the timer on fire. The call is isolated: errors and
/// panics are caught at the timer boundary, classified as failure outcomes,
/// and never stop recurrence.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use chronovisor::{Properties, Runnable, TaskError};
///
/// struct Report;
///
/// #[async_trait]
/// impl Runnable for Report {
///     async fn run(&self, props: &Properties) -> Result<Option<Properties>, TaskError> {
///         let _ = props.get("target");
///         // do work...
///         Ok(None) // keep properties unchanged
///     }
/// }
/// ```
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Executes one firing of the task body.
    ///
    /// Returns `Ok(Some(map))` to replace the descriptor's properties, or
    /// `Ok(None)` to leave them untouched.
    async fn run(&self, properties: &Properties) -> Result<Option<Properties>, TaskError>;
}

/// Function-backed task body.
///
/// Wraps a closure that *creates* a new future per firing, so there is no
/// hidden shared state between firings; share state explicitly with `Arc`
/// inside the closure when needed.
///
/// # Example
/// ```
/// use chronovisor::{Properties, RunnableFn, RunnableRef, TaskError};
///
/// let body: RunnableRef = RunnableFn::arc("ping", |props: Properties| async move {
///     let _ = props;
///     Ok::<_, TaskError>(None)
/// });
/// ```
pub struct RunnableFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> RunnableFn<F> {
    /// Creates a new function-backed task body.
    ///
    /// Prefer [`RunnableFn::arc`] when you immediately need a [`RunnableRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the body and returns it as a shared handle (`Arc<dyn Runnable>`).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Descriptive name (used in debug output only).
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<F, Fut> Runnable for RunnableFn<F>
where
    F: Fn(Properties) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<Option<Properties>, TaskError>> + Send + 'static,
{
    async fn run(&self, properties: &Properties) -> Result<Option<Properties>, TaskError> {
        (self.f)(properties.clone()).await
    }
}
