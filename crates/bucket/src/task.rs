//! Task Context
//!
//! Every repository operation is spawned onto a [`TaskContext`] as soon as it
//! is called. The caller gets a [`RepoTask`] back and may await it, wrap it in
//! a timeout, or drop it. Dropping does not cancel the spawned work.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{BucketError, Result};

/// Runtime handle shared by all repositories of one registry.
#[derive(Debug, Clone)]
pub struct TaskContext {
    handle: Handle,
}

impl TaskContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Context bound to the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }

    pub fn spawn<T, F>(&self, future: F) -> RepoTask<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        RepoTask {
            state: State::Running(self.handle.spawn(future)),
        }
    }
}

/// Eventual result of a repository operation.
#[must_use = "a RepoTask reports its outcome only when awaited"]
pub struct RepoTask<T> {
    state: State<T>,
}

enum State<T> {
    Ready(Option<Result<T>>),
    Running(JoinHandle<Result<T>>),
}

// No structural pinning: the inner value is only ever moved out.
impl<T> Unpin for RepoTask<T> {}

impl<T> RepoTask<T> {
    /// Already-completed task, used for failures found before dispatch.
    pub fn ready(result: Result<T>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    pub fn failed(error: BucketError) -> Self {
        Self::ready(Err(error))
    }

    /// True when the task was resolved without being spawned.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }
}

impl<T> Future for RepoTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Ready(slot) => Poll::Ready(slot.take().unwrap_or_else(|| {
                Err(BucketError::internal("RepoTask polled after completion"))
            })),
            State::Running(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.map_err(BucketError::from).and_then(|result| result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawned_task_resolves() {
        let tasks = TaskContext::current().unwrap();
        let task = tasks.spawn(async { Ok(7_u64) });
        assert!(!task.is_ready());
        assert_eq!(task.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_failed_task_is_ready() {
        let task: RepoTask<bool> = RepoTask::failed(BucketError::NotConnected);
        assert!(task.is_ready());
        assert!(matches!(task.await, Err(BucketError::NotConnected)));
    }

    #[tokio::test]
    async fn test_panicking_task_surfaces_as_task_error() {
        let tasks = TaskContext::current().unwrap();
        let task: RepoTask<()> = tasks.spawn(async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        assert!(matches!(task.await, Err(BucketError::Task(_))));
    }

    #[test]
    fn test_current_without_runtime_fails() {
        assert!(matches!(TaskContext::current(), Err(BucketError::Runtime(_))));
    }
}
