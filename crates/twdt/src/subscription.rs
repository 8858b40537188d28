//! Scoped subscriptions that unsubscribe on drop.

use crate::controller::TaskWatchdog;
use crate::entity::{TaskId, UserHandle};
use crate::error::TwdtResult;

impl TaskWatchdog {
    /// Subscribe a named user for as long as the returned guard lives.
    ///
    /// # Errors
    ///
    /// Same as [`add_user`](Self::add_user).
    pub fn subscribe_user(&self, name: &str) -> TwdtResult<UserSubscription<'_>> {
        let handle = self.add_user(name)?;
        Ok(UserSubscription {
            watchdog: self,
            handle,
        })
    }

    /// Subscribe the calling task for as long as the returned guard lives.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn subscribe_current_task(&self) -> TwdtResult<TaskSubscription<'_>> {
        let task = self.platform().current_task();
        self.add(Some(task))?;
        Ok(TaskSubscription {
            watchdog: self,
            task,
        })
    }
}

/// A named user subscribed to a [`TaskWatchdog`]. Dropping it unsubscribes
/// the user.
#[derive(Debug)]
#[must_use = "the user is unsubscribed when the subscription is dropped"]
pub struct UserSubscription<'a> {
    watchdog: &'a TaskWatchdog,
    handle: UserHandle,
}

impl UserSubscription<'_> {
    /// Check in.
    ///
    /// # Errors
    ///
    /// Same as [`TaskWatchdog::reset_user`].
    pub fn feed(&self) -> TwdtResult<()> {
        self.watchdog.reset_user(self.handle)
    }

    /// Handle of the subscribed user.
    #[must_use]
    pub const fn handle(&self) -> UserHandle {
        self.handle
    }
}

impl Drop for UserSubscription<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.watchdog.delete_user(self.handle) {
            tracing::error!(user = %self.handle, error = %err, "Failed to unsubscribe watchdog user");
        }
    }
}

/// A task subscribed to a [`TaskWatchdog`]. Dropping it unsubscribes the
/// task.
#[derive(Debug)]
#[must_use = "the task is unsubscribed when the subscription is dropped"]
pub struct TaskSubscription<'a> {
    watchdog: &'a TaskWatchdog,
    task: TaskId,
}

impl TaskSubscription<'_> {
    /// Check in on behalf of the subscribed task.
    ///
    /// # Errors
    ///
    /// Same as [`TaskWatchdog::reset`].
    pub fn feed(&self) -> TwdtResult<()> {
        self.watchdog.reset_task(self.task)
    }

    /// The subscribed task.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }
}

impl Drop for TaskSubscription<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.watchdog.delete(Some(self.task)) {
            tracing::error!(task = %self.task, error = %err, "Failed to unsubscribe watchdog task");
        }
    }
}
