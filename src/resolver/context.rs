//! Blog context switching
//!
//! Reads and writes on a multi-site installation happen against the
//! "current blog". `BlogScope` switches to a blog for the duration of a
//! piece of work and puts the previous blog back on every exit path.

use std::ops::{Deref, DerefMut};
use tracing::error;

use crate::error::TranscodeResult;

pub type BlogId = u64;

/// Capability to change the blog that reads and writes apply to
pub trait SiteContext {
    fn current_blog_id(&self) -> BlogId;

    /// Fails with `InconsistentLocationState` for an unknown blog
    fn switch_to_blog(&mut self, blog_id: BlogId) -> TranscodeResult<()>;

    /// Return to the blog active before the last switch
    fn restore_blog(&mut self) -> TranscodeResult<()>;
}

/// Guard holding a context switched to a blog
///
/// Switches only when the blog differs from the current one. Use `finish` to
/// observe a failed restore; dropping the guard restores too and logs the
/// failure.
pub struct BlogScope<'a, C: SiteContext + ?Sized> {
    context: &'a mut C,
    switched: bool,
    finished: bool,
}

impl<'a, C: SiteContext + ?Sized> BlogScope<'a, C> {
    pub fn enter(context: &'a mut C, blog_id: BlogId) -> TranscodeResult<Self> {
        let switched = context.current_blog_id() != blog_id;
        if switched {
            context.switch_to_blog(blog_id)?;
        }
        Ok(Self {
            context,
            switched,
            finished: false,
        })
    }

    pub fn finish(mut self) -> TranscodeResult<()> {
        self.finished = true;
        if self.switched {
            self.context.restore_blog()
        } else {
            Ok(())
        }
    }
}

impl<C: SiteContext + ?Sized> Deref for BlogScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.context
    }
}

impl<C: SiteContext + ?Sized> DerefMut for BlogScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.context
    }
}

impl<C: SiteContext + ?Sized> Drop for BlogScope<'_, C> {
    fn drop(&mut self) {
        if self.switched && !self.finished {
            if let Err(e) = self.context.restore_blog() {
                error!("Failed to restore blog context: {}", e);
            }
        }
    }
}

/// Run `work` with `context` switched to `blog_id`
///
/// The error of `work` wins over a restore error.
pub fn within_blog<C, T, F>(context: &mut C, blog_id: BlogId, work: F) -> TranscodeResult<T>
where
    C: SiteContext + ?Sized,
    F: FnOnce(&mut C) -> TranscodeResult<T>,
{
    let mut scope = BlogScope::enter(context, blog_id)?;
    let result = work(&mut *scope);
    let restored = scope.finish();

    match (result, restored) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(value), Ok(())) => Ok(value),
    }
}
