// SPDX-License-Identifier: GPL-2.0

//! System sleep transition notifications.
//!
//! Drivers that need to change behaviour around a suspend or hibernation transition, rather than
//! in their own device's suspend/resume callbacks, subscribe to the PM notifier chain.
//!
//! C header: [`include/linux/suspend.h`](srctree/include/linux/suspend.h)

use crate::{
    bindings,
    device::Device,
    error::{to_result, Error},
    prelude::*,
    sync::Arc,
    types::Opaque,
};
use core::marker::PhantomPinned;

/// A system sleep transition, as reported to PM notifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Going to hibernate tasks.
    HibernationPrepare,
    /// Hibernation finished.
    PostHibernation,
    /// Going to suspend tasks.
    SuspendPrepare,
    /// Suspend finished.
    PostSuspend,
    /// Going to restore a saved image.
    RestorePrepare,
    /// Restore failed.
    PostRestore,
}

impl Event {
    /// Decodes a raw `PM_*` notifier action, returning `None` for values this kernel does not
    /// define.
    pub fn from_raw(mode: c_ulong) -> Option<Self> {
        let event = match u32::try_from(mode).ok()? {
            bindings::PM_HIBERNATION_PREPARE => Self::HibernationPrepare,
            bindings::PM_POST_HIBERNATION => Self::PostHibernation,
            bindings::PM_SUSPEND_PREPARE => Self::SuspendPrepare,
            bindings::PM_POST_SUSPEND => Self::PostSuspend,
            bindings::PM_RESTORE_PREPARE => Self::RestorePrepare,
            bindings::PM_POST_RESTORE => Self::PostRestore,
            _ => return None,
        };

        Some(event)
    }
}

/// Callbacks for a PM notifier.
pub trait Notifier: Sync {
    /// Called in process context for every system sleep transition.
    ///
    /// An error returned for one of the `*Prepare` events aborts the transition.
    fn notify(&self, event: Event) -> Result;
}

impl<T: ?Sized + Notifier + Send> Notifier for Arc<T> {
    fn notify(&self, event: Event) -> Result {
        T::notify(self, event)
    }
}

/// Encodes the result of a notifier callback the way `notifier_from_errno()` does.
fn notifier_result(res: Result) -> c_int {
    match res {
        Ok(()) => bindings::NOTIFY_DONE as c_int,
        Err(e) => {
            bindings::NOTIFY_STOP_MASK as c_int | (bindings::NOTIFY_OK as c_int - e.to_errno())
        }
    }
}

/// The registration of a PM notifier.
///
/// The notifier is added to the PM chain when the registration is initialised and removed when
/// it is dropped. Removal waits for a running callback to return.
///
/// # Examples
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use kernel::device::Device;
/// use kernel::prelude::*;
/// use kernel::suspend::{self, Event, NotifierRegistration};
///
/// struct Quiesce(AtomicBool);
///
/// impl suspend::Notifier for Quiesce {
///     fn notify(&self, event: Event) -> Result {
///         match event {
///             Event::SuspendPrepare => self.0.store(true, Ordering::Relaxed),
///             Event::PostSuspend => self.0.store(false, Ordering::Relaxed),
///             _ => {}
///         }
///         Ok(())
///     }
/// }
///
/// fn quiesce_on_suspend(dev: &Device) -> Result<Pin<KBox<NotifierRegistration<Quiesce>>>> {
///     KBox::pin_init(
///         NotifierRegistration::new(dev, Quiesce(AtomicBool::new(false))),
///         GFP_KERNEL,
///     )
/// }
/// ```
///
/// # Invariants
///
/// `nb` is registered with the PM notifier chain and its `notifier_call` is
/// [`Self::notifier_callback`].
#[pin_data(PinnedDrop)]
pub struct NotifierRegistration<T: Notifier + 'static> {
    #[pin]
    notifier: T,

    #[pin]
    nb: Opaque<bindings::notifier_block>,

    #[pin]
    _pin: PhantomPinned,
}

// SAFETY: The notifier block is only touched by the PM core under its own lock, and `T` is
// `Sync`.
unsafe impl<T: Notifier + Send + 'static> Send for NotifierRegistration<T> {}

// SAFETY: The PM core calls back with a shared `&T` from any thread, and `T` is `Sync`.
unsafe impl<T: Notifier + 'static> Sync for NotifierRegistration<T> {}

impl<T: Notifier + 'static> NotifierRegistration<T> {
    /// Registers `notifier` with the PM notifier chain on behalf of `dev`.
    ///
    /// `dev` is only used to log a failed registration.
    pub fn new<'a>(
        dev: &'a Device,
        notifier: impl PinInit<T, Error> + 'a,
    ) -> impl PinInit<Self, Error> + 'a {
        try_pin_init!(Self {
            notifier <- notifier,
            nb <- Opaque::try_ffi_init(|nb: *mut bindings::notifier_block| {
                // SAFETY: `try_ffi_init` guarantees that `nb` is valid for write.
                unsafe {
                    nb.write(bindings::notifier_block {
                        notifier_call: Some(Self::notifier_callback),
                        ..pin_init::zeroed()
                    })
                };

                // SAFETY: `nb` is initialised and stays pinned until `PinnedDrop::drop`
                // unregisters it.
                to_result(unsafe { bindings::register_pm_notifier(nb) })
                    .inspect_err(|e| dev_err!(dev, "Register pm notifier failed: {:?}\n", e))
            }),
            _pin: PhantomPinned,
        })
    }

    extern "C" fn notifier_callback(
        nb: *mut bindings::notifier_block,
        mode: c_ulong,
        _data: *mut c_void,
    ) -> c_int {
        // SAFETY: The PM core only calls this with the `notifier_block` embedded in a live
        // `NotifierRegistration<T>`, see the type invariants; `Opaque` is `repr(transparent)`.
        let this = unsafe {
            &*crate::container_of!(nb.cast::<Opaque<bindings::notifier_block>>(), Self, nb)
        };

        match Event::from_raw(mode) {
            Some(event) => notifier_result(this.notifier.notify(event)),
            None => bindings::NOTIFY_DONE as c_int,
        }
    }
}

#[pinned_drop]
impl<T: Notifier + 'static> PinnedDrop for NotifierRegistration<T> {
    fn drop(self: Pin<&mut Self>) {
        // SAFETY: By the type invariants `self.nb` is registered; the chain lock taken by
        // `unregister_pm_notifier` waits for a callback in flight.
        unsafe { bindings::unregister_pm_notifier(self.nb.get()) };
    }
}

#[kunit_tests(rust_kernel_suspend)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_events() {
        assert_eq!(
            Event::from_raw(bindings::PM_SUSPEND_PREPARE as c_ulong),
            Some(Event::SuspendPrepare)
        );
        assert_eq!(
            Event::from_raw(bindings::PM_POST_SUSPEND as c_ulong),
            Some(Event::PostSuspend)
        );
        assert_eq!(
            Event::from_raw(bindings::PM_RESTORE_PREPARE as c_ulong),
            Some(Event::RestorePrepare)
        );
        assert_eq!(Event::from_raw(0), None);
        assert_eq!(Event::from_raw(c_ulong::MAX), None);
    }

    #[test]
    fn notifier_errno_encoding() {
        assert_eq!(notifier_result(Ok(())), bindings::NOTIFY_DONE as c_int);

        let ret = notifier_result(Err(EBUSY));
        assert_ne!(ret & bindings::NOTIFY_STOP_MASK as c_int, 0);
        // `notifier_to_errno()` decoding.
        assert_eq!(
            (bindings::NOTIFY_OK as c_int) - (ret & !(bindings::NOTIFY_STOP_MASK as c_int)),
            EBUSY.to_errno()
        );
    }
}
