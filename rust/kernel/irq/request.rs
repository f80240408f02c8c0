// SPDX-License-Identifier: GPL-2.0
// SPDX-FileCopyrightText: Copyright 2025 Collabora ltd.

//! This module provides [`Registration`], which allows users to register a handler for a given
//! IRQ line and let the IRQ core decide in which context it runs.

use core::marker::PhantomPinned;

use crate::device::{Bound, Device};
use crate::devres::Devres;
use crate::error::Error;
use crate::irq::flags::Flags;
use crate::prelude::*;
use crate::str::CStr;

/// The value that can be returned from a [`Handler`].
#[repr(u32)]
pub enum IrqReturn {
    /// The interrupt was not from this device or was not handled.
    None = bindings::irqreturn_IRQ_NONE,

    /// The interrupt was handled by this device.
    Handled = bindings::irqreturn_IRQ_HANDLED,
}

/// The context the IRQ core picked for a [`Registration`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqContext {
    /// The handler runs in hard interrupt context.
    Hard,

    /// The handler runs nested in the threaded handler of the parent interrupt controller, e.g.
    /// the irq_chip of a PMIC sitting on a slow bus. It may take sleeping locks.
    Nested,
}

impl IrqContext {
    fn from_raw(ret: c_int) -> Result<Self> {
        match ret as u32 {
            bindings::IRQC_IS_HARDIRQ => Ok(Self::Hard),
            bindings::IRQC_IS_NESTED => Ok(Self::Nested),
            _ => Err(Error::from_errno(ret)),
        }
    }
}

/// Callbacks for an IRQ handler.
pub trait Handler: Sync {
    /// The IRQ handler.
    ///
    /// Depending on the [`IrqContext`] of the registration this is executed either in hard
    /// interrupt context or nested in a parent's IRQ thread; implementations must be fit for
    /// the former unless the line is known to be nested.
    fn handle(&self) -> IrqReturn;
}

/// # Invariants
///
/// - `self.irq` is the same as the one passed to `request_any_context_irq`.
/// - `cookie` was passed to `request_any_context_irq` as the cookie. It is guaranteed to be
///   unique by the type system, since each call to `new` will return a different instance of
///   `Registration`.
/// - `context` is what `request_any_context_irq` reported for `irq`.
#[pin_data(PinnedDrop)]
struct RegistrationInner {
    irq: u32,
    cookie: *mut c_void,
    context: IrqContext,
}

#[pinned_drop]
impl PinnedDrop for RegistrationInner {
    fn drop(self: Pin<&mut Self>) {
        // SAFETY:
        //
        // Safe as per the invariants of `RegistrationInner` and:
        //
        // - The containing struct is `!Unpin` and was initialized using
        // pin-init, so it occupied the same memory location for the entirety of
        // its lifetime.
        //
        // Notice that this will block until all handlers finish executing,
        // i.e.: at no point will &self be invalid while the handler is running.
        unsafe { bindings::free_irq(self.irq, self.cookie) };
    }
}

// SAFETY: We only use `inner` on drop, which called at most once with no
// concurrent access.
unsafe impl Sync for RegistrationInner {}

// SAFETY: It is safe to send `RegistrationInner` across threads.
unsafe impl Send for RegistrationInner {}

/// A request for an IRQ line for a given device.
///
/// # Invariants
///
/// - `irq` is the number of an interrupt source of `dev`.
/// - `irq` has not been registered yet.
pub struct IrqRequest<'a> {
    dev: &'a Device<Bound>,
    irq: u32,
}

impl<'a> IrqRequest<'a> {
    /// Creates a new IRQ request for the given device and IRQ number.
    ///
    /// # Safety
    ///
    /// - `irq` should be a valid IRQ number for `dev`.
    pub(crate) unsafe fn new(dev: &'a Device<Bound>, irq: u32) -> Self {
        // INVARIANT: `irq` is a valid IRQ number for `dev`.
        IrqRequest { dev, irq }
    }
}

/// A registration of an IRQ handler for a given IRQ line.
///
/// The line is requested with `request_any_context_irq()`: if the parent interrupt controller
/// demultiplexes its lines from a thread (typical for PMICs on I2C or SPI), the handler is run
/// nested in that thread, otherwise it runs in hard interrupt context. [`Registration::context`]
/// tells which one was picked.
///
/// # Examples
///
/// ```
/// use core::sync::atomic::{AtomicU32, Ordering};
/// use kernel::device::{Bound, Device};
/// use kernel::irq::{self, Flags, IrqContext, IrqRequest, IrqReturn, Registration};
/// use kernel::prelude::*;
/// use kernel::sync::Arc;
///
/// struct Counter(AtomicU32);
///
/// impl irq::Handler for Counter {
///     fn handle(&self) -> IrqReturn {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         IrqReturn::Handled
///     }
/// }
///
/// fn register_irq(
///     dev: &Device<Bound>,
///     request: IrqRequest<'_>,
/// ) -> Result<Arc<Registration<Counter>>> {
///     let registration = Registration::new(
///         request,
///         Flags::TRIGGER_NONE | Flags::ONESHOT | Flags::NO_AUTOEN,
///         c"my_device",
///         Counter(AtomicU32::new(0)),
///     );
///
///     let registration = Arc::pin_init(registration, GFP_KERNEL)?;
///
///     if registration.context()? == IrqContext::Hard {
///         return Err(EINVAL);
///     }
///     registration.enable(dev)?;
///
///     Ok(registration)
/// }
/// # Ok::<(), Error>(())
/// ```
///
/// # Invariants
///
/// * We own an irq handler using `&self.handler` as its private data.
#[pin_data]
pub struct Registration<T: Handler + 'static> {
    #[pin]
    inner: Devres<RegistrationInner>,

    #[pin]
    handler: T,

    /// Pinned because we need address stability so that we can pass a pointer
    /// to the callback.
    #[pin]
    _pin: PhantomPinned,
}

impl<T: Handler + 'static> Registration<T> {
    /// Registers the IRQ handler with the system for the given IRQ number.
    ///
    /// The line is freed when the device is unbound or the [`Registration`] is dropped,
    /// whichever comes first.
    pub fn new<'a>(
        request: IrqRequest<'a>,
        flags: Flags,
        name: &'static CStr,
        handler: impl PinInit<T, Error> + 'a,
    ) -> impl PinInit<Self, Error> + 'a {
        try_pin_init!(&this in Self {
            handler <- handler,
            inner <- Devres::new(
                request.dev,
                try_pin_init!(RegistrationInner {
                    // SAFETY: `this` is a valid pointer to the `Registration` instance
                    cookie: unsafe { &raw mut (*this.as_ptr()).handler }.cast(),
                    irq: request.irq,
                    context: {
                        // SAFETY:
                        // - The callbacks are valid for use with request_any_context_irq.
                        // - If this succeeds, the slot is guaranteed to be valid until the
                        //   destructor of Self runs, which will deregister the callbacks
                        //   before the memory location becomes invalid.
                        let ret = unsafe {
                            bindings::request_any_context_irq(
                                request.irq,
                                Some(handle_irq_callback::<T>),
                                flags.into_inner(),
                                name.as_char_ptr(),
                                (&raw mut (*this.as_ptr()).handler).cast(),
                            )
                        };

                        IrqContext::from_raw(ret).inspect_err(|e| {
                            dev_err!(
                                request.dev,
                                "Failed to request IRQ {} ({:?}): {:?}\n",
                                request.irq,
                                name,
                                e
                            );
                        })?
                    }
                })
            ),
            _pin: PhantomPinned,
        })
    }

    /// Returns the context the IRQ core runs the handler in.
    ///
    /// Fails with `ENODEV` once the device has been unbound and the line was freed.
    pub fn context(&self) -> Result<IrqContext> {
        self.inner.try_access_with(|inner| inner.context).ok_or(ENODEV)
    }

    /// Returns the IRQ number of the line, provided `dev` is the device it was requested for.
    pub fn irq(&self, dev: &Device<Bound>) -> Result<u32> {
        Ok(self.inner.access(dev)?.irq)
    }

    /// Enables a line requested with [`Flags::NO_AUTOEN`].
    ///
    /// Until then the handler does not run, which leaves room to check [`Self::context`] first.
    pub fn enable(&self, dev: &Device<Bound>) -> Result {
        let inner = self.inner.access(dev)?;

        // SAFETY: By the type invariants of `RegistrationInner`, `inner.irq` is requested and
        // stays so while `inner` is accessible.
        unsafe { bindings::enable_irq(inner.irq) };
        Ok(())
    }
}

/// # Safety
///
/// This function should be only used as the callback in `request_any_context_irq`.
unsafe extern "C" fn handle_irq_callback<T: Handler>(_irq: i32, ptr: *mut c_void) -> c_uint {
    // SAFETY: `ptr` is a pointer to T set in `Registration::new`
    let handler = unsafe { &*(ptr as *const T) };
    T::handle(handler) as c_uint
}

#[kunit_tests(rust_kernel_irq_request)]
mod tests {
    use super::*;

    #[test]
    fn context_decoding() {
        assert_eq!(
            IrqContext::from_raw(bindings::IRQC_IS_HARDIRQ as c_int),
            Ok(IrqContext::Hard)
        );
        assert_eq!(
            IrqContext::from_raw(bindings::IRQC_IS_NESTED as c_int),
            Ok(IrqContext::Nested)
        );
        assert_eq!(IrqContext::from_raw(-(bindings::EBUSY as c_int)), Err(EBUSY));
    }
}
