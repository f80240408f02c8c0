// SPDX-License-Identifier: GPL-2.0

//! Device wakeup sources and dedicated wake IRQs.
//!
//! C headers: [`include/linux/pm_wakeup.h`](srctree/include/linux/pm_wakeup.h) and
//! [`include/linux/pm_wakeirq.h`](srctree/include/linux/pm_wakeirq.h)

use crate::{
    bindings,
    device::{Bound, Device, DeviceContext},
    devres,
    error::to_result,
    irq::{Handler, Registration},
    prelude::*,
    sync::aref::ARef,
};

impl<Ctx: DeviceContext> Device<Ctx> {
    /// Notifies the PM core that a wakeup event is being processed for this device.
    ///
    /// The system does not enter suspend until a matching [`Device::relax`] call. Calls nest.
    /// Safe to call from any context, including hard interrupt context.
    pub fn stay_awake(&self) {
        // SAFETY: By the type invariant `self.as_raw()` is a valid pointer to a `struct device`.
        unsafe { bindings::pm_stay_awake(self.as_raw()) };
    }

    /// Notifies the PM core that processing of a wakeup event has ended.
    pub fn relax(&self) {
        // SAFETY: By the type invariant `self.as_raw()` is a valid pointer to a `struct device`.
        unsafe { bindings::pm_relax(self.as_raw()) };
    }
}

/// Undoes [`Device::init_wakeup`] when the device is unbound.
struct WakeupEnabled {
    dev: ARef<Device>,
}

impl Drop for WakeupEnabled {
    fn drop(&mut self) {
        // SAFETY: `self.dev` holds a reference, hence `as_raw()` is a valid `struct device`.
        unsafe {
            bindings::device_wakeup_disable(self.dev.as_raw());
            bindings::device_set_wakeup_capable(self.dev.as_raw(), false);
        }
    }
}

impl Device<Bound> {
    /// Marks the device as wakeup-capable and enables it as a wakeup source.
    ///
    /// Both are undone when the device is unbound.
    pub fn init_wakeup(&self) -> Result {
        // SAFETY: `self.as_raw()` is a valid pointer to a bound `struct device`.
        unsafe { bindings::device_set_wakeup_capable(self.as_raw(), true) };

        // SAFETY: `self.as_raw()` is a valid pointer to a bound `struct device`.
        if let Err(e) = to_result(unsafe { bindings::device_wakeup_enable(self.as_raw()) }) {
            // SAFETY: `self.as_raw()` is a valid pointer to a bound `struct device`.
            unsafe { bindings::device_set_wakeup_capable(self.as_raw(), false) };
            return Err(e);
        }

        devres::register(self, WakeupEnabled { dev: self.into() }, GFP_KERNEL)
    }

    /// Sets the line of `irq` as the wake IRQ of this device.
    ///
    /// The PM core arms it for wakeup when the system suspends, provided wakeup is enabled for the
    /// device. The association is cleared when the device is unbound.
    ///
    /// Fails with `EINVAL` if `irq` was requested for a different device.
    pub fn set_wake_irq<T: Handler + 'static>(&self, irq: &Registration<T>) -> Result {
        let irq = c_int::try_from(irq.irq(self)?)?;

        // SAFETY: `self.as_raw()` is a valid pointer to a bound `struct device` and `irq` is one
        // of its interrupt sources.
        to_result(unsafe { bindings::devm_pm_set_wake_irq(self.as_raw(), irq) })
    }
}
