// SPDX-License-Identifier: GPL-2.0

//! Input devices.
//!
//! This module allows drivers to register a `struct input_dev` and report events through it.
//! Devices are allocated as managed resources of their parent, i.e. they are unregistered and
//! freed once the parent device is unbound.
//!
//! C header: [`include/linux/input.h`](srctree/include/linux/input.h)

use crate::{
    bindings,
    device::{self, Bound},
    error::to_result,
    prelude::*,
    sync::aref::{ARef, AlwaysRefCounted},
    types::Opaque,
};
use core::{
    marker::PhantomData,
    ptr::{addr_of_mut, NonNull},
};

/// An input event type (`EV_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum EventType {
    /// Synchronization events.
    Syn = bindings::EV_SYN,
    /// Keys and buttons.
    Key = bindings::EV_KEY,
}

/// A key or button code (`KEY_*`, `BTN_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Key(u32);

impl Key {
    /// The power button.
    pub const POWER: Key = Key(bindings::KEY_POWER);

    /// Returns the raw code.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// The bus an input device is attached through (`BUS_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum BusType {
    /// A device integrated in the host, e.g. a SoC or PMIC block.
    Host = bindings::BUS_HOST as u16,
}

/// Identification of an input device, as exposed to userspace through `EVIOCGID`.
#[derive(Clone, Copy, Debug)]
pub struct Id {
    /// The bus type.
    pub bustype: BusType,
    /// Vendor id.
    pub vendor: u16,
    /// Product id.
    pub product: u16,
    /// Version.
    pub version: u16,
}

impl Id {
    /// An id with only the bus type set.
    pub const fn bus(bustype: BusType) -> Self {
        Self {
            bustype,
            vendor: 0,
            product: 0,
            version: 0,
        }
    }

    fn into_raw(self) -> bindings::input_id {
        bindings::input_id {
            bustype: self.bustype as u16,
            vendor: self.vendor,
            product: self.product,
            version: self.version,
        }
    }
}

/// An input device that has been allocated but not registered yet.
///
/// The device is a managed resource of `parent`: if the builder is dropped without calling
/// [`Builder::register`], the allocation is released when `parent` is unbound.
///
/// # Invariants
///
/// `self.dev` points to a valid `struct input_dev` allocated with `devm_input_allocate_device()`
/// which has not been registered.
///
/// # Examples
///
/// ```no_run
/// use kernel::c_str;
/// use kernel::device::{Bound, Device};
/// use kernel::input::{self, BusType, EventType, Id, Key};
/// use kernel::prelude::*;
/// use kernel::sync::aref::ARef;
///
/// fn setup(parent: &Device<Bound>) -> Result<ARef<input::Device>> {
///     let input = input::Builder::new(parent)?
///         .name(c_str!("example button"))
///         .phys(c_str!("example/input0"))
///         .id(Id::bus(BusType::Host))
///         .capability(EventType::Key, Key::POWER.as_raw())
///         .register()?;
///
///     input.report_key(Key::POWER, true);
///     input.sync();
///
///     Ok(input)
/// }
/// ```
pub struct Builder<'a> {
    dev: NonNull<bindings::input_dev>,
    _parent: PhantomData<&'a device::Device<Bound>>,
}

impl<'a> Builder<'a> {
    /// Allocates a new input device managed by `parent`.
    pub fn new(parent: &'a device::Device<Bound>) -> Result<Self> {
        // SAFETY: `parent.as_raw()` is a valid pointer to a bound `struct device`.
        let dev = unsafe { bindings::devm_input_allocate_device(parent.as_raw()) };

        // INVARIANT: `dev` is a fresh, unregistered, managed `struct input_dev`.
        Ok(Self {
            dev: NonNull::new(dev).ok_or(ENOMEM)?,
            _parent: PhantomData,
        })
    }

    /// Sets the name of the device, as shown in `/proc/bus/input/devices`.
    pub fn name(self, name: &'static CStr) -> Self {
        // SAFETY: By the type invariant `self.dev` is valid and not registered yet, hence we are
        // the only user. `name` outlives the device.
        unsafe { (*self.dev.as_ptr()).name = name.as_char_ptr() };
        self
    }

    /// Sets the physical path of the device in the system hierarchy.
    pub fn phys(self, phys: &'static CStr) -> Self {
        // SAFETY: See `Builder::name`.
        unsafe { (*self.dev.as_ptr()).phys = phys.as_char_ptr() };
        self
    }

    /// Sets the identification of the device.
    pub fn id(self, id: Id) -> Self {
        // SAFETY: By the type invariant `self.dev` is valid and not registered yet.
        unsafe { (*self.dev.as_ptr()).id = id.into_raw() };
        self
    }

    /// Marks the device as capable of emitting `code` events of type `ty`.
    pub fn capability(self, ty: EventType, code: u32) -> Self {
        // SAFETY: By the type invariant `self.dev` is valid and not registered yet.
        unsafe { bindings::input_set_capability(self.dev.as_ptr(), ty as c_uint, code) };
        self
    }

    /// Registers the device with the input core.
    ///
    /// The registration is undone when the parent device is unbound. The returned reference
    /// stays valid after that; events reported through it are then dropped by the input core.
    pub fn register(self) -> Result<ARef<Device>> {
        // SAFETY: By the type invariant `self.dev` is valid and not registered yet.
        to_result(unsafe { bindings::input_register_device(self.dev.as_ptr()) })?;

        // SAFETY: `self.dev` is a valid, registered `struct input_dev`, kept alive by devres at
        // least until `parent` is unbound; `into()` takes a reference of our own.
        Ok(unsafe { Device::from_raw(self.dev.as_ptr()) }.into())
    }
}

/// A registered input device.
///
/// # Invariants
///
/// A [`Device`] instance represents a valid `struct input_dev` that has been registered once. It
/// may have been unregistered since, together with its parent. Instances are always
/// reference-counted through the embedded `struct device`.
#[repr(transparent)]
pub struct Device(Opaque<bindings::input_dev>);

impl Device {
    /// # Safety
    ///
    /// `ptr` must point to a valid `struct input_dev` that stays alive for `'a`.
    unsafe fn from_raw<'a>(ptr: *mut bindings::input_dev) -> &'a Self {
        // SAFETY: `Device` is a transparent wrapper of `struct input_dev`; validity is guaranteed
        // by the caller.
        unsafe { &*ptr.cast() }
    }

    fn as_raw(&self) -> *mut bindings::input_dev {
        self.0.get()
    }

    /// Reports an event of type `ty`.
    ///
    /// May be called from any context, including hard interrupt context.
    pub fn event(&self, ty: EventType, code: u32, value: i32) {
        // SAFETY: By the type invariant `self.as_raw()` is a valid `struct input_dev`;
        // `input_event()` takes the device's event lock with interrupts disabled.
        unsafe { bindings::input_event(self.as_raw(), ty as c_uint, code, value) };
    }

    /// Reports the new state of `key`.
    pub fn report_key(&self, key: Key, pressed: bool) {
        self.event(EventType::Key, key.as_raw(), i32::from(pressed));
    }

    /// Marks the end of a batch of events.
    pub fn sync(&self) {
        self.event(EventType::Syn, bindings::SYN_REPORT, 0);
    }
}

// SAFETY: Instances of `Device` are always reference-counted.
unsafe impl AlwaysRefCounted for Device {
    fn inc_ref(&self) {
        // SAFETY: The existence of a shared reference guarantees that the refcount is non-zero.
        unsafe { bindings::get_device(addr_of_mut!((*self.as_raw()).dev)) };
    }

    unsafe fn dec_ref(obj: NonNull<Self>) {
        // CAST: `Self` is a transparent wrapper of `bindings::input_dev`.
        let input: *mut bindings::input_dev = obj.cast().as_ptr();

        // SAFETY: The safety requirements guarantee that the refcount is non-zero.
        unsafe { bindings::put_device(addr_of_mut!((*input).dev)) }
    }
}

impl AsRef<device::Device> for Device {
    fn as_ref(&self) -> &device::Device {
        // SAFETY: By the type invariant of `Self`, `self.as_raw()` is a pointer to a valid
        // `struct input_dev`.
        let dev = unsafe { addr_of_mut!((*self.as_raw()).dev) };

        // SAFETY: `dev` points to a valid `struct device`.
        unsafe { device::Device::from_raw(dev) }
    }
}

// SAFETY: A `Device` is always reference-counted and can be released from any thread.
unsafe impl Send for Device {}

// SAFETY: Reporting events is serialized by the input core's event lock.
unsafe impl Sync for Device {}

#[kunit_tests(rust_kernel_input)]
mod tests {
    use super::*;

    #[test]
    fn id_into_raw() {
        let raw = Id {
            vendor: 0x1234,
            ..Id::bus(BusType::Host)
        }
        .into_raw();

        assert_eq!(raw.bustype, bindings::BUS_HOST as u16);
        assert_eq!(raw.vendor, 0x1234);
        assert_eq!(raw.product, 0);
        assert_eq!(raw.version, 0);
    }

    #[test]
    fn key_codes() {
        assert_eq!(Key::POWER.as_raw(), bindings::KEY_POWER);
        assert_eq!(EventType::Key as u32, bindings::EV_KEY);
        assert_eq!(EventType::Syn as u32, bindings::EV_SYN);
    }
}
