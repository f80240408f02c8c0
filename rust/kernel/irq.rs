// SPDX-License-Identifier: GPL-2.0

//! IRQ abstractions.
//!
//! An IRQ is an interrupt request from a device. It is used to get the CPU's
//! attention so it can service a hardware event in a timely manner.
//!
//! Lines are requested with `request_any_context_irq()`, so the same driver works whether its
//! interrupts come straight from the SoC interrupt controller or are demultiplexed by a PMIC's
//! threaded irq_chip.
//!
//! C header: [`include/linux/interrupt.h`](srctree/include/linux/interrupt.h)

/// Flags to be used when registering IRQ handlers.
mod flags;

/// IRQ allocation and handling.
mod request;

pub use flags::Flags;

pub use request::{Handler, IrqContext, IrqRequest, IrqReturn, Registration};
