// SPDX-License-Identifier: GPL-2.0
// SPDX-FileCopyrightText: Copyright 2025 Collabora ltd.

use crate::bindings;
use crate::prelude::*;

/// Flags to be used when requesting an IRQ line.
///
/// Flags are combined with `|` at runtime, or with [`Flags::union`] where a `const` is needed,
/// e.g. for a driver-wide default:
///
/// ```
/// use kernel::irq::Flags;
///
/// const PMIC_IRQ: Flags = Flags::TRIGGER_NONE.union(Flags::ONESHOT);
///
/// assert!(PMIC_IRQ.contains(Flags::ONESHOT));
/// assert!(!PMIC_IRQ.contains(Flags::NO_AUTOEN));
/// ```
///
/// Lines demultiplexed by a PMIC or GPIO expander usually inherit their trigger type from the
/// parent irq_chip, hence [`Flags::TRIGGER_NONE`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Flags(c_ulong);

impl Flags {
    /// Use the interrupt line as already configured.
    pub const TRIGGER_NONE: Flags = Flags::new(bindings::IRQF_TRIGGER_NONE);

    /// Keep the line masked until the (possibly nested) threaded handler has run.
    pub const ONESHOT: Flags = Flags::new(bindings::IRQF_ONESHOT);

    /// Don't enable the IRQ automatically when it is requested, see
    /// [`Registration::enable`](super::Registration::enable).
    pub const NO_AUTOEN: Flags = Flags::new(bindings::IRQF_NO_AUTOEN);

    /// Combines two sets of flags in a `const` context.
    pub const fn union(self, other: Flags) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every flag set in `other` is also set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn into_inner(self) -> c_ulong {
        self.0
    }

    const fn new(value: u32) -> Self {
        build_assert!(value as u64 <= c_ulong::MAX as u64);
        Self(value as c_ulong)
    }
}

impl core::ops::BitOr for Flags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[kunit_tests(rust_kernel_irq_flags)]
mod tests {
    use super::*;

    #[test]
    fn trigger_none_is_empty() {
        assert_eq!(Flags::TRIGGER_NONE.into_inner(), 0);
        assert!(Flags::ONESHOT.contains(Flags::TRIGGER_NONE));
    }

    #[test]
    fn union_matches_bitor() {
        let a = Flags::ONESHOT.union(Flags::NO_AUTOEN);
        let b = Flags::ONESHOT | Flags::NO_AUTOEN;
        assert!(a == b);
        assert!(a.contains(Flags::NO_AUTOEN));
        assert!(!Flags::ONESHOT.contains(Flags::NO_AUTOEN));
    }
}
