// SPDX-License-Identifier: GPL-2.0

//! Power key of the SpacemiT SPM8821 PMIC.
//!
//! The PMIC signals the key through four interrupt lines of its irq_chip: a falling edge when the
//! key is pressed, a rising edge when it is released, and two lines for its own short and long
//! press detection. Only the edges are reported to the input core, as `KEY_POWER`.
//!
//! Key-downs are not reported while the system is preparing to suspend, so that a press which
//! raced with the suspend request does not immediately abort it.

use kernel::{
    device::{self, Core},
    input::{self, BusType, EventType, Id, Key},
    irq::{self, IrqContext, IrqReturn},
    new_spinlock, of, platform,
    prelude::*,
    suspend::{self, Event},
    sync::{aref::ARef, Arc, SpinLock},
};

// Lines stay off until their dispatch context is checked, see `SpacemitPwrKey::probe`.
const IRQ_FLAGS: irq::Flags = irq::Flags::TRIGGER_NONE
    .union(irq::Flags::ONESHOT)
    .union(irq::Flags::NO_AUTOEN);

/// The interrupt lines of the power key, in the order of the device's `interrupts`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Line {
    Rise,
    Fall,
    ShortPress,
    LongPress,
}

impl Line {
    const ALL: [Line; 4] = [Line::Rise, Line::Fall, Line::ShortPress, Line::LongPress];

    fn index(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static CStr {
        match self {
            Line::Rise => c"spacemit_pwrkey_rise",
            Line::Fall => c"spacemit_pwrkey_fall",
            Line::ShortPress => c"spacemit_pwrkey_skey",
            Line::LongPress => c"spacemit_pwrkey_lkey",
        }
    }
}

/// What an interrupt line asks to be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Report {
    Press,
    Release,
}

#[derive(Debug, PartialEq, Eq)]
struct KeyState {
    /// Whether key-downs are reported. Cleared while a suspend is being prepared.
    report_event: bool,
    /// Whether a key-down was reported that has no key-up yet.
    fall_triggered: bool,
    /// Set once the driver is unbinding; PM events no longer re-enable reporting.
    unbound: bool,
}

impl KeyState {
    const fn new() -> Self {
        Self {
            report_event: true,
            fall_triggered: false,
            unbound: false,
        }
    }

    /// Returns whether a key-down is to be reported.
    fn on_fall(&mut self) -> bool {
        if self.report_event {
            self.fall_triggered = true;
        }
        self.report_event
    }

    /// Returns whether a key-up is to be reported.
    fn on_rise(&mut self) -> bool {
        core::mem::replace(&mut self.fall_triggered, false)
    }

    fn on_line(&mut self, line: Line) -> Option<Report> {
        match line {
            Line::Fall => self.on_fall().then_some(Report::Press),
            Line::Rise => self.on_rise().then_some(Report::Release),
            Line::ShortPress | Line::LongPress => None,
        }
    }

    fn on_pm_event(&mut self, event: Event) {
        match event {
            Event::SuspendPrepare => self.report_event = false,
            Event::PostSuspend => self.report_event = !self.unbound,
            _ => {}
        }
    }

    /// Stops reporting for good and returns whether a key-up is still owed.
    fn on_unbind(&mut self) -> bool {
        self.unbound = true;
        self.report_event = false;
        self.on_rise()
    }
}

/// State shared by the interrupt handlers and the PM notifier of one device.
#[pin_data]
struct PwrKey {
    #[pin]
    state: SpinLock<KeyState>,
    input: ARef<input::Device>,
    dev: ARef<device::Device>,
}

impl PwrKey {
    fn new(input: ARef<input::Device>, dev: ARef<device::Device>) -> impl PinInit<Self> {
        pin_init!(Self {
            state <- new_spinlock!(KeyState::new(), "PwrKey::state"),
            input,
            dev,
        })
    }

    fn handle_line(&self, line: Line) {
        let mut state = self.state.lock();

        match state.on_line(line) {
            Some(Report::Press) => {
                self.input.report_key(Key::POWER, true);
                self.input.sync();
                self.dev.stay_awake();
            }
            Some(Report::Release) => self.report_release(),
            None => dev_dbg!(self.dev, "{:?} irq ignored\n", line),
        }
    }

    fn report_release(&self) {
        self.input.report_key(Key::POWER, false);
        self.input.sync();
        self.dev.relax();
    }
}

impl suspend::Notifier for PwrKey {
    fn notify(&self, event: Event) -> Result {
        self.state.lock().on_pm_event(event);

        dev_dbg!(self.dev, "pm event {:?}\n", event);
        Ok(())
    }
}

struct PwrKeyIrq {
    key: Arc<PwrKey>,
    line: Line,
}

impl irq::Handler for PwrKeyIrq {
    fn handle(&self) -> IrqReturn {
        self.key.handle_line(self.line);
        IrqReturn::Handled
    }
}

#[pin_data]
struct SpacemitPwrKey {
    #[pin]
    rise: irq::Registration<PwrKeyIrq>,
    #[pin]
    fall: irq::Registration<PwrKeyIrq>,
    #[pin]
    short_press: irq::Registration<PwrKeyIrq>,
    #[pin]
    long_press: irq::Registration<PwrKeyIrq>,
    #[pin]
    pm_notifier: suspend::NotifierRegistration<Arc<PwrKey>>,
    key: Arc<PwrKey>,
}

impl SpacemitPwrKey {
    fn request_line<'a>(
        request: irq::IrqRequest<'a>,
        key: &Arc<PwrKey>,
        line: Line,
    ) -> impl PinInit<irq::Registration<PwrKeyIrq>, Error> + 'a {
        let handler = PwrKeyIrq {
            key: key.clone(),
            line,
        };

        irq::Registration::new(request, IRQ_FLAGS, line.name(), handler)
    }

    /// The key state lock is not taken with interrupts disabled, hence a line may only be
    /// enabled if it is dispatched from the PMIC's interrupt thread.
    fn enable_line(
        dev: &device::Device<Core>,
        line: Line,
        reg: &irq::Registration<PwrKeyIrq>,
    ) -> Result {
        match reg.context()? {
            IrqContext::Nested => reg.enable(dev),
            IrqContext::Hard => {
                dev_err!(dev, "{:?} irq is not nested in a threaded irq_chip\n", line);
                Err(EINVAL)
            }
        }
    }
}

kernel::of_device_table!(
    OF_TABLE,
    MODULE_OF_TABLE,
    <SpacemitPwrKey as platform::Driver>::IdInfo,
    [(of::DeviceId::new(c"pmic,pwrkey,spm8821"), ())]
);

impl platform::Driver for SpacemitPwrKey {
    type IdInfo = ();
    const OF_ID_TABLE: Option<of::IdTable<Self::IdInfo>> = Some(&OF_TABLE);

    fn probe(
        pdev: &platform::Device<Core>,
        _info: Option<&Self::IdInfo>,
    ) -> impl PinInit<Self, Error> {
        pin_init::pin_init_scope(move || {
            let dev = pdev.as_ref();

            let builder = input::Builder::new(dev)
                .inspect_err(|_| dev_err!(dev, "Can't allocate power button\n"))?;

            // Resolved before anything visible to userspace exists, as lookups defer probing
            // until the PMIC's irq_chip is up.
            let rise_irq = pdev.irq_by_index(Line::Rise.index())?;
            let fall_irq = pdev.irq_by_index(Line::Fall.index())?;
            let short_press_irq = pdev.irq_by_index(Line::ShortPress.index())?;
            let long_press_irq = pdev.irq_by_index(Line::LongPress.index())?;

            let input = builder
                .name(c"spacemit pwrkey")
                .phys(c"spacemit_pwrkey/input0")
                .id(Id::bus(BusType::Host))
                .capability(EventType::Key, Key::POWER.as_raw())
                .register()
                .inspect_err(|e| dev_err!(dev, "Can't register power button: {:?}\n", e))?;

            let key = Arc::pin_init(PwrKey::new(input, dev.into()), GFP_KERNEL)?;

            Ok(try_pin_init!(Self {
                rise <- Self::request_line(rise_irq, &key, Line::Rise),
                fall <- Self::request_line(fall_irq, &key, Line::Fall),
                short_press <- Self::request_line(short_press_irq, &key, Line::ShortPress),
                long_press <- Self::request_line(long_press_irq, &key, Line::LongPress),
                _: {
                    let lines = [&*rise, &*fall, &*short_press, &*long_press];
                    for (line, reg) in Line::ALL.into_iter().zip(lines) {
                        Self::enable_line(dev, line, reg)?;
                    }

                    dev.init_wakeup()?;
                    dev.set_wake_irq(&*fall)?;
                },
                pm_notifier <- suspend::NotifierRegistration::new(dev, key.clone()),
                key,
            }))
        })
    }

    // The lines and the notifier outlive this callback, so the state is latched as unbound.
    fn unbind(pdev: &platform::Device<Core>, this: Pin<&Self>) {
        let mut state = this.key.state.lock();

        if state.on_unbind() {
            dev_dbg!(pdev, "releasing held power key\n");
            this.key.report_release();
        }
    }
}

kernel::module_platform_driver! {
    type: SpacemitPwrKey,
    name: "spacemit-pmic-pwrkey",
    description: "SPACEMIT Power Key driver",
    license: "GPL v2",
}

#[kunit_tests(spacemit_pwrkey)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut state = KeyState::new();

        assert!(state.on_fall());
        assert!(state.fall_triggered);
        assert!(state.on_rise());
        assert_eq!(state, KeyState::new());
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut state = KeyState::new();

        assert!(!state.on_rise());
        assert_eq!(state, KeyState::new());
    }

    #[test]
    fn press_during_suspend_prepare() {
        let mut state = KeyState::new();

        state.on_pm_event(Event::SuspendPrepare);
        assert!(!state.on_fall());
        assert!(!state.fall_triggered);
        assert!(!state.on_rise());

        state.on_pm_event(Event::PostSuspend);
        assert!(state.on_fall());
    }

    #[test]
    fn release_after_suspend_prepare() {
        let mut state = KeyState::new();

        assert!(state.on_fall());
        state.on_pm_event(Event::SuspendPrepare);
        assert!(state.on_rise());
    }

    #[test]
    fn other_pm_events_are_ignored() {
        let mut state = KeyState::new();

        state.on_pm_event(Event::HibernationPrepare);
        state.on_pm_event(Event::RestorePrepare);
        assert!(state.report_event);

        state.on_pm_event(Event::SuspendPrepare);
        state.on_pm_event(Event::PostHibernation);
        assert!(!state.report_event);
    }

    #[test]
    fn repeated_press() {
        let mut state = KeyState::new();

        assert!(state.on_fall());
        assert!(state.on_fall());
        assert!(state.on_rise());
        assert!(!state.on_rise());
    }

    #[test]
    fn unbind_releases_held_key() {
        let mut state = KeyState::new();

        assert!(!state.on_unbind());

        let mut state = KeyState::new();
        assert!(state.on_fall());
        assert!(state.on_unbind());
        assert!(!state.on_fall());
    }

    #[test]
    fn post_suspend_after_unbind_keeps_reporting_off() {
        let mut state = KeyState::new();

        assert!(!state.on_unbind());
        state.on_pm_event(Event::SuspendPrepare);
        state.on_pm_event(Event::PostSuspend);

        assert_eq!(state.on_line(Line::Fall), None);
        assert!(!state.fall_triggered);
        assert_eq!(state.on_line(Line::Rise), None);
    }

    #[test]
    fn line_dispatch() {
        let mut state = KeyState::new();

        assert_eq!(state.on_line(Line::Fall), Some(Report::Press));
        assert_eq!(state.on_line(Line::ShortPress), None);
        assert_eq!(state.on_line(Line::LongPress), None);
        assert!(state.fall_triggered);
        assert_eq!(state.on_line(Line::Rise), Some(Report::Release));
        assert_eq!(state.on_line(Line::Rise), None);
        assert_eq!(state, KeyState::new());
    }

    #[test]
    fn short_and_long_press_leave_state_alone() {
        let mut state = KeyState::new();

        state.on_pm_event(Event::SuspendPrepare);
        assert_eq!(state.on_line(Line::ShortPress), None);
        assert_eq!(state.on_line(Line::LongPress), None);
        assert!(!state.report_event);
        assert!(!state.fall_triggered);
    }

    #[test]
    fn lines() {
        assert_eq!(Line::Rise.index(), 0);
        assert_eq!(Line::Fall.index(), 1);
        assert_eq!(Line::ShortPress.index(), 2);
        assert_eq!(Line::LongPress.index(), 3);
        assert_eq!(Line::Fall.name(), c"spacemit_pwrkey_fall");
    }

    #[test]
    fn lines_start_disabled() {
        assert!(IRQ_FLAGS.contains(irq::Flags::NO_AUTOEN));
        assert!(IRQ_FLAGS.contains(irq::Flags::ONESHOT));
    }
}
