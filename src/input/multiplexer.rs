//! Stateful rewriter applied to every batch of a device loop.
//!
//! Each policy is independent and may replace an event, suppress it or add
//! new events. Added events come before the passthrough events of a batch.
//! Delayed events are kept in a min-heap and released once their deadline
//! passes.
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    time::{Duration, Instant},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    emitter::Emitter,
    event::{AxisCode, ButtonCode, ConfigCode, Event, LedEvent, RumbleEvent, Scalar, Side, SpecialKind},
};

pub const QAM_DELAY: Duration = Duration::from_millis(200);
pub const QAM_HOLD_TIME: Duration = Duration::from_millis(400);
pub const QAM_MULTI_PRESS_DELAY: Duration = Duration::from_millis(200);
pub const REBOOT_HOLD: Duration = Duration::from_secs(9);
pub const REBOOT_VIBRATION_ON: Duration = Duration::from_millis(400);
pub const REBOOT_VIBRATION_OFF: Duration = Duration::from_millis(1200);
pub const REBOOT_VIBRATION_NUM: u32 = 3;
pub const STARTSELECT_TRIGGER_THRESHOLD: f32 = 0.6;
pub const TOUCHPAD_TAP_TIME: Duration = Duration::from_millis(200);
pub const TOUCHPAD_TAP_TRAVEL: f32 = 0.04;
pub const TOUCHPAD_HOLD_TIME: Duration = Duration::from_millis(800);
pub const TOUCHPAD_HOLD_TRAVEL: f32 = 0.13;
pub const XBOX_B_MAX_PRESS: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SwapGuide {
    GuideIsStart,
    GuideIsSelect,
    StartIsKeyboard,
    SelectIsGuide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    AnalogToDiscrete,
    DiscreteToAnalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DpadMode {
    AnalogToDiscrete,
    DiscreteToAnalog,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedRouting {
    LeftToMain,
    RightToMain,
    MainToSides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusRouting {
    BothToMain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImuRouting {
    LeftToMain,
    RightToMain,
    MainToSides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TouchpadAction {
    #[default]
    Disabled,
    LeftClick,
    RightClick,
}

impl TouchpadAction {
    fn button(&self) -> Option<ButtonCode> {
        match self {
            TouchpadAction::Disabled => None,
            TouchpadAction::LeftClick => Some(ButtonCode::TouchpadLeft),
            TouchpadAction::RightClick => Some(ButtonCode::TouchpadRight),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StartSelectChord {
    #[default]
    Disabled,
    /// Select plus another button sends guide plus that button
    Select,
    StartSelect,
}

/// Policies of a [Multiplexer]. The default configuration passes events
/// through unchanged, except that a right touchpad click becomes a left
/// click ([TouchpadAction::LeftClick]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct MultiplexerConfig {
    pub swap_guide: Option<SwapGuide>,
    pub trigger: Option<TriggerMode>,
    pub trigger_discrete_lvl: f32,
    pub dpad: Option<DpadMode>,
    pub led: Option<LedRouting>,
    pub status: Option<StatusRouting>,
    pub imu: Option<ImuRouting>,
    pub share_to_qam: bool,
    pub qam_button: Option<ButtonCode>,
    pub qam_multi_tap: bool,
    pub touchpad_short: TouchpadAction,
    pub touchpad_right: TouchpadAction,
    pub touchpad_hold: TouchpadAction,
    pub r3_to_share: bool,
    pub select_reboots: bool,
    pub nintendo_mode: bool,
    pub startselect_chord: StartSelectChord,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            swap_guide: None,
            trigger: None,
            trigger_discrete_lvl: 0.99,
            dpad: None,
            led: None,
            status: None,
            imu: None,
            share_to_qam: false,
            qam_button: None,
            qam_multi_tap: true,
            touchpad_short: TouchpadAction::Disabled,
            touchpad_right: TouchpadAction::LeftClick,
            touchpad_hold: TouchpadAction::Disabled,
            r3_to_share: false,
            select_reboots: false,
            nintendo_mode: false,
            startselect_chord: StartSelectChord::Disabled,
        }
    }
}

impl MultiplexerConfig {
    /// The button acting as the quick access menu button
    fn qam_button(&self) -> Option<ButtonCode> {
        if self.share_to_qam {
            return Some(ButtonCode::Share);
        }
        self.qam_button
    }
}

/// An entry of the delay queue
#[derive(Debug)]
enum Delayed {
    Event(Event),
    /// Rumble of the reboot warning, dropped if the button is released
    RebootRumble(RumbleEvent),
    Reboot,
}

#[derive(Debug)]
struct Scheduled {
    deadline: Instant,
    seq: u64,
    item: Delayed,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the binary heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChordState {
    Wait,
    Pressed,
}

#[derive(Debug, Clone, Copy)]
struct TouchDown {
    at: Instant,
    x: f32,
    y: f32,
    still: bool,
}

/// Rewrites batches of events according to a [MultiplexerConfig]
#[derive(Debug)]
pub struct Multiplexer {
    config: MultiplexerConfig,
    emitter: Option<Emitter>,
    queue: BinaryHeap<Scheduled>,
    seq: u64,
    state: HashMap<ConfigCode, Scalar>,
    touchpad_x: f32,
    touchpad_y: f32,
    touchpad_down: Option<TouchDown>,
    reboot_pressed: Option<Instant>,
    reboot_held: bool,
    select_held: bool,
    guide_pressed: bool,
    xbox_b_pressed: Option<Instant>,
    startselect: Option<ChordState>,
    qam_pressed: Option<Instant>,
    qam_released: Option<Instant>,
    qam_times: u32,
    qam_pre_sent: bool,
}

impl Multiplexer {
    pub fn new(config: MultiplexerConfig, emitter: Option<Emitter>) -> Self {
        Self {
            config,
            emitter,
            queue: BinaryHeap::new(),
            seq: 0,
            state: HashMap::new(),
            touchpad_x: 0.0,
            touchpad_y: 0.0,
            touchpad_down: None,
            reboot_pressed: None,
            reboot_held: false,
            select_held: false,
            guide_pressed: false,
            xbox_b_pressed: None,
            startselect: None,
            qam_pressed: None,
            qam_released: None,
            qam_times: 0,
            qam_pre_sent: false,
        }
    }

    pub fn config(&self) -> &MultiplexerConfig {
        &self.config
    }

    /// Number of events waiting for their deadline
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn schedule(&mut self, deadline: Instant, item: Delayed) {
        self.seq += 1;
        self.queue.push(Scheduled {
            deadline,
            seq: self.seq,
            item,
        });
    }

    fn schedule_event(&mut self, deadline: Instant, event: Event) {
        self.schedule(deadline, Delayed::Event(event));
    }

    /// Queue the guide plus `button` chord used to open the quick access
    /// menu
    fn qam_chord(&mut self, out: &mut Vec<Event>, now: Instant) {
        out.push(Event::button(ButtonCode::Mode, true));
        self.schedule_event(now + QAM_DELAY, Event::button(ButtonCode::A, true));
        self.schedule_event(now + 2 * QAM_DELAY, Event::button(ButtonCode::A, false));
        self.schedule_event(now + 2 * QAM_DELAY, Event::button(ButtonCode::Mode, false));
    }

    fn special(&self, kind: SpecialKind) {
        if let Some(emitter) = self.emitter.as_ref() {
            emitter.special(kind);
        }
    }

    /// Rewrite a batch of events
    pub fn process(&mut self, events: Vec<Event>, now: Instant) -> Vec<Event> {
        let mut out = Vec::with_capacity(events.len());
        self.drain_queue(&mut out, now);
        self.check_timers(now);

        let mut touched = false;
        let mut status = Vec::new();
        let mut passthrough = Vec::with_capacity(events.len());
        for event in events {
            let event = match event {
                Event::Axis { code, value } => self.process_axis(code, value, &mut out, now),
                Event::Button { code, value } => {
                    if code == ButtonCode::TouchpadTouch && value {
                        touched = true;
                    }
                    self.process_button(code, value, &mut out, now)
                }
                Event::Led(led) => self.process_led(led, &mut out),
                Event::Configuration { code, value } => {
                    self.process_status(code, value, &mut status);
                    Event::Configuration { code, value }
                }
                event => event,
            };
            if !event.is_suppressed() {
                passthrough.push(event);
            }
        }

        if touched {
            self.touchpad_down = Some(TouchDown {
                at: now,
                x: self.touchpad_x,
                y: self.touchpad_y,
                still: true,
            });
        }

        for code in status {
            out.push(self.status_event(code));
        }
        out.extend(passthrough);

        self.apply_qam(&mut out, now);

        if let Some(emitter) = self.emitter.as_ref() {
            out.extend(emitter.inject_recv());
        }
        out
    }

    fn drain_queue(&mut self, out: &mut Vec<Event>, now: Instant) {
        while self.queue.peek().is_some_and(|s| s.deadline <= now) {
            let Some(scheduled) = self.queue.pop() else {
                break;
            };
            match scheduled.item {
                Delayed::Event(event) => out.push(event),
                Delayed::RebootRumble(rumble) => {
                    if self.reboot_held {
                        out.push(Event::Rumble(rumble));
                    }
                }
                Delayed::Reboot => {
                    if self.reboot_held {
                        log::info!("Reboot button held, rebooting");
                        self.special(SpecialKind::Reboot);
                    }
                }
            }
        }
    }

    fn check_timers(&mut self, now: Instant) {
        if let Some(pressed) = self.reboot_pressed {
            if now.duration_since(pressed) > REBOOT_HOLD {
                self.reboot_pressed = None;
                let period = REBOOT_VIBRATION_ON + REBOOT_VIBRATION_OFF;
                for i in 0..REBOOT_VIBRATION_NUM {
                    let start = now + period * i;
                    self.schedule(start, Delayed::RebootRumble(RumbleEvent::new(1.0, 1.0)));
                    self.schedule(
                        start + REBOOT_VIBRATION_ON,
                        Delayed::RebootRumble(RumbleEvent::new(0.0, 0.0)),
                    );
                }
                self.schedule(now + period * REBOOT_VIBRATION_NUM, Delayed::Reboot);
            }
        }

        let Some(down) = self.touchpad_down.as_mut() else {
            return;
        };
        match self.config.touchpad_hold.button() {
            Some(action) if down.still && now.duration_since(down.at) > TOUCHPAD_HOLD_TIME => {
                self.touchpad_down = None;
                self.schedule_event(now, Event::button(action, true));
                self.schedule_event(now + QAM_DELAY, Event::button(action, false));
            }
            _ => {
                if (down.x - self.touchpad_x).abs() > TOUCHPAD_HOLD_TRAVEL
                    || (down.y - self.touchpad_y).abs() > TOUCHPAD_HOLD_TRAVEL
                {
                    down.still = false;
                }
            }
        }
    }

    fn process_axis(&mut self, code: AxisCode, value: f32, out: &mut Vec<Event>, now: Instant) -> Event {
        let code = match self.config.imu {
            Some(ImuRouting::LeftToMain) => code.left_to_main().unwrap_or(code),
            Some(ImuRouting::RightToMain) => code.right_to_main().unwrap_or(code),
            Some(ImuRouting::MainToSides) => match code.main_to_sides() {
                Some((left, right)) => {
                    out.push(Event::axis(right, value));
                    left
                }
                None => code,
            },
            None => code,
        };

        let chord_axis = matches!(
            code,
            AxisCode::Lt | AxisCode::Rt | AxisCode::HatX | AxisCode::HatY
        );
        if self.startselect == Some(ChordState::Wait)
            && chord_axis
            && value.abs() > STARTSELECT_TRIGGER_THRESHOLD
        {
            out.push(Event::button(ButtonCode::Mode, true));
            self.startselect = Some(ChordState::Pressed);
        }
        if self.startselect == Some(ChordState::Pressed) {
            self.schedule_event(now + QAM_DELAY, Event::axis(code, value));
            return Event::Suppressed;
        }

        if self.config.trigger == Some(TriggerMode::AnalogToDiscrete) {
            let button = match code {
                AxisCode::Lt => Some(ButtonCode::Lt),
                AxisCode::Rt => Some(ButtonCode::Rt),
                _ => None,
            };
            if let Some(button) = button {
                out.push(Event::button(button, value > self.config.trigger_discrete_lvl));
            }
        }

        if matches!(
            self.config.dpad,
            Some(DpadMode::AnalogToDiscrete) | Some(DpadMode::Both)
        ) {
            let pair = match code {
                AxisCode::HatX => Some((ButtonCode::DpadRight, ButtonCode::DpadLeft)),
                AxisCode::HatY => Some((ButtonCode::DpadDown, ButtonCode::DpadUp)),
                _ => None,
            };
            if let Some((positive, negative)) = pair {
                out.push(Event::button(positive, value > 0.5));
                out.push(Event::button(negative, value < -0.5));
            }
        }

        match code {
            AxisCode::TouchpadX => self.touchpad_x = value,
            AxisCode::TouchpadY => self.touchpad_y = value,
            _ => (),
        }
        Event::axis(code, value)
    }

    fn swap_guide(&self, code: ButtonCode) -> ButtonCode {
        let Some(swap) = self.config.swap_guide else {
            return code;
        };
        match (code, swap) {
            (ButtonCode::Start, SwapGuide::StartIsKeyboard) => ButtonCode::Keyboard,
            (ButtonCode::Start, SwapGuide::SelectIsGuide) => ButtonCode::Share,
            (ButtonCode::Start, _) => ButtonCode::Mode,
            (ButtonCode::Select, SwapGuide::StartIsKeyboard | SwapGuide::SelectIsGuide) => {
                ButtonCode::Mode
            }
            (ButtonCode::Select, _) => ButtonCode::Share,
            (ButtonCode::Mode, SwapGuide::GuideIsStart) => ButtonCode::Start,
            (ButtonCode::Mode, _) => ButtonCode::Select,
            (ButtonCode::Share, SwapGuide::StartIsKeyboard) => ButtonCode::Share,
            (ButtonCode::Share, SwapGuide::GuideIsStart) => ButtonCode::Select,
            (ButtonCode::Share, _) => ButtonCode::Start,
            (ButtonCode::Keyboard, SwapGuide::StartIsKeyboard) => ButtonCode::Start,
            (code, _) => code,
        }
    }

    fn process_button(
        &mut self,
        code: ButtonCode,
        value: bool,
        out: &mut Vec<Event>,
        now: Instant,
    ) -> Event {
        if self.config.trigger == Some(TriggerMode::DiscreteToAnalog) {
            match code {
                ButtonCode::Lt => out.push(Event::axis(AxisCode::Lt, value as u8 as f32)),
                ButtonCode::Rt => out.push(Event::axis(AxisCode::Rt, value as u8 as f32)),
                _ => (),
            }
        }

        if code == ButtonCode::Select {
            self.select_held = value;
        }
        if self.config.select_reboots && code == ButtonCode::Select {
            self.reboot_pressed = value.then_some(now);
            self.reboot_held = value;
        }

        let mut code = self.swap_guide(code);

        let chord_button = match self.config.startselect_chord {
            StartSelectChord::Disabled => false,
            StartSelectChord::Select => code == ButtonCode::Select,
            StartSelectChord::StartSelect => {
                code == ButtonCode::Select || code == ButtonCode::Start
            }
        };
        if chord_button {
            if self.startselect == Some(ChordState::Pressed) {
                self.schedule_event(now + QAM_DELAY, Event::button(ButtonCode::Mode, false));
                self.startselect = None;
            }
            if value {
                self.startselect = Some(ChordState::Wait);
            } else if self.startselect == Some(ChordState::Wait) {
                // A short press without a chord is sent as a tap
                self.startselect = None;
                out.push(Event::button(code, true));
                self.schedule_event(now + QAM_DELAY, Event::button(code, false));
            }
            return Event::Suppressed;
        }

        if code == ButtonCode::Mode && self.emitter.is_some() {
            self.guide_pressed = value;
            if value {
                self.special(SpecialKind::Guide);
            }
        }

        if matches!(
            self.config.dpad,
            Some(DpadMode::DiscreteToAnalog) | Some(DpadMode::Both)
        ) {
            let axis = match code {
                ButtonCode::DpadUp => Some((AxisCode::HatY, -1.0)),
                ButtonCode::DpadDown => Some((AxisCode::HatY, 1.0)),
                ButtonCode::DpadLeft => Some((AxisCode::HatX, -1.0)),
                ButtonCode::DpadRight => Some((AxisCode::HatX, 1.0)),
                _ => None,
            };
            if let Some((axis, direction)) = axis {
                out.push(Event::axis(axis, value as u8 as f32 * direction));
            }
        }

        if self.config.qam_button() == Some(code) {
            self.press_qam(value, out, now);
            return Event::Suppressed;
        }

        if code == ButtonCode::TouchpadRight {
            match self.config.touchpad_right {
                TouchpadAction::Disabled => return Event::Suppressed,
                TouchpadAction::LeftClick => code = ButtonCode::TouchpadLeft,
                TouchpadAction::RightClick => (),
            }
        }

        if code == ButtonCode::TouchpadTouch {
            if let (Some(action), Some(down), false) =
                (self.config.touchpad_short.button(), self.touchpad_down, value)
            {
                if now.duration_since(down.at) < TOUCHPAD_TAP_TIME
                    && (down.x - self.touchpad_x).abs() < TOUCHPAD_TAP_TRAVEL
                    && (down.y - self.touchpad_y).abs() < TOUCHPAD_TAP_TRAVEL
                {
                    self.schedule_event(now, Event::button(action, true));
                    self.schedule_event(now + QAM_DELAY, Event::button(action, false));
                }
            }
            if !value {
                self.touchpad_down = None;
            }
        }

        if self.config.r3_to_share && code == ButtonCode::ExtraR3 {
            code = ButtonCode::Share;
        }

        if self.config.nintendo_mode {
            code = match code {
                ButtonCode::A => ButtonCode::B,
                ButtonCode::B => ButtonCode::A,
                ButtonCode::X => ButtonCode::Y,
                ButtonCode::Y => ButtonCode::X,
                code => code,
            };
        }

        if (self.guide_pressed || self.select_held) && self.emitter.is_some() {
            if code == ButtonCode::Y && value {
                self.special(SpecialKind::XboxY);
            }
            if code == ButtonCode::B {
                if value {
                    self.xbox_b_pressed = Some(now);
                } else {
                    if self
                        .xbox_b_pressed
                        .is_some_and(|at| now.duration_since(at) < XBOX_B_MAX_PRESS)
                    {
                        self.special(SpecialKind::XboxB);
                    }
                    self.xbox_b_pressed = None;
                }
            }
        }

        if self.startselect == Some(ChordState::Wait) {
            out.push(Event::button(ButtonCode::Mode, true));
            self.startselect = Some(ChordState::Pressed);
        }
        if self.startselect == Some(ChordState::Pressed) {
            self.schedule_event(now + QAM_DELAY, Event::button(code, value));
            return Event::Suppressed;
        }

        Event::button(code, value)
    }

    fn press_qam(&mut self, value: bool, out: &mut Vec<Event>, now: Instant) {
        let simple = match self.emitter.as_ref() {
            Some(emitter) => emitter.simple_qam(),
            None => true,
        };
        if simple {
            if value {
                self.qam_chord(out, now);
            }
            return;
        }

        if value {
            self.qam_times += 1;
            self.qam_pressed = Some(now);
            self.qam_released = None;
        } else {
            if self.qam_pressed.is_some() {
                self.qam_released = Some(now);
            }
            self.qam_pressed = None;
        }
    }

    /// Resolve multi-tap presses of the QAM button into specials
    fn apply_qam(&mut self, out: &mut Vec<Event>, now: Instant) {
        let held = self
            .qam_pressed
            .is_some_and(|at| now.duration_since(at) > QAM_HOLD_TIME);
        let released = self
            .qam_released
            .is_some_and(|at| now.duration_since(at) > QAM_MULTI_PRESS_DELAY);
        let apply = held || released || (!self.config.qam_multi_tap && self.qam_released.is_some());

        if self.qam_pressed.is_some() && self.qam_times == 2 && !self.qam_pre_sent {
            self.special(SpecialKind::QamPredouble);
            self.qam_pre_sent = true;
        }
        if !apply {
            return;
        }

        if self.qam_pressed.is_some() {
            self.special(SpecialKind::QamHold);
        } else {
            match self.qam_times {
                0 => (),
                1 => {
                    self.special(SpecialKind::QamSingle);
                    let handled = self.emitter.as_ref().is_some_and(|e| e.send_qam(false));
                    if !handled {
                        self.qam_chord(out, now);
                    }
                }
                2 => self.special(SpecialKind::QamDouble),
                _ => self.special(SpecialKind::QamTriple),
            }
        }
        log::info!(
            "QAM pressed {} times{}",
            self.qam_times,
            if self.qam_pressed.is_some() { " then held" } else { "" }
        );
        self.qam_pressed = None;
        self.qam_released = None;
        self.qam_pre_sent = false;
        self.qam_times = 0;
    }

    fn process_led(&self, led: LedEvent, out: &mut Vec<Event>) -> Event {
        match (self.config.led, led.side) {
            (Some(LedRouting::LeftToMain), Side::Left)
            | (Some(LedRouting::RightToMain), Side::Right) => {
                out.push(Event::Led(LedEvent {
                    side: Side::Main,
                    ..led
                }));
            }
            (Some(LedRouting::MainToSides), Side::Main) => {
                out.push(Event::Led(LedEvent {
                    side: Side::Left,
                    ..led
                }));
                out.push(Event::Led(LedEvent {
                    side: Side::Right,
                    ..led
                }));
            }
            _ => (),
        }
        Event::Led(led)
    }

    fn process_status(&mut self, code: ConfigCode, value: Scalar, status: &mut Vec<ConfigCode>) {
        if self.config.status != Some(StatusRouting::BothToMain) {
            return;
        }
        self.state.insert(code, value);
        let main = match code {
            ConfigCode::BatteryLeft | ConfigCode::BatteryRight => ConfigCode::Battery,
            ConfigCode::IsAttachedLeft | ConfigCode::IsAttachedRight => ConfigCode::IsAttached,
            ConfigCode::IsConnectedLeft | ConfigCode::IsConnectedRight => ConfigCode::IsConnected,
            _ => return,
        };
        if !status.contains(&main) {
            status.push(main);
        }
    }

    fn status_event(&self, code: ConfigCode) -> Event {
        let flag = |code: ConfigCode| self.state.get(&code).is_some_and(|v| v.as_bool());
        match code {
            ConfigCode::Battery => {
                let level = |code: ConfigCode| self.state.get(&code).map_or(100.0, |v| v.as_f64());
                let battery = level(ConfigCode::BatteryLeft).min(level(ConfigCode::BatteryRight));
                Event::config(ConfigCode::Battery, battery)
            }
            ConfigCode::IsAttached => Event::config(
                code,
                flag(ConfigCode::IsAttachedLeft) && flag(ConfigCode::IsAttachedRight),
            ),
            _ => Event::config(
                code,
                flag(ConfigCode::IsConnectedLeft) && flag(ConfigCode::IsConnectedRight),
            ),
        }
    }
}
