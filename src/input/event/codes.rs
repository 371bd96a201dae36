//! Closed sets of event codes. Every code has a stable snake_case name used
//! in configuration files and logs.
use thiserror::Error;

/// Error returned when parsing an unknown code name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown code '{0}'")]
pub struct UnknownCode(pub String);

macro_rules! event_codes {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $str:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($str => Ok($name::$variant),)*
                    _ => Err(UnknownCode(s.to_string())),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                name.parse().map_err(serde::de::Error::custom)
            }
        }

        impl schemars::JsonSchema for $name {
            fn schema_name() -> String {
                stringify!($name).to_string()
            }

            fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
                schemars::schema::SchemaObject {
                    instance_type: Some(schemars::schema::InstanceType::String.into()),
                    enum_values: Some(vec![$(serde_json::Value::from($str),)*]),
                    ..Default::default()
                }
                .into()
            }
        }
    };
}

event_codes! {
    /// Buttons of gamepads, keyboards and mice
    ButtonCode {
        // Face buttons
        A => "a",
        B => "b",
        X => "x",
        Y => "y",
        // Dpad, also available as the hat axes
        DpadUp => "dpad_up",
        DpadDown => "dpad_down",
        DpadLeft => "dpad_left",
        DpadRight => "dpad_right",
        Ls => "ls",
        Rs => "rs",
        Lb => "lb",
        Rb => "rb",
        Lt => "lt",
        Rt => "rt",
        // Back buttons
        ExtraL1 => "extra_l1",
        ExtraL2 => "extra_l2",
        ExtraL3 => "extra_l3",
        ExtraR1 => "extra_r1",
        ExtraR2 => "extra_r2",
        ExtraR3 => "extra_r3",
        Start => "start",
        Select => "select",
        Mode => "mode",
        Share => "share",
        Keyboard => "keyboard",
        TouchpadTouch => "touchpad_touch",
        TouchpadLeft => "touchpad_left",
        TouchpadRight => "touchpad_right",
        // Mouse
        BtnLeft => "btn_left",
        BtnRight => "btn_right",
        BtnMiddle => "btn_middle",
        BtnSide => "btn_side",
        BtnExtra => "btn_extra",
        // Keyboard
        KeyEsc => "key_esc",
        KeyEnter => "key_enter",
        KeyLeftCtrl => "key_leftctrl",
        KeyLeftShift => "key_leftshift",
        KeyLeftAlt => "key_leftalt",
        KeyRightCtrl => "key_rightctrl",
        KeyRightShift => "key_rightshift",
        KeyRightAlt => "key_rightalt",
        KeyLeftMeta => "key_leftmeta",
        KeyRightMeta => "key_rightmeta",
        KeyCapsLock => "key_capslock",
        KeyNumLock => "key_numlock",
        KeyScrollLock => "key_scrolllock",
        KeySysRq => "key_sysrq",
        KeyMinus => "key_minus",
        KeyEqual => "key_equal",
        KeyBackspace => "key_backspace",
        KeyTab => "key_tab",
        KeyLeftBrace => "key_leftbrace",
        KeyRightBrace => "key_rightbrace",
        KeySpace => "key_space",
        KeyUp => "key_up",
        KeyLeft => "key_left",
        KeyRight => "key_right",
        KeyDown => "key_down",
        KeyHome => "key_home",
        KeyEnd => "key_end",
        KeyPageUp => "key_pageup",
        KeyPageDown => "key_pagedown",
        KeyInsert => "key_insert",
        KeyDelete => "key_delete",
        KeySemicolon => "key_semicolon",
        KeyApostrophe => "key_apostrophe",
        KeyGrave => "key_grave",
        KeyBackslash => "key_backslash",
        KeyComma => "key_comma",
        KeyDot => "key_dot",
        KeySlash => "key_slash",
        KeyPower => "key_power",
        KeyCompose => "key_compose",
        KeySleep => "key_sleep",
        Key1 => "key_1",
        Key2 => "key_2",
        Key3 => "key_3",
        Key4 => "key_4",
        Key5 => "key_5",
        Key6 => "key_6",
        Key7 => "key_7",
        Key8 => "key_8",
        Key9 => "key_9",
        Key0 => "key_0",
        KeyA => "key_a",
        KeyB => "key_b",
        KeyC => "key_c",
        KeyD => "key_d",
        KeyE => "key_e",
        KeyF => "key_f",
        KeyG => "key_g",
        KeyH => "key_h",
        KeyI => "key_i",
        KeyJ => "key_j",
        KeyK => "key_k",
        KeyL => "key_l",
        KeyM => "key_m",
        KeyN => "key_n",
        KeyO => "key_o",
        KeyP => "key_p",
        KeyQ => "key_q",
        KeyR => "key_r",
        KeyS => "key_s",
        KeyT => "key_t",
        KeyU => "key_u",
        KeyV => "key_v",
        KeyW => "key_w",
        KeyX => "key_x",
        KeyY => "key_y",
        KeyZ => "key_z",
        KeyF1 => "key_f1",
        KeyF2 => "key_f2",
        KeyF3 => "key_f3",
        KeyF4 => "key_f4",
        KeyF5 => "key_f5",
        KeyF6 => "key_f6",
        KeyF7 => "key_f7",
        KeyF8 => "key_f8",
        KeyF9 => "key_f9",
        KeyF10 => "key_f10",
        KeyF11 => "key_f11",
        KeyF12 => "key_f12",
        KeyF13 => "key_f13",
        KeyF14 => "key_f14",
        KeyF15 => "key_f15",
        KeyF16 => "key_f16",
        KeyF17 => "key_f17",
        KeyF18 => "key_f18",
        KeyF19 => "key_f19",
        KeyF20 => "key_f20",
        KeyF21 => "key_f21",
        KeyF22 => "key_f22",
        KeyF23 => "key_f23",
        KeyF24 => "key_f24",
        KeyPlayPause => "key_playpause",
        KeyMute => "key_mute",
        KeyVolumeDown => "key_volumedown",
        KeyVolumeUp => "key_volumeup",
        KeyNextSong => "key_nextsong",
        KeyPreviousSong => "key_previoussong",
        KeyProg1 => "key_prog1",
        KeyProg2 => "key_prog2",
    }
}

event_codes! {
    /// Continuous axes. Sticks are in [-1, 1], triggers and touchpads in
    /// [0, 1], accelerometers in m/s², gyroscopes in deg/s and timestamps in
    /// nanoseconds.
    AxisCode {
        LsX => "ls_x",
        LsY => "ls_y",
        RsX => "rs_x",
        RsY => "rs_y",
        Lt => "lt",
        Rt => "rt",
        HatX => "hat_x",
        HatY => "hat_y",
        AccelX => "accel_x",
        AccelY => "accel_y",
        AccelZ => "accel_z",
        GyroX => "gyro_x",
        GyroY => "gyro_y",
        GyroZ => "gyro_z",
        ImuTs => "imu_ts",
        TouchpadX => "touchpad_x",
        TouchpadY => "touchpad_y",
        LeftAccelX => "left_accel_x",
        LeftAccelY => "left_accel_y",
        LeftAccelZ => "left_accel_z",
        LeftGyroX => "left_gyro_x",
        LeftGyroY => "left_gyro_y",
        LeftGyroZ => "left_gyro_z",
        LeftImuTs => "left_imu_ts",
        LeftTouchpadX => "left_touchpad_x",
        LeftTouchpadY => "left_touchpad_y",
        RightAccelX => "right_accel_x",
        RightAccelY => "right_accel_y",
        RightAccelZ => "right_accel_z",
        RightGyroX => "right_gyro_x",
        RightGyroY => "right_gyro_y",
        RightGyroZ => "right_gyro_z",
        RightImuTs => "right_imu_ts",
        RightTouchpadX => "right_touchpad_x",
        RightTouchpadY => "right_touchpad_y",
        MouseX => "mouse_x",
        MouseY => "mouse_y",
        MouseWheel => "mouse_wheel",
        MouseWheelHires => "mouse_wheel_hires",
    }
}

event_codes! {
    /// Slow changing status values
    ConfigCode {
        LedMute => "led_mute",
        Player => "player",
        TouchpadAspectRatio => "touchpad_aspect_ratio",
        Battery => "battery",
        IsConnected => "is_connected",
        IsAttached => "is_attached",
        BatteryLeft => "battery_left",
        BatteryRight => "battery_right",
        IsConnectedLeft => "is_connected_left",
        IsConnectedRight => "is_connected_right",
        IsAttachedLeft => "is_attached_left",
        IsAttachedRight => "is_attached_right",
        Steam => "steam",
    }
}

event_codes! {
    /// Named gestures and notifications
    SpecialKind {
        Guide => "guide",
        QamSingle => "qam_single",
        QamPredouble => "qam_predouble",
        QamDouble => "qam_double",
        QamTriple => "qam_triple",
        QamHold => "qam_hold",
        Overlay => "overlay",
        XboxB => "xbox_b",
        XboxY => "xbox_y",
        XboxYInternal => "xbox_y_internal",
        KbdMetaPress => "kbd_meta_press",
        KbdMetaHold => "kbd_meta_hold",
        SwipeLeftTop => "swipe_left_top",
        SwipeLeftBottom => "swipe_left_bottom",
        SwipeRightTop => "swipe_right_top",
        SwipeRightBottom => "swipe_right_bottom",
        SwipeBottom => "swipe_bottom",
        TdpCycle => "tdp_cycle",
        TdpCycleQuiet => "tdp_cycle_quiet",
        TdpCycleBalanced => "tdp_cycle_balanced",
        TdpCyclePerformance => "tdp_cycle_performance",
        TdpCycleCustom => "tdp_cycle_custom",
        BrightnessChanged => "brightness_changed",
        Wakeup => "wakeup",
        PbtnShort => "pbtn_short",
        PbtnLong => "pbtn_long",
        PbtnDouble => "pbtn_double",
        Reboot => "reboot",
        RestartDev => "restart_dev",
        ShutdownDev => "shutdown_dev",
        Refresh => "refresh",
    }
}

impl AxisCode {
    /// The main side equivalent of a left side IMU axis
    pub fn left_to_main(&self) -> Option<AxisCode> {
        Some(match self {
            AxisCode::LeftAccelX => AxisCode::AccelX,
            AxisCode::LeftAccelY => AxisCode::AccelY,
            AxisCode::LeftAccelZ => AxisCode::AccelZ,
            AxisCode::LeftGyroX => AxisCode::GyroX,
            AxisCode::LeftGyroY => AxisCode::GyroY,
            AxisCode::LeftGyroZ => AxisCode::GyroZ,
            AxisCode::LeftImuTs => AxisCode::ImuTs,
            _ => return None,
        })
    }

    /// The main side equivalent of a right side IMU axis
    pub fn right_to_main(&self) -> Option<AxisCode> {
        Some(match self {
            AxisCode::RightAccelX => AxisCode::AccelX,
            AxisCode::RightAccelY => AxisCode::AccelY,
            AxisCode::RightAccelZ => AxisCode::AccelZ,
            AxisCode::RightGyroX => AxisCode::GyroX,
            AxisCode::RightGyroY => AxisCode::GyroY,
            AxisCode::RightGyroZ => AxisCode::GyroZ,
            AxisCode::RightImuTs => AxisCode::ImuTs,
            _ => return None,
        })
    }

    /// The (left, right) equivalents of a main IMU axis
    pub fn main_to_sides(&self) -> Option<(AxisCode, AxisCode)> {
        Some(match self {
            AxisCode::AccelX => (AxisCode::LeftAccelX, AxisCode::RightAccelX),
            AxisCode::AccelY => (AxisCode::LeftAccelY, AxisCode::RightAccelY),
            AxisCode::AccelZ => (AxisCode::LeftAccelZ, AxisCode::RightAccelZ),
            AxisCode::GyroX => (AxisCode::LeftGyroX, AxisCode::RightGyroX),
            AxisCode::GyroY => (AxisCode::LeftGyroY, AxisCode::RightGyroY),
            AxisCode::GyroZ => (AxisCode::LeftGyroZ, AxisCode::RightGyroZ),
            AxisCode::ImuTs => (AxisCode::LeftImuTs, AxisCode::RightImuTs),
            _ => return None,
        })
    }

    pub fn is_imu(&self) -> bool {
        let name = self.as_str();
        name.contains("accel") || name.contains("gyro") || name.ends_with("imu_ts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for code in ButtonCode::ALL {
            assert_eq!(code.as_str().parse::<ButtonCode>().unwrap(), *code);
        }
        for code in AxisCode::ALL {
            assert_eq!(code.as_str().parse::<AxisCode>().unwrap(), *code);
        }
        for code in ConfigCode::ALL {
            assert_eq!(code.to_string().parse::<ConfigCode>().unwrap(), *code);
        }
        for kind in SpecialKind::ALL {
            assert_eq!(kind.to_string().parse::<SpecialKind>().unwrap(), *kind);
        }
        assert_eq!(
            "not_a_button".parse::<ButtonCode>(),
            Err(UnknownCode("not_a_button".into()))
        );
    }

    #[test]
    fn imu_sides() {
        assert_eq!(AxisCode::LeftGyroZ.left_to_main(), Some(AxisCode::GyroZ));
        assert_eq!(AxisCode::LeftGyroZ.right_to_main(), None);
        assert_eq!(
            AxisCode::ImuTs.main_to_sides(),
            Some((AxisCode::LeftImuTs, AxisCode::RightImuTs))
        );
        assert!(AxisCode::RightImuTs.is_imu());
        assert!(!AxisCode::TouchpadX.is_imu());
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&ButtonCode::ExtraR3).unwrap();
        assert_eq!(json, "\"extra_r3\"");
        let code: SpecialKind = serde_json::from_str("\"qam_double\"").unwrap();
        assert_eq!(code, SpecialKind::QamDouble);
    }
}
