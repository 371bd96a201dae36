use serde::{Deserialize, Serialize};

use super::SpecialKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcpiEvent {
    Ac,
    Dc,
    Tdp,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyStatus {
    Power,
    Balanced,
    Performance,
}

/// Control plane events exchanged between the front-end and the rest of the
/// daemon. Their JSON form is tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// Set a named profile, or delete it when `config` is null
    Profile {
        name: String,
        config: Option<serde_json::Value>,
    },
    /// Activate a profile
    Apply { name: String },
    /// Merge into the live state
    State { config: serde_json::Value },
    /// The declared settings changed and must be fetched again
    Settings,
    Acpi { event: AcpiEvent },
    Tdp { tdp: Option<i32> },
    Special { event: SpecialKind },
    Ppd { status: EnergyStatus },
    Energy { status: EnergyStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_json() {
        let ev: ControlEvent = serde_json::from_str(r#"{"type": "apply", "name": "gaming"}"#).unwrap();
        assert_eq!(
            ev,
            ControlEvent::Apply {
                name: "gaming".into()
            }
        );

        let ev: ControlEvent =
            serde_json::from_str(r#"{"type": "profile", "name": "old", "config": null}"#).unwrap();
        assert_eq!(
            ev,
            ControlEvent::Profile {
                name: "old".into(),
                config: None
            }
        );

        let json = serde_json::to_value(ControlEvent::Acpi {
            event: AcpiEvent::Dc,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "acpi", "event": "dc"}));

        let ev: ControlEvent =
            serde_json::from_str(r#"{"type": "special", "event": "wakeup"}"#).unwrap();
        assert_eq!(
            ev,
            ControlEvent::Special {
                event: SpecialKind::Wakeup
            }
        );
    }
}
