//! Detection of the running handheld from its DMI data
use crate::dmi::data::{DmiData, DmiMatch};

use super::{claw::Claw, legion_go::LegionGo, Handheld};

/// A supported handheld model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    LegionGo,
    MsiClaw,
}

impl Model {
    pub fn name(&self) -> &'static str {
        match self {
            Model::LegionGo => "Legion Go",
            Model::MsiClaw => "MSI Claw",
        }
    }

    /// Handheld implementation driving this model
    pub fn handheld(&self) -> Box<dyn Handheld> {
        match self {
            Model::LegionGo => Box::new(LegionGo::new()),
            Model::MsiClaw => Box::new(Claw::new()),
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// DMI patterns of each model, checked in order
const MODELS: &[(DmiMatch, Model)] = &[
    (
        DmiMatch {
            sys_vendor: Some("LENOVO"),
            product_name: Some("83E1"),
            board_name: None,
            cpu_vendor: None,
        },
        Model::LegionGo,
    ),
    // Claw, Claw 7 AI+ and Claw 8 AI+
    (claw("MS-1T41"), Model::MsiClaw),
    (claw("MS-1T42"), Model::MsiClaw),
    (claw("MS-1T52"), Model::MsiClaw),
];

const fn claw(board_name: &'static str) -> DmiMatch {
    DmiMatch {
        sys_vendor: None,
        product_name: None,
        board_name: Some(board_name),
        cpu_vendor: None,
    }
}

/// Returns the handheld model matching the given DMI data
pub fn detect(data: &DmiData) -> Option<Model> {
    MODELS
        .iter()
        .find(|(pattern, _)| pattern.matches(data))
        .map(|(_, model)| *model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legion_go_is_detected() {
        let data = DmiData {
            sys_vendor: "LENOVO".into(),
            product_name: "83E1".into(),
            ..Default::default()
        };
        assert_eq!(detect(&data), Some(Model::LegionGo));
        assert_eq!(detect(&data).map(|m| m.to_string()).as_deref(), Some("Legion Go"));

        // Legion Go S uses a different controller
        let data = DmiData {
            sys_vendor: "LENOVO".into(),
            product_name: "83L3".into(),
            ..Default::default()
        };
        assert_eq!(detect(&data), None);
        assert_eq!(detect(&DmiData::default()), None);
    }

    #[test]
    fn claw_is_detected_by_board() {
        for board in ["MS-1T41", "MS-1T42", "MS-1T52"] {
            let data = DmiData {
                sys_vendor: "Micro-Star International Co., Ltd.".into(),
                product_name: "Claw 8 AI+ A2VM".into(),
                board_name: board.into(),
                ..Default::default()
            };
            assert_eq!(detect(&data), Some(Model::MsiClaw));
            assert_eq!(detect(&data).map(|m| m.handheld().name()), Some("MSI Claw"));
        }

        // Other MSI boards are not handhelds
        let data = DmiData {
            sys_vendor: "Micro-Star International Co., Ltd.".into(),
            board_name: "MS-7D25".into(),
            ..Default::default()
        };
        assert_eq!(detect(&data), None);
    }
}
