// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Firmware of the machine being installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareType {
    Efi,
    #[default]
    Bios,
}

impl FirmwareType {
    pub fn is_efi(self) -> bool {
        self == FirmwareType::Efi
    }
}
