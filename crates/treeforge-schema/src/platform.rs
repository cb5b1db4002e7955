use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "aarch64")]
    Aarch64,
    #[serde(rename = "ppc64le")]
    Ppc64le,
    #[serde(rename = "s390x")]
    S390x,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86_64 => write!(f, "x86_64"),
            Arch::Aarch64 => write!(f, "aarch64"),
            Arch::Ppc64le => write!(f, "ppc64le"),
            Arch::S390x => write!(f, "s390x"),
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x86_64" => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            "ppc64le" => Ok(Arch::Ppc64le),
            "s390x" => Ok(Arch::S390x),
            other => Err(format!("unsupported architecture: '{other}'")),
        }
    }
}

/// Architecture and firmware capabilities of the machine a tree targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub arch: Arch,
    /// GRUB BIOS platform, e.g. `i386-pc`. `None` when BIOS boot is unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bios_platform: Option<String>,
    /// EFI vendor directory name. `None` when UEFI boot is unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uefi_vendor: Option<String>,
}

impl Platform {
    pub fn new(arch: Arch) -> Self {
        Self {
            arch,
            bios_platform: None,
            uefi_vendor: None,
        }
    }

    pub fn with_bios(mut self, platform: impl Into<String>) -> Self {
        self.bios_platform = Some(platform.into());
        self
    }

    pub fn with_uefi(mut self, vendor: impl Into<String>) -> Self {
        self.uefi_vendor = Some(vendor.into());
        self
    }

    pub fn bios(&self) -> bool {
        self.bios_platform.is_some()
    }

    pub fn uefi(&self) -> bool {
        self.uefi_vendor.is_some()
    }
}
