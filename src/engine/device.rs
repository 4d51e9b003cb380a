//! Device abstraction: where the files are and how much room is left

use super::layout::DeviceLayout;
use crate::config::{Capabilities, DeviceConfig};
use crate::error::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// What the engine needs to know about the player it writes to
pub trait Device {
    fn layout(&self) -> &DeviceLayout;

    fn capabilities(&self) -> &Capabilities;

    /// Bytes free for new media
    fn available_space(&self) -> Result<u64>;

    fn used_space(&self) -> Result<u64>;

    fn is_big_endian(&self) -> bool;

    /// Identifier keying the database signature
    fn firewire_id(&self) -> Option<&str>;

    fn mount_path(&self) -> &Path {
        self.layout().root()
    }
}

/// `Key: Value` lines from `iPod_Control/Device/SysInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysInfo {
    entries: HashMap<String, String>,
}

impl SysInfo {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::parse(&fs::read_to_string(path)?)))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn firewire_guid(&self) -> Option<&str> {
        self.get("FirewireGuid")
            .map(|guid| guid.trim_start_matches("0x").trim_start_matches("0X"))
    }

    pub fn model_number(&self) -> Option<&str> {
        self.get("ModelNumStr")
    }
}

/// A device mounted on the local filesystem
#[derive(Debug, Clone)]
pub struct MountedDevice {
    layout: DeviceLayout,
    capabilities: Capabilities,
    capacity: u64,
    big_endian: bool,
    firewire_id: Option<String>,
    sysinfo: Option<SysInfo>,
}

impl MountedDevice {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let layout = DeviceLayout::new(&config.mount_path);
        let capabilities = config.model.capabilities();
        let sysinfo = SysInfo::load(&layout.sysinfo_path())?;

        let firewire_id = config.firewire_id.clone().or_else(|| {
            sysinfo
                .as_ref()
                .and_then(|info| info.firewire_guid().map(str::to_string))
        });
        if let Some(model) = sysinfo.as_ref().and_then(|info| info.model_number()) {
            log::debug!("SysInfo reports model {}", model);
        }

        Ok(Self {
            big_endian: config.big_endian.unwrap_or(capabilities.big_endian),
            capacity: config
                .capacity
                .unwrap_or_else(|| config.model.default_capacity()),
            layout,
            capabilities,
            firewire_id,
            sysinfo,
        })
    }

    pub fn sysinfo(&self) -> Option<&SysInfo> {
        self.sysinfo.as_ref()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl Device for MountedDevice {
    fn layout(&self) -> &DeviceLayout {
        &self.layout
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn available_space(&self) -> Result<u64> {
        Ok(self.capacity.saturating_sub(self.used_space()?))
    }

    fn used_space(&self) -> Result<u64> {
        let root = self.layout.root();
        if !root.exists() {
            return Ok(0);
        }
        let mut total = 0;
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(std::io::Error::from)?.len();
            }
        }
        Ok(total)
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn firewire_id(&self) -> Option<&str> {
        self.firewire_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceModel;
    use tempfile::TempDir;

    #[test]
    fn test_sysinfo_parse() {
        let info = SysInfo::parse("BoardHwName: iPod M25\nFirewireGuid: 0x000A27001234ABCD\nModelNumStr: MA446\n\n");
        assert_eq!(info.firewire_guid(), Some("000A27001234ABCD"));
        assert_eq!(info.model_number(), Some("MA446"));
        assert_eq!(info.get("Missing"), None);
    }

    #[test]
    fn test_space_accounting() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file"), vec![0u8; 1000]).unwrap();

        let config = DeviceConfig::new(dir.path().to_path_buf())
            .with_model(DeviceModel::Generic)
            .with_capacity(5000);
        let device = MountedDevice::new(&config).unwrap();
        assert_eq!(device.used_space().unwrap(), 1000);
        assert_eq!(device.available_space().unwrap(), 4000);
        assert!(!device.is_big_endian());
    }

    #[test]
    fn test_firewire_id_from_sysinfo() {
        let dir = TempDir::new().unwrap();
        let layout = DeviceLayout::new(dir.path());
        fs::create_dir_all(layout.device_dir()).unwrap();
        fs::write(layout.sysinfo_path(), "FirewireGuid: 0xDEADBEEF\n").unwrap();

        let device = MountedDevice::new(&DeviceConfig::new(dir.path().to_path_buf())).unwrap();
        assert_eq!(device.firewire_id(), Some("DEADBEEF"));

        let overridden = MountedDevice::new(
            &DeviceConfig::new(dir.path().to_path_buf()).with_firewire_id("1234"),
        )
        .unwrap();
        assert_eq!(overridden.firewire_id(), Some("1234"));
    }
}
