//! Module load and unload.
//!
//! A [`Registration`] owns the device-number range and the installed
//! dispatch entry for as long as the module is loaded.

use alloc::sync::Arc;

use vchar_core::{kerr, kinfo};
use vchar_driver_api::{CdevHandle, DevRegion, DriverError, HostServices, ModuleInfo, UserCopy};

use crate::MODULE_INFO;
use crate::config::DeviceConfig;
use crate::file::FakeDevice;

/// A loaded instance of the driver.
///
/// Created by [`start`](Self::start). Unloading happens on
/// [`stop`](Self::stop) or, failing that, on drop; either way the dispatch
/// entry is removed before the range is released, and both happen once.
pub struct Registration {
    host: Arc<dyn HostServices>,
    device: Arc<FakeDevice>,
    region: DevRegion,
    /// `None` once torn down.
    cdev: Option<CdevHandle>,
}

impl Registration {
    /// Loads the driver: allocates one device number and installs the device
    /// against it.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidArgument`] if `config` is unusable.
    /// - [`DriverError::Resource`] if the host has no device number to give.
    /// - [`DriverError::Install`] if the dispatch entry could not be added;
    ///   the range is returned to the host first.
    pub fn start(
        host: Arc<dyn HostServices>,
        user: Arc<dyn UserCopy>,
        config: &DeviceConfig,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        kinfo!("loading {}", MODULE_INFO);

        let region = match host.alloc_region(config.first_minor, 1, &config.name) {
            Ok(region) => region,
            Err(err) => {
                kerr!("{}: failed to allocate major number: {}", config.name, err);
                return Err(DriverError::Resource);
            }
        };
        kinfo!("{}: major number is {}", config.name, region.major());
        kinfo!("{}: device file name is /dev/{}", config.name, config.name);
        kinfo!(
            "{}: create it with 'mknod /dev/{} c {} {}'",
            config.name,
            config.name,
            region.major(),
            region.first().minor()
        );

        let device = Arc::new(FakeDevice::new(config.name.clone(), region, user));
        let cdev = match host.install(region, device.clone()) {
            Ok(cdev) => cdev,
            Err(err) => {
                kerr!("{}: unable to add cdev to kernel: {}", config.name, err);
                host.release_region(region);
                return Err(DriverError::Install);
            }
        };

        Ok(Self {
            host,
            device,
            region,
            cdev: Some(cdev),
        })
    }

    /// Unloads the driver.
    ///
    /// Does not wait for or evict an open session; check
    /// [`is_in_use`](Self::is_in_use) first.
    pub fn stop(mut self) {
        self.teardown();
    }

    /// Returns `true` while a client holds the device open.
    ///
    /// Hosts refuse to unload a module in this state.
    pub fn is_in_use(&self) -> bool {
        self.device.is_open()
    }

    /// Device numbers owned by this registration.
    pub fn region(&self) -> DevRegion {
        self.region
    }

    /// Module metadata.
    pub fn info(&self) -> &'static ModuleInfo {
        &MODULE_INFO
    }

    /// The installed device.
    pub fn device(&self) -> &Arc<FakeDevice> {
        &self.device
    }

    fn teardown(&mut self) {
        if let Some(cdev) = self.cdev.take() {
            self.host.uninstall(cdev);
            self.host.release_region(self.region);
            kinfo!("{}: unloaded module", self.device.name());
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use vchar_core::sync::InterruptFlag;
    use vchar_driver_api::{DevNum, FileOperations, OpenFlags};

    use super::*;
    use crate::mock::{self, MAJOR, MockHost, MockUser, block_on};

    fn start(host: &Arc<MockHost>, config: &DeviceConfig) -> Result<Registration, DriverError> {
        Registration::start(host.clone(), MockUser::new(256), config)
    }

    #[test]
    fn start_allocates_then_installs() {
        let host = Arc::new(MockHost::default());
        let reg = start(&host, &DeviceConfig::default()).unwrap();

        assert_eq!(reg.region().first(), DevNum::new(MAJOR, 0).unwrap());
        assert_eq!(reg.region().count(), 1);
        assert_eq!(reg.device().name(), "testCharDevice");
        assert_eq!(reg.info().license, "GPL");
        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "alloc testCharDevice");
        assert!(calls[1].starts_with("install"));
        assert_eq!(host.installed.lock().unwrap().len(), 1);
        reg.stop();
    }

    #[test]
    fn stop_uninstalls_before_release() {
        let host = Arc::new(MockHost::default());
        let reg = start(&host, &DeviceConfig::default()).unwrap();
        reg.stop();

        let calls = host.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[2].starts_with("uninstall"));
        assert!(calls[3].starts_with("release"));
        assert!(host.allocated.lock().unwrap().is_empty());
        assert!(host.installed.lock().unwrap().is_empty());
    }

    #[test]
    fn drop_without_stop_tears_down_once() {
        let host = Arc::new(MockHost::default());
        drop(start(&host, &DeviceConfig::default()).unwrap());

        let releases = host.calls().iter().filter(|c| c.starts_with("release")).count();
        assert_eq!(releases, 1);
        assert!(host.allocated.lock().unwrap().is_empty());
    }

    #[test]
    fn alloc_failure_is_resource_error() {
        let host = Arc::new(MockHost {
            fail_alloc: true,
            ..MockHost::default()
        });
        assert_eq!(
            start(&host, &DeviceConfig::default()).err(),
            Some(DriverError::Resource)
        );
        assert_eq!(host.calls(), ["alloc testCharDevice"]);
    }

    #[test]
    fn install_failure_rolls_back_region() {
        let host = Arc::new(MockHost {
            fail_install: true,
            ..MockHost::default()
        });
        assert_eq!(
            start(&host, &DeviceConfig::default()).err(),
            Some(DriverError::Install)
        );

        let calls = host.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[2].starts_with("release"));
        assert!(host.allocated.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_config_touches_nothing() {
        let host = Arc::new(MockHost::default());
        assert_eq!(
            start(&host, &DeviceConfig::named("bad name")).err(),
            Some(DriverError::InvalidArgument)
        );
        assert!(host.calls().is_empty());
    }

    #[test]
    fn in_use_tracks_open_session() {
        let host = Arc::new(MockHost::default());
        let reg = start(&host, &DeviceConfig::default()).unwrap();
        assert!(!reg.is_in_use());

        // Open through the installed dispatch object, as the host would.
        let fops = host.installed.lock().unwrap()[0].1.clone();
        let signals = InterruptFlag::new();
        let token = block_on(fops.open(OpenFlags::READ, &signals)).unwrap();
        assert!(reg.is_in_use());

        fops.release(token).unwrap();
        assert!(!reg.is_in_use());
        reg.stop();
    }

    #[test]
    fn custom_minor_is_requested() {
        let host = Arc::new(MockHost::default());
        let config = DeviceConfig {
            name: "vchar".into(),
            first_minor: 5,
        };
        let reg = start(&host, &config).unwrap();
        assert_eq!(reg.region().first().minor(), 5);
        reg.stop();
    }

    #[test]
    fn mock_device_helper_is_unregistered() {
        let (dev, _) = mock::device();
        assert_eq!(dev.region().major(), MAJOR);
        assert!(!dev.is_open());
    }
}
