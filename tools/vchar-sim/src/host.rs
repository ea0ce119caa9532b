//! Simulated host kernel: device-number registry, character-device dispatch
//! table and `/dev` nodes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use vchar_core::{kdebug, kwarn};
use vchar_driver_api::{
    CdevHandle, DevNum, DevRegion, FileOperations, HostError, HostServices,
};

/// An allocated device-number range.
struct RegionEntry {
    region: DevRegion,
    name: String,
}

/// An installed dispatch entry.
struct CdevEntry {
    region: DevRegion,
    fops: Arc<dyn FileOperations>,
}

#[derive(Default)]
struct HostState {
    /// Keyed by major.
    regions: BTreeMap<u32, RegionEntry>,
    cdevs: BTreeMap<CdevHandle, CdevEntry>,
    next_cdev: u64,
    nodes: BTreeMap<String, DevNum>,
    releases: usize,
    bad_releases: usize,
}

/// In-process implementation of [`HostServices`].
///
/// Dynamic majors are handed out from the top of the configured range
/// downwards, the way Linux picks free majors.
pub struct SimHost {
    majors: (u32, u32),
    fail_alloc: AtomicBool,
    fail_install: AtomicBool,
    state: Mutex<HostState>,
}

impl SimHost {
    /// Creates a host drawing dynamic majors from `low..=high`.
    pub fn new(low: u32, high: u32) -> Self {
        Self {
            majors: (low, high),
            fail_alloc: AtomicBool::new(false),
            fail_install: AtomicBool::new(false),
            state: Mutex::new(HostState::default()),
        }
    }

    /// Makes subsequent [`alloc_region`](HostServices::alloc_region) calls fail.
    pub fn set_fail_alloc(&self, fail: bool) {
        self.fail_alloc.store(fail, Ordering::Relaxed);
    }

    /// Makes subsequent [`install`](HostServices::install) calls fail.
    pub fn set_fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::Relaxed);
    }

    /// Creates a character-device node at `path` naming `dev`.
    pub fn mknod(&self, path: &str, dev: DevNum) -> Result<()> {
        let mut state = self.lock();
        if state.nodes.contains_key(path) {
            bail!("{path} already exists");
        }
        state.nodes.insert(path.to_owned(), dev);
        kdebug!("host: mknod {} c {} {}", path, dev.major(), dev.minor());
        Ok(())
    }

    /// Resolves `path` to the file operations installed for its device
    /// number, as `open(2)` would.
    pub fn lookup(&self, path: &str) -> Result<Arc<dyn FileOperations>> {
        let state = self.lock();
        let Some(&dev) = state.nodes.get(path) else {
            bail!("{path}: no such file or directory");
        };
        match state.cdevs.values().find(|entry| entry.region.contains(dev)) {
            Some(entry) => Ok(entry.fops.clone()),
            None => bail!("{path}: no such device ({dev})"),
        }
    }

    /// Lists allocated ranges as `(major, name)`, like `/proc/devices`.
    pub fn devices(&self) -> Vec<(u32, String)> {
        self.lock()
            .regions
            .values()
            .map(|entry| (entry.region.major(), entry.name.clone()))
            .collect()
    }

    /// Number of ranges currently allocated.
    pub fn allocated_regions(&self) -> usize {
        self.lock().regions.len()
    }

    /// Number of dispatch entries currently installed.
    pub fn installed_cdevs(&self) -> usize {
        self.lock().cdevs.len()
    }

    /// Total successful range releases so far.
    pub fn release_count(&self) -> usize {
        self.lock().releases
    }

    /// Releases of ranges that were not allocated (double frees).
    pub fn bad_release_count(&self) -> usize {
        self.lock().bad_releases
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostServices for SimHost {
    fn alloc_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevRegion, HostError> {
        if self.fail_alloc.load(Ordering::Relaxed) {
            return Err(HostError::Exhausted);
        }
        let mut state = self.lock();
        let (low, high) = self.majors;
        let major = (low..=high)
            .rev()
            .find(|major| !state.regions.contains_key(major))
            .ok_or(HostError::Exhausted)?;
        let first = DevNum::new(major, first_minor).ok_or(HostError::Invalid)?;
        let region = DevRegion::new(first, count).ok_or(HostError::Invalid)?;
        state.regions.insert(
            major,
            RegionEntry {
                region,
                name: name.to_owned(),
            },
        );
        kdebug!("host: allocated {} for {}", region, name);
        Ok(region)
    }

    fn release_region(&self, region: DevRegion) {
        let mut state = self.lock();
        match state.regions.get(&region.major()) {
            Some(entry) if entry.region == region => {
                state.regions.remove(&region.major());
                state.releases += 1;
                kdebug!("host: released {}", region);
            }
            _ => {
                state.bad_releases += 1;
                kwarn!("host: release of unallocated region {}", region);
            }
        }
    }

    fn install(
        &self,
        region: DevRegion,
        fops: Arc<dyn FileOperations>,
    ) -> Result<CdevHandle, HostError> {
        if self.fail_install.load(Ordering::Relaxed) {
            return Err(HostError::OutOfMemory);
        }
        let mut state = self.lock();
        if !state
            .regions
            .get(&region.major())
            .is_some_and(|entry| entry.region == region)
        {
            return Err(HostError::Invalid);
        }
        if state.cdevs.values().any(|entry| entry.region.overlaps(region)) {
            return Err(HostError::Busy);
        }
        state.next_cdev += 1;
        let handle = CdevHandle(state.next_cdev);
        state.cdevs.insert(handle, CdevEntry { region, fops });
        kdebug!("host: installed cdev {} for {}", handle.0, region);
        Ok(handle)
    }

    fn uninstall(&self, handle: CdevHandle) {
        if self.lock().cdevs.remove(&handle).is_none() {
            kwarn!("host: uninstall of unknown cdev {}", handle.0);
        }
    }
}
