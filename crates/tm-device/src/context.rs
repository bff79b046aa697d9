use std::fmt;

use crate::accelerator::Accelerator;
use crate::error::{DeviceError, Result};
use crate::properties::{DeviceKind, DeviceProperties};

/// A device registered in a `Context`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    index: usize,
    properties: DeviceProperties,
}

impl DeviceInfo {
    /// Position of the device in its context, in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.properties.kind
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.properties;
        writeln!(f, "Device {}: {}", self.index, p.name)?;
        writeln!(f, "  kind:                  {}", p.kind)?;
        writeln!(f, "  memory bus width:      {} bits", p.memory_bus_width)?;
        writeln!(f, "  scratch per group:     {} bytes", p.scratch_budget())?;
        writeln!(f, "  max threads per group: {}", p.max_threads_per_group)?;
        writeln!(f, "  max group dim:         {}", p.max_group_dim)?;
        writeln!(f, "  warp size:             {}", p.warp_size)?;
        writeln!(f, "  multiprocessors:       {}", p.multiprocessors)?;
        write!(f, "  global memory:         {} MiB", p.global_memory >> 20)
    }
}

/// Builder for a `Context`. Devices are registered in call order.
#[derive(Debug, Default)]
pub struct ContextBuilder {
    devices: Vec<DeviceProperties>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the host CPU accelerator.
    pub fn cpu(self) -> Self {
        self.device(DeviceProperties::cpu())
    }

    /// Register a device with the given properties.
    pub fn device(mut self, properties: DeviceProperties) -> Self {
        self.devices.push(properties);
        self
    }

    /// Register the CPU accelerator and every built-in simulated GPU profile.
    pub fn all_accelerators(self) -> Self {
        self.cpu()
            .device(DeviceProperties::discrete_gpu())
            .device(DeviceProperties::integrated_gpu())
    }

    pub fn build(self) -> Result<Context> {
        if self.devices.is_empty() {
            return Err(DeviceError::NoDevice);
        }
        let devices = self
            .devices
            .into_iter()
            .enumerate()
            .map(|(index, properties)| DeviceInfo { index, properties })
            .collect();
        Ok(Context { devices })
    }
}

/// The set of devices available to a program.
///
/// A context is created explicitly and passed around; accelerators are
/// created from it on demand.
#[derive(Debug, Clone)]
pub struct Context {
    devices: Vec<DeviceInfo>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// A context with only the CPU accelerator.
    pub fn create_default() -> Result<Self> {
        Self::builder().cpu().build()
    }

    /// A context with every built-in device profile.
    pub fn all_accelerators() -> Result<Self> {
        Self::builder().all_accelerators().build()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, index: usize) -> Result<&DeviceInfo> {
        self.devices.get(index).ok_or(DeviceError::UnknownDevice {
            index,
            count: self.devices.len(),
        })
    }

    /// The CPU device when `prefer_cpu` is set (if one is registered),
    /// otherwise the device with the most threads per group. Ties keep
    /// registration order.
    pub fn preferred_device(&self, prefer_cpu: bool) -> &DeviceInfo {
        if prefer_cpu {
            if let Some(cpu) = self.devices.iter().find(|d| d.kind() == DeviceKind::Cpu) {
                return cpu;
            }
        }
        let mut best = &self.devices[0];
        for device in &self.devices[1..] {
            let rank = |d: &DeviceInfo| {
                (
                    d.kind() != DeviceKind::Cpu,
                    d.properties.max_threads_per_group,
                )
            };
            if rank(device) > rank(best) {
                best = device;
            }
        }
        best
    }

    pub fn create_accelerator(&self, device: &DeviceInfo) -> Result<Accelerator> {
        Accelerator::new(device.clone())
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = &'a DeviceInfo;
    type IntoIter = std::slice::Iter<'a, DeviceInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        let ctx = Context::create_default().unwrap();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.preferred_device(false).kind(), DeviceKind::Cpu);
    }

    #[test]
    fn test_empty_context_rejected() {
        assert!(matches!(Context::builder().build(), Err(DeviceError::NoDevice)));
    }

    #[test]
    fn test_enumeration_order() {
        let ctx = Context::all_accelerators().unwrap();
        let names: Vec<_> = ctx.devices().map(|d| d.index()).collect();
        assert_eq!(names, vec![0, 1, 2]);
        assert_eq!(ctx.device(1).unwrap().kind(), DeviceKind::SimulatedGpu);
        assert!(matches!(
            ctx.device(3),
            Err(DeviceError::UnknownDevice { index: 3, count: 3 })
        ));
        assert_eq!((&ctx).into_iter().count(), 3);
    }

    #[test]
    fn test_preferred_device() {
        let ctx = Context::all_accelerators().unwrap();
        assert_eq!(ctx.preferred_device(true).kind(), DeviceKind::Cpu);
        let gpu = ctx.preferred_device(false);
        assert_eq!(gpu.kind(), DeviceKind::SimulatedGpu);
        assert_eq!(gpu.properties().max_threads_per_group, 1024);
        assert_eq!(gpu.index(), 1);
    }

    #[test]
    fn test_display() {
        let ctx = Context::create_default().unwrap();
        let text = ctx.device(0).unwrap().to_string();
        assert!(text.starts_with("Device 0: CPU accelerator"));
        assert!(text.contains("scratch per group:     8192 bytes"));
    }
}
