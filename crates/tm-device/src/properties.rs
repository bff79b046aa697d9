use std::fmt;

use crate::geometry::Dim2;

/// Scratch bytes per group granted for each bit of memory-bus width when a
/// profile does not advertise an explicit budget. A 384-bit bus yields 48 KiB.
const SCRATCH_BYTES_PER_BUS_BIT: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Host CPU exposed through the accelerator interface.
    Cpu,
    /// A GPU-shaped profile executed on the host.
    SimulatedGpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::SimulatedGpu => write!(f, "simulated-gpu"),
        }
    }
}

/// Capability figures of an accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub kind: DeviceKind,
    /// Memory bus width in bits.
    pub memory_bus_width: usize,
    /// Explicit scratch memory per group, in bytes. `None` derives it from
    /// the memory bus width.
    pub shared_memory_per_group: Option<usize>,
    pub max_threads_per_group: usize,
    pub max_group_dim: Dim2,
    pub warp_size: usize,
    pub multiprocessors: usize,
    /// Total device memory in bytes.
    pub global_memory: usize,
}

impl DeviceProperties {
    /// The host CPU as an accelerator: one multiprocessor per available core.
    pub fn cpu() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        DeviceProperties {
            name: "CPU accelerator".to_string(),
            kind: DeviceKind::Cpu,
            memory_bus_width: 64,
            shared_memory_per_group: None,
            max_threads_per_group: 1024,
            max_group_dim: Dim2::square(1024),
            warp_size: 4,
            multiprocessors: cores,
            global_memory: 1 << 30,
        }
    }

    /// A discrete GPU with a 384-bit bus and 48 KiB of scratch per group.
    pub fn discrete_gpu() -> Self {
        DeviceProperties {
            name: "Simulated discrete GPU (384-bit)".to_string(),
            kind: DeviceKind::SimulatedGpu,
            memory_bus_width: 384,
            shared_memory_per_group: Some(48 * 1024),
            max_threads_per_group: 1024,
            max_group_dim: Dim2::square(1024),
            warp_size: 32,
            multiprocessors: 28,
            global_memory: 1 << 31,
        }
    }

    /// A small integrated GPU: 128-bit bus and at most 256 threads per group.
    pub fn integrated_gpu() -> Self {
        DeviceProperties {
            name: "Simulated integrated GPU (128-bit)".to_string(),
            kind: DeviceKind::SimulatedGpu,
            memory_bus_width: 128,
            shared_memory_per_group: None,
            max_threads_per_group: 256,
            max_group_dim: Dim2::square(256),
            warp_size: 32,
            multiprocessors: 4,
            global_memory: 1 << 29,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_shared_memory(mut self, bytes: usize) -> Self {
        self.shared_memory_per_group = Some(bytes);
        self
    }

    pub fn with_memory_bus_width(mut self, bits: usize) -> Self {
        self.memory_bus_width = bits;
        self
    }

    pub fn with_max_threads_per_group(mut self, threads: usize) -> Self {
        self.max_threads_per_group = threads;
        self
    }

    pub fn with_max_group_dim(mut self, dim: Dim2) -> Self {
        self.max_group_dim = dim;
        self
    }

    pub fn with_global_memory(mut self, bytes: usize) -> Self {
        self.global_memory = bytes;
        self
    }

    pub fn with_multiprocessors(mut self, count: usize) -> Self {
        self.multiprocessors = count;
        self
    }

    /// Scratch memory available to one group, in bytes.
    pub fn scratch_budget(&self) -> usize {
        self.shared_memory_per_group
            .unwrap_or(self.memory_bus_width.saturating_mul(SCRATCH_BYTES_PER_BUS_BIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_from_bus_width() {
        assert_eq!(DeviceProperties::cpu().scratch_budget(), 8 * 1024);
        assert_eq!(DeviceProperties::integrated_gpu().scratch_budget(), 16 * 1024);
        let p = DeviceProperties::integrated_gpu().with_memory_bus_width(384);
        assert_eq!(p.scratch_budget(), 48 * 1024);
    }

    #[test]
    fn test_explicit_scratch_wins() {
        let p = DeviceProperties::cpu().with_shared_memory(1000);
        assert_eq!(p.scratch_budget(), 1000);
        assert_eq!(DeviceProperties::discrete_gpu().scratch_budget(), 48 * 1024);
    }

    #[test]
    fn test_cpu_profile() {
        let p = DeviceProperties::cpu();
        assert_eq!(p.kind, DeviceKind::Cpu);
        assert!(p.multiprocessors >= 1);
        assert_eq!(p.kind.to_string(), "cpu");
    }

    #[test]
    fn test_huge_bus_width_saturates() {
        let p = DeviceProperties::integrated_gpu().with_memory_bus_width(usize::MAX);
        assert_eq!(p.scratch_budget(), usize::MAX);
    }

    #[test]
    fn test_builders_override_profile() {
        let p = DeviceProperties::discrete_gpu()
            .with_name("Test board")
            .with_multiprocessors(2);
        assert_eq!(p.name, "Test board");
        assert_eq!(p.multiprocessors, 2);
        assert_eq!(p.kind, DeviceKind::SimulatedGpu);
        assert_eq!(p.max_threads_per_group, 1024);
    }
}
