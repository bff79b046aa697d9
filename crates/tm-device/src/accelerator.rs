use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tm_tensor::{Extent, Layout, Matrix};

use crate::buffer::{DeviceBuffer, DeviceElem, MemoryTracker};
use crate::context::DeviceInfo;
use crate::error::{DeviceError, ResourceLimitError, Result};
use crate::geometry::{Dim2, LaunchGeometry};
use crate::group::GroupContext;
use crate::kernel::{GroupKernel, StreamKernel};
use crate::properties::DeviceProperties;

/// Summary of a completed launch.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub kernel: String,
    pub geometry: LaunchGeometry,
    /// Barriers passed by each group (the maximum over groups).
    pub barriers_per_group: usize,
    pub elapsed: Duration,
}

/// A live accelerator: buffer service, launch service and synchronization.
///
/// Groups of a launch run in parallel on a dedicated thread pool sized to the
/// device's multiprocessor count. A launch returns once every group has
/// finished, so all device writes are visible to the host afterwards.
pub struct Accelerator {
    info: DeviceInfo,
    tracker: Arc<MemoryTracker>,
    pool: rayon::ThreadPool,
    in_flight: RwLock<()>,
    launches: AtomicUsize,
}

impl Accelerator {
    pub fn new(info: DeviceInfo) -> Result<Self> {
        let threads = info.properties().multiprocessors.max(1);
        let device = info.index();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("tm-device{}-worker{}", device, i))
            .build()
            .map_err(|e| DeviceError::Runtime(e.to_string()))?;
        log::debug!(
            "created accelerator '{}' with {} worker threads",
            info.properties().name,
            threads
        );
        Ok(Accelerator {
            tracker: Arc::new(MemoryTracker::new(info.properties().global_memory)),
            info,
            pool,
            in_flight: RwLock::new(()),
            launches: AtomicUsize::new(0),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn properties(&self) -> &DeviceProperties {
        self.info.properties()
    }

    /// Bytes of device memory currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.tracker.allocated()
    }

    /// Number of launches that passed validation and were executed.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }

    /// Allocate a zeroed 1-D buffer of `len` elements.
    pub fn allocate_1d<T: DeviceElem>(&self, len: usize) -> Result<DeviceBuffer<T>> {
        self.allocate(Extent::new(len, 1), Layout::RowMajor)
    }

    /// Allocate a zeroed 2-D buffer.
    pub fn allocate_2d<T: DeviceElem>(&self, extent: Extent, layout: Layout) -> Result<DeviceBuffer<T>> {
        self.allocate(extent, layout)
    }

    fn allocate<T: DeviceElem>(&self, extent: Extent, layout: Layout) -> Result<DeviceBuffer<T>> {
        let bytes = DeviceBuffer::<T>::bytes_for(extent);
        self.tracker.reserve(bytes)?;
        log::trace!("allocated {} bytes of {} for {}", bytes, T::DTYPE, extent);
        Ok(DeviceBuffer::zeroed(extent, layout, self.tracker.clone()))
    }

    /// Allocate a 1-D buffer and copy `data` into it.
    pub fn upload_1d<T: DeviceElem>(&self, data: &[T]) -> Result<DeviceBuffer<T>> {
        let mut buffer = self.allocate_1d(data.len())?;
        buffer.copy_from_host(data)?;
        Ok(buffer)
    }

    /// Allocate a 2-D buffer with the matrix's extent and layout and copy it in.
    pub fn upload_matrix(&self, matrix: &Matrix) -> Result<DeviceBuffer<f32>> {
        let mut buffer = self.allocate_2d(matrix.extent(), matrix.layout())?;
        buffer.copy_from_host(matrix.data())?;
        Ok(buffer)
    }

    /// Copy a 2-D buffer back into a host matrix with the buffer's layout.
    pub fn download_matrix(&self, buffer: &DeviceBuffer<f32>) -> Result<Matrix> {
        let extent = buffer.extent();
        Ok(Matrix::with_layout(
            extent.rows,
            extent.cols,
            buffer.to_host(),
            buffer.layout(),
        )?)
    }

    /// Launch a grouped kernel and wait for every group to finish.
    ///
    /// The geometry and the kernel's scratch requirement are validated
    /// against the device limits before anything runs.
    pub fn launch_grouped<K: GroupKernel>(&self, kernel: &K, geometry: LaunchGeometry) -> Result<LaunchReport> {
        if geometry.group.num_elems() == 0 || geometry.grid.num_elems() == 0 {
            return Err(DeviceError::InvalidLaunch {
                kernel: kernel.name().to_string(),
                reason: format!("empty launch {}", geometry),
            });
        }
        let props = self.properties();
        validate_group_dim(props, geometry.group)?;
        validate_units(props, geometry.group)?;
        validate_scratch(props, kernel.scratch_bytes(geometry.group))?;

        let _running = self.in_flight.read().unwrap_or_else(|e| e.into_inner());
        self.launches.fetch_add(1, Ordering::Relaxed);
        log::debug!("launching '{}' on '{}': {}", kernel.name(), props.name, geometry);

        let start = Instant::now();
        let budget = props.scratch_budget();
        let grid = geometry.grid;
        let result = self.pool.install(|| {
            (0..geometry.num_groups())
                .into_par_iter()
                .map(|g| {
                    let index = Dim2::new(g / grid.y, g % grid.y);
                    let mut group = GroupContext::new(index, geometry.group, budget);
                    match panic::catch_unwind(AssertUnwindSafe(|| kernel.execute_group(&mut group))) {
                        Ok(Ok(())) => Ok(group.barriers()),
                        Ok(Err(err)) => Err(err),
                        Err(payload) => Err(DeviceError::Execution {
                            kernel: kernel.name().to_string(),
                            group: index,
                            message: panic_message(payload.as_ref()),
                        }),
                    }
                })
                .try_reduce(|| 0, |a, b| Ok(a.max(b)))
        });

        match result {
            Ok(barriers_per_group) => {
                let elapsed = start.elapsed();
                log::trace!("'{}' finished in {:?}", kernel.name(), elapsed);
                Ok(LaunchReport {
                    kernel: kernel.name().to_string(),
                    geometry,
                    barriers_per_group,
                    elapsed,
                })
            }
            Err(err) => {
                log::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Launch a stream kernel over exactly `extent` indices and wait for it.
    pub fn launch_stream<K: StreamKernel>(&self, kernel: &K, extent: Dim2) -> Result<LaunchReport> {
        kernel
            .validate(extent)
            .map_err(|reason| DeviceError::InvalidLaunch {
                kernel: kernel.name().to_string(),
                reason,
            })?;

        let total = extent.num_elems();
        let group_size = self.stream_group_size();
        let geometry = LaunchGeometry::new(
            Dim2::new(total.div_ceil(group_size), 1),
            Dim2::new(group_size, 1),
        );

        let _running = self.in_flight.read().unwrap_or_else(|e| e.into_inner());
        self.launches.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "launching '{}' on '{}' over {} indices ({})",
            kernel.name(),
            self.properties().name,
            total,
            geometry
        );

        let start = Instant::now();
        let result = self.pool.install(|| {
            (0..geometry.grid.x).into_par_iter().try_for_each(|g| {
                let begin = g * group_size;
                let end = (begin + group_size).min(total);
                panic::catch_unwind(AssertUnwindSafe(|| {
                    for i in begin..end {
                        kernel.execute(Dim2::new(i / extent.y, i % extent.y));
                    }
                }))
                .map_err(|payload| DeviceError::Execution {
                    kernel: kernel.name().to_string(),
                    group: Dim2::new(g, 0),
                    message: panic_message(payload.as_ref()),
                })
            })
        });

        if let Err(err) = result {
            log::warn!("{}", err);
            return Err(err);
        }
        Ok(LaunchReport {
            kernel: kernel.name().to_string(),
            geometry,
            barriers_per_group: 0,
            elapsed: start.elapsed(),
        })
    }

    /// Block until every launch in flight on this accelerator has completed.
    pub fn synchronize(&self) {
        let _idle = self.in_flight.write().unwrap_or_else(|e| e.into_inner());
        log::trace!("'{}' synchronized", self.properties().name);
    }

    fn stream_group_size(&self) -> usize {
        let props = self.properties();
        (props.warp_size * 8).clamp(1, props.max_threads_per_group.max(1))
    }
}

impl fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accelerator")
            .field("device", &self.info.properties().name)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("launches", &self.launch_count())
            .finish()
    }
}

/// Validate the group dim of a launch fits within the device limits.
pub fn validate_group_dim(properties: &DeviceProperties, group: Dim2) -> Result<()> {
    if !properties.max_group_dim.can_contain(group) {
        return Err(ResourceLimitError::GroupDim {
            requested: group,
            max: properties.max_group_dim,
        }
        .into());
    }
    Ok(())
}

/// Validate the total threads of a group fit within the device limits.
pub fn validate_units(properties: &DeviceProperties, group: Dim2) -> Result<()> {
    let requested = group.num_elems();
    if requested > properties.max_threads_per_group {
        return Err(ResourceLimitError::Units {
            requested,
            max: properties.max_threads_per_group,
        }
        .into());
    }
    Ok(())
}

/// Validate a per-group scratch requirement fits within the device budget.
pub fn validate_scratch(properties: &DeviceProperties, bytes: usize) -> Result<()> {
    let available = properties.scratch_budget();
    if bytes > available {
        return Err(ResourceLimitError::Scratch {
            requested: bytes,
            available,
        }
        .into());
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}
