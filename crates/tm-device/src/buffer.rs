use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use tm_tensor::{DType, Extent, Layout};

use crate::error::{DeviceError, Result};

/// An element type that can live in device memory.
///
/// Device memory is an array of 32-bit words, so every element type maps to
/// and from a `u32` bit pattern.
pub trait DeviceElem: Copy + Send + Sync + Default + fmt::Debug + 'static {
    const DTYPE: DType;

    fn to_bits(self) -> u32;
    fn from_bits(bits: u32) -> Self;
}

impl DeviceElem for f32 {
    const DTYPE: DType = DType::F32;

    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }

    fn from_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl DeviceElem for i32 {
    const DTYPE: DType = DType::I32;

    fn to_bits(self) -> u32 {
        self as u32
    }

    fn from_bits(bits: u32) -> Self {
        bits as i32
    }
}

impl DeviceElem for u32 {
    const DTYPE: DType = DType::U32;

    fn to_bits(self) -> u32 {
        self
    }

    fn from_bits(bits: u32) -> Self {
        bits
    }
}

/// Tracks bytes allocated against a device's global memory.
#[derive(Debug)]
pub(crate) struct MemoryTracker {
    capacity: usize,
    allocated: AtomicUsize,
}

impl MemoryTracker {
    pub(crate) fn new(capacity: usize) -> Self {
        MemoryTracker {
            capacity,
            allocated: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reserve(&self, bytes: usize) -> Result<()> {
        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(bytes)
                    .filter(|total| *total <= self.capacity)
            })
            .map(|_| ())
            .map_err(|current| DeviceError::OutOfMemory {
                requested: bytes,
                available: self.capacity.saturating_sub(current),
            })
    }

    pub(crate) fn release(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes, Ordering::AcqRel);
    }

    pub(crate) fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }
}

/// An owning handle to device memory.
///
/// The bytes are returned to the owning accelerator when the buffer is
/// dropped. Kernels never see the buffer itself, only `View1D`/`View2D`
/// borrows of it.
pub struct DeviceBuffer<T: DeviceElem> {
    words: Box<[AtomicU32]>,
    extent: Extent,
    layout: Layout,
    tracker: Arc<MemoryTracker>,
    _elem: PhantomData<T>,
}

impl<T: DeviceElem> DeviceBuffer<T> {
    /// Allocate zeroed memory; the caller has already reserved the bytes.
    pub(crate) fn zeroed(extent: Extent, layout: Layout, tracker: Arc<MemoryTracker>) -> Self {
        let words = (0..extent.numel()).map(|_| AtomicU32::new(0)).collect();
        DeviceBuffer {
            words,
            extent,
            layout,
            tracker,
            _elem: PhantomData,
        }
    }

    pub(crate) fn bytes_for(extent: Extent) -> usize {
        extent.numel() * T::DTYPE.size_in_bytes()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn size_in_bytes(&self) -> usize {
        Self::bytes_for(self.extent)
    }

    /// Copy host data into the buffer. The lengths must match exactly.
    pub fn copy_from_host(&mut self, data: &[T]) -> Result<()> {
        if data.len() != self.words.len() {
            return Err(DeviceError::LengthMismatch {
                expected: self.words.len(),
                got: data.len(),
            });
        }
        for (word, value) in self.words.iter_mut().zip(data) {
            *word.get_mut() = value.to_bits();
        }
        Ok(())
    }

    /// Copy the buffer contents back to the host.
    pub fn to_host(&self) -> Vec<T> {
        self.words
            .iter()
            .map(|w| T::from_bits(w.load(Ordering::Relaxed)))
            .collect()
    }

    /// A flat view over all elements in storage order.
    pub fn view_1d(&self) -> View1D<'_, T> {
        View1D {
            words: &self.words,
            _elem: PhantomData,
        }
    }

    /// A 2-D view addressed by `(row, col)`.
    pub fn view_2d(&self) -> View2D<'_, T> {
        View2D {
            words: &self.words,
            extent: self.extent,
            layout: self.layout,
            _elem: PhantomData,
        }
    }
}

impl<T: DeviceElem> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.tracker.release(self.size_in_bytes());
    }
}

impl<T: DeviceElem> fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("dtype", &T::DTYPE)
            .field("extent", &self.extent)
            .field("layout", &self.layout)
            .finish()
    }
}

/// A non-owning 1-D view of device memory, valid for one launch.
#[derive(Clone, Copy)]
pub struct View1D<'a, T: DeviceElem> {
    words: &'a [AtomicU32],
    _elem: PhantomData<T>,
}

impl<'a, T: DeviceElem> View1D<'a, T> {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// # Panics
    /// Panics if `i` is out of range; inside a kernel this becomes an
    /// execution error of the launch.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        T::from_bits(self.words[i].load(Ordering::Relaxed))
    }

    /// # Panics
    /// Panics if `i` is out of range.
    #[inline]
    pub fn set(&self, i: usize, value: T) {
        self.words[i].store(value.to_bits(), Ordering::Relaxed);
    }
}

/// A non-owning 2-D view of device memory, valid for one launch.
#[derive(Clone, Copy)]
pub struct View2D<'a, T: DeviceElem> {
    words: &'a [AtomicU32],
    extent: Extent,
    layout: Layout,
    _elem: PhantomData<T>,
}

impl<'a, T: DeviceElem> View2D<'a, T> {
    pub fn rows(&self) -> usize {
        self.extent.rows
    }

    pub fn cols(&self) -> usize {
        self.extent.cols
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            self.extent.contains(row, col),
            "index ({}, {}) out of bounds for {}",
            row,
            col,
            self.extent
        );
        self.layout.offset(self.extent, row, col)
    }

    /// # Panics
    /// Panics if `(row, col)` is outside the view.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        T::from_bits(self.words[self.offset(row, col)].load(Ordering::Relaxed))
    }

    /// # Panics
    /// Panics if `(row, col)` is outside the view.
    #[inline]
    pub fn set(&self, row: usize, col: usize, value: T) {
        self.words[self.offset(row, col)].store(value.to_bits(), Ordering::Relaxed);
    }
}
