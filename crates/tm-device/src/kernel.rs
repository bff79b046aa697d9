use crate::error::Result;
use crate::geometry::Dim2;
use crate::group::GroupContext;

/// A kernel launched over an explicit grid of thread groups.
///
/// The kernel owns its buffer views as fields, so a kernel value is bound to
/// one set of buffers for one launch.
pub trait GroupKernel: Sync {
    /// Returns the name of this kernel, used in logs and errors.
    fn name(&self) -> &str;

    /// Scratch bytes one group allocates for the given group dim.
    ///
    /// Checked against the device budget before any group runs.
    fn scratch_bytes(&self, group: Dim2) -> usize;

    /// Execute every phase of one group.
    fn execute_group(&self, group: &mut GroupContext) -> Result<()>;
}

/// A kernel launched over an exact index range; the runtime chooses how the
/// range is split into groups. Every index in the range is visited once.
pub trait StreamKernel: Sync {
    fn name(&self) -> &str;

    /// Check the launch range against the kernel's buffers.
    fn validate(&self, _extent: Dim2) -> std::result::Result<(), String> {
        Ok(())
    }

    fn execute(&self, index: Dim2);
}
