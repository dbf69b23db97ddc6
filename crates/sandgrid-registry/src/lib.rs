//! Sandgrid Registry - Control-plane instance cache
//!
//! One record per live sandbox, mirroring the node assignment and the
//! last metadata map the owning node acknowledged. Records are created
//! when a sandbox is provisioned and removed when it terminates; every
//! metadata update call reads and (on success) rewrites its record here.

mod record;
mod registry;

pub use record::InstanceRecord;
pub use registry::InstanceRegistry;
