//! Sandgrid Protocol - gRPC service definitions
//!
//! This crate contains the protobuf-generated code for Sandgrid's
//! internal gRPC services.

/// Node service (sandbox state on worker nodes)
pub mod node {
    tonic::include_proto!("sandgrid.node");
}
