#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use depthcloud_3d as recon;

#[doc(inline)]
pub use depthcloud_linalg as linalg;

#[doc(inline)]
pub use depthcloud_3d::ReconstructionError;
