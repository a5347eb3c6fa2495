//! T-Rex backend

use super::{device_list, pool_args, Invocation, MinerBackend, MinerKind};

/// Backend for T-Rex
///
/// T-Rex only drives CUDA devices and takes a flat index list. Its output is
/// forwarded verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TRexBackend;

impl MinerBackend for TRexBackend {
    fn kind(&self) -> MinerKind {
        MinerKind::TRex
    }

    fn build_invocation(&self, invocation: &Invocation<'_>) -> String {
        let mut args = pool_args(invocation);
        if !invocation.hardware.is_empty() {
            args.push("-d".to_string());
            args.push(device_list(invocation.hardware));
        }
        args.join(" ")
    }
}
