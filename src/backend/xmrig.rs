//! XMRig backend
//!
//! XMRig picks GPUs per compute API, so CUDA and OpenCL devices take different
//! flags. Its console output is prefixed with a bracketed timestamp which is
//! stripped before forwarding.

use super::{device_list, pool_args, Invocation, LogLine, MinerBackend, MinerKind};
use crate::{HardwareKind, HardwareUnit};
use once_cell::sync::Lazy;
use regex::Regex;

static TAGGED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[[^\]]*\]\s*(.*?)\s*$").expect("tagged line pattern"));

/// Backend for XMRig
#[derive(Debug, Clone, Copy, Default)]
pub struct XmrigBackend;

impl XmrigBackend {
    /// Device selection flags, chosen by the family of the first unit
    fn device_args(hardware: &[HardwareUnit]) -> Vec<String> {
        let Some(first) = hardware.first() else {
            return Vec::new();
        };
        let family = hardware.iter().filter(|unit| unit.kind == first.kind);

        match first.kind {
            HardwareKind::Cuda => vec![
                "--no-cpu".to_string(),
                "--cuda".to_string(),
                format!("--cuda-devices={}", device_list(family)),
            ],
            HardwareKind::OpenCl => vec![
                "--no-cpu".to_string(),
                "--opencl".to_string(),
                format!("--opencl-platform={}", first.platform),
                format!("--opencl-devices={}", device_list(family)),
            ],
            HardwareKind::Cpu => Vec::new(),
        }
    }
}

impl MinerBackend for XmrigBackend {
    fn kind(&self) -> MinerKind {
        MinerKind::Xmrig
    }

    fn build_invocation(&self, invocation: &Invocation<'_>) -> String {
        let mut args = pool_args(invocation);
        args.push("--no-color".to_string());
        args.extend(Self::device_args(invocation.hardware));
        args.join(" ")
    }

    fn classify_line(&self, line: &str) -> LogLine {
        match TAGGED_LINE.captures(line).and_then(|caps| caps.get(1)) {
            Some(message) if !message.as_str().is_empty() => LogLine::tagged(message.as_str()),
            _ => LogLine::raw(line),
        }
    }
}
