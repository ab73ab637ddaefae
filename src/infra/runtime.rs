// ============================================================
// Layer 6 — Process Runtime
// ============================================================
// One-time process setup, run before any data loader exists:
//
//   1. pick the WGPU device from env_args.gpuid
//        -1  → WgpuDevice::Cpu
//        n   → WgpuDevice::DiscreteGpu(n)
//   2. seed the backend RNG for that device
//   3. decide how many data-loader workers to spawn
//        macOS keeps batching in-process (0 workers)
//
// The first call wins; later calls return the same Runtime even
// when given different arguments.

use std::sync::OnceLock;

use burn::{backend::wgpu::WgpuDevice, tensor::backend::Backend};

use crate::application::config::EnvArgs;
use crate::ml::backend::TrainBackend;

#[derive(Debug, Clone)]
pub struct Runtime {
    pub seed:        u64,
    pub device:      WgpuDevice,
    pub num_workers: usize,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialise the process runtime once and return it.
pub fn init(env: &EnvArgs) -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        let device = select_device(env.gpuid);
        TrainBackend::seed(&device, env.seed);

        let runtime = Runtime {
            seed: env.seed,
            device,
            num_workers: loader_workers(env.num_workers, cfg!(target_os = "macos")),
        };
        tracing::info!(
            "Runtime ready: device={:?}, seed={}, loader workers={}",
            runtime.device, runtime.seed, runtime.num_workers,
        );
        runtime
    })
}

pub fn select_device(gpuid: i32) -> WgpuDevice {
    match usize::try_from(gpuid) {
        Ok(id) => WgpuDevice::DiscreteGpu(id),
        Err(_) => WgpuDevice::Cpu,
    }
}

fn loader_workers(requested: usize, in_process_only: bool) -> usize {
    if in_process_only {
        if requested > 0 {
            tracing::warn!("Ignoring num_workers={requested}: data loading stays in-process on this platform");
        }
        0
    } else {
        requested
    }
}
