use candle_core::Device;
use tracing::info;

pub fn select_device(cpu_only: bool) -> Device {
    if !cpu_only {
        #[cfg(feature = "metal")]
        {
            if let Ok(dev) = Device::new_metal(0) { info!("embedding device: Metal"); return dev; }
        }
        #[cfg(feature = "cuda")]
        {
            if let Ok(dev) = Device::new_cuda(0) { info!("embedding device: CUDA"); return dev; }
        }
    }
    info!("embedding device: CPU");
    Device::Cpu
}
