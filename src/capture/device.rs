//! Real camera input through `nokhwa`.
//!
//! The nokhwa handle cannot leave the thread that created it, so each
//! open stream lives on its own capture thread and frames are requested
//! over a channel.

use super::{Camera, CameraError, CaptureConfig, Frame};
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use std::sync::mpsc;
use std::thread::JoinHandle;

type Luma = (Vec<u8>, u32, u32);

enum Request {
    Capture(mpsc::Sender<Result<Luma, CameraError>>),
    Close,
}

struct Worker {
    requests: mpsc::Sender<Request>,
    thread: JoinHandle<()>,
}

/// Camera backed by the platform's native capture stack.
///
/// Frames are decoded to luma on capture. Torch control is not exposed
/// by the backend, so the torch is reported as unsupported.
#[derive(Default)]
pub struct NokhwaCamera {
    worker: Option<Worker>,
    sequence: u64,
}

impl NokhwaCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

fn classify(err: nokhwa::NokhwaError, device_id: u32) -> CameraError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        CameraError::PermissionDenied
    } else if lower.contains("not found") || lower.contains("no such") || lower.contains("no device") {
        CameraError::DeviceNotFound(format!("index {device_id}: {message}"))
    } else {
        CameraError::OpenFailed(message)
    }
}

/// Index of the first device labelled with the configured facing, else
/// the configured index.
fn resolve_index(config: &CaptureConfig) -> u32 {
    let devices = match nokhwa::query(ApiBackend::Auto) {
        Ok(devices) => devices,
        Err(e) => {
            tracing::debug!(error = %e, "Device query failed, using configured index");
            return config.device_id;
        }
    };
    let labelled: Vec<(u32, String)> = devices
        .iter()
        .filter_map(|info| {
            let index = info.index().as_index().ok()?;
            Some((index, format!("{} {}", info.human_name(), info.description())))
        })
        .collect();

    match config
        .facing
        .pick(labelled.iter().map(|(index, label)| (*index, label.as_str())))
    {
        Some(index) => {
            tracing::debug!(index, facing = ?config.facing, "Camera chosen by facing");
            index
        }
        None => config.device_id,
    }
}

fn open_device(config: &CaptureConfig) -> Result<nokhwa::Camera, CameraError> {
    let device_id = resolve_index(config);
    let format = CameraFormat::new(
        Resolution::new(config.ideal_width, config.ideal_height),
        FrameFormat::MJPEG,
        config.frame_rate,
    );
    let requested = RequestedFormat::new::<LumaFormat>(RequestedFormatType::Closest(format));

    let mut device = nokhwa::Camera::new(CameraIndex::Index(device_id), requested)
        .map_err(|e| classify(e, device_id))?;
    device.open_stream().map_err(|e| classify(e, device_id))?;

    tracing::info!(
        device = device_id,
        format = %device.camera_format(),
        "Camera stream opened"
    );
    Ok(device)
}

fn grab(device: &mut nokhwa::Camera) -> Result<Luma, CameraError> {
    let buffer = device
        .frame()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    let image = buffer
        .decode_image::<LumaFormat>()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    let (width, height) = image.dimensions();
    Ok((image.into_raw(), width, height))
}

fn serve(config: CaptureConfig, ready: mpsc::Sender<Result<(), CameraError>>, requests: mpsc::Receiver<Request>) {
    let mut device = match open_device(&config) {
        Ok(device) => {
            let _ = ready.send(Ok(()));
            device
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // A dropped sender ends the stream like an explicit close
    while let Ok(Request::Capture(reply)) = requests.recv() {
        let _ = reply.send(grab(&mut device));
    }

    if let Err(e) = device.stop_stream() {
        tracing::warn!(error = %e, "Failed to stop camera stream");
    }
}

impl Camera for NokhwaCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.close();

        let (ready_tx, ready_rx) = mpsc::channel();
        let (requests, requests_rx) = mpsc::channel();
        let config = config.clone();
        let thread = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || serve(config, ready_tx, requests_rx))
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker { requests, thread });
                self.sequence = 0;
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CameraError::OpenFailed("capture thread exited".to_string()))
            }
        }
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let worker = self.worker.as_ref().ok_or(CameraError::NotInitialized)?;
        let (reply, reply_rx) = mpsc::channel();
        worker
            .requests
            .send(Request::Capture(reply))
            .map_err(|_| CameraError::CaptureFailed("capture thread gone".to_string()))?;
        let (pixels, width, height) = reply_rx
            .recv()
            .map_err(|_| CameraError::CaptureFailed("capture thread gone".to_string()))??;

        self.sequence += 1;
        Ok(Frame::new(pixels, width, height, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn supports_torch(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::TorchUnsupported)
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.requests.send(Request::Close);
            if worker.thread.join().is_err() {
                tracing::warn!("Camera capture thread panicked");
            }
            tracing::info!("Camera closed");
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.close();
    }
}
