// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera platform
//!
//! An in-process [`CameraPlatform`] with a fixed set of synthetic cameras.
//! It behaves like a real camera service: every outcome is posted to the
//! worker and delivered as a [`CameraEvent`], and a repeating request streams
//! gradient frames into its targets until the device is closed.
//!
//! Failure modes can be switched on for exercising the session controller.

use super::frame_loop::{FrameLoopController, LoopAction};
use super::types::*;
use super::worker::WorkerHandle;
use super::CameraPlatform;
use crate::constants::{
    FRAME_BYTES_PER_PIXEL, VIRTUAL_BACK_SIZES, VIRTUAL_FRAME_INTERVAL, VIRTUAL_FRAME_THREAD_NAME,
    VIRTUAL_FRONT_SIZES,
};
use crate::errors::{PlatformError, PlatformResult};
use crate::render::texture::CaptureTarget;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// A synthetic camera
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

impl VirtualDevice {
    pub fn new(id: impl Into<String>, lens_facing: LensFacing, sizes: &[(u32, u32)]) -> Self {
        let sensor_orientation = match lens_facing {
            LensFacing::Front => 270,
            _ => 90,
        };
        Self {
            id: id.into(),
            characteristics: CameraCharacteristics {
                lens_facing,
                output_sizes: sizes.iter().copied().map(Size::from).collect(),
                sensor_orientation,
            },
        }
    }
}

/// How the platform answers a capture session request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigureBehavior {
    /// Report the session configured
    #[default]
    Succeed,
    /// Report a configuration failure
    Fail,
    /// Never answer
    Never,
}

/// How the platform answers an open request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenBehavior {
    /// Report the device opened
    #[default]
    Succeed,
    /// Report a disconnect instead of opening
    Disconnect,
    /// Report a device error with this code instead of opening
    Error(i32),
}

/// Bookkeeping for one open device
struct OpenDevice {
    handle: DeviceHandle,
    events: CameraEventSender,
    worker: WorkerHandle,
    stream: Option<FrameLoopController>,
}

#[derive(Default)]
struct PlatformState {
    open: HashMap<String, OpenDevice>,
    enumerations: u64,
    closes: u64,
    repeating_requests: u64,
    last_request: Option<CaptureRequestTemplate>,
}

/// In-process camera service with synthetic devices
pub struct VirtualCameraPlatform {
    devices: Vec<VirtualDevice>,
    access_denied: bool,
    open_behavior: OpenBehavior,
    configure_behavior: ConfigureBehavior,
    request_failure: bool,
    frame_interval: Duration,
    state: Arc<Mutex<PlatformState>>,
}

impl VirtualCameraPlatform {
    pub fn new(devices: Vec<VirtualDevice>) -> Self {
        Self {
            devices,
            access_denied: false,
            open_behavior: OpenBehavior::Succeed,
            configure_behavior: ConfigureBehavior::Succeed,
            request_failure: false,
            frame_interval: VIRTUAL_FRAME_INTERVAL,
            state: Arc::new(Mutex::new(PlatformState::default())),
        }
    }

    /// A back camera "0" and a front camera "1"
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            VirtualDevice::new("0", LensFacing::Back, VIRTUAL_BACK_SIZES),
            VirtualDevice::new("1", LensFacing::Front, VIRTUAL_FRONT_SIZES),
        ])
    }

    /// Refuse enumeration and opening as if permission was revoked
    pub fn with_access_denied(mut self) -> Self {
        self.access_denied = true;
        self
    }

    pub fn with_open_behavior(mut self, behavior: OpenBehavior) -> Self {
        self.open_behavior = behavior;
        self
    }

    pub fn with_configure_behavior(mut self, behavior: ConfigureBehavior) -> Self {
        self.configure_behavior = behavior;
        self
    }

    /// Reject every repeating request
    pub fn with_request_failure(mut self) -> Self {
        self.request_failure = true;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn devices(&self) -> &[VirtualDevice] {
        &self.devices
    }

    /// Number of `enumerate_devices` calls
    pub fn enumeration_count(&self) -> u64 {
        self.lock().enumerations
    }

    /// Number of open devices actually released
    pub fn close_count(&self) -> u64 {
        self.lock().closes
    }

    /// Number of repeating requests installed
    pub fn repeating_request_count(&self) -> u64 {
        self.lock().repeating_requests
    }

    pub fn last_repeating_request(&self) -> Option<CaptureRequestTemplate> {
        self.lock().last_request.clone()
    }

    /// Whether `device_id` is currently open
    pub fn is_open(&self, device_id: &str) -> bool {
        self.lock().open.contains_key(device_id)
    }

    /// Simulate the camera being unplugged or taken by another client
    pub fn disconnect(&self, device_id: &str) {
        self.post_device_event(device_id, CameraEvent::Disconnected);
    }

    /// Simulate a fatal device error with the given code
    pub fn raise_error(&self, device_id: &str, code: i32) {
        self.post_device_event(device_id, |handle| CameraEvent::Error(handle, code));
    }

    fn post_device_event(&self, device_id: &str, event: impl FnOnce(DeviceHandle) -> CameraEvent) {
        let state = self.lock();
        let Some(open) = state.open.get(device_id) else {
            warn!(device = %device_id, "Cannot signal a device that is not open");
            return;
        };

        let events = open.events.clone();
        let event = event(open.handle.clone());
        open.worker.post(move || events.send(event));
    }

    fn device(&self, device_id: &str) -> PlatformResult<&VirtualDevice> {
        self.devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| PlatformError::NoSuchDevice(device_id.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CameraPlatform for VirtualCameraPlatform {
    fn enumerate_devices(&self) -> PlatformResult<Vec<String>> {
        self.lock().enumerations += 1;
        if self.access_denied {
            return Err(PlatformError::AccessDenied);
        }
        Ok(self.devices.iter().map(|d| d.id.clone()).collect())
    }

    fn characteristics(&self, device_id: &str) -> PlatformResult<CameraCharacteristics> {
        Ok(self.device(device_id)?.characteristics.clone())
    }

    fn open(
        &self,
        device_id: &str,
        events: CameraEventSender,
        worker: &WorkerHandle,
    ) -> PlatformResult<()> {
        if self.access_denied {
            return Err(PlatformError::AccessDenied);
        }
        self.device(device_id)?;
        if self.lock().open.contains_key(device_id) {
            return Err(PlatformError::Busy(device_id.to_string()));
        }

        let id = device_id.to_string();
        let state = Arc::clone(&self.state);
        let job_worker = worker.clone();
        let behavior = self.open_behavior;
        let posted = worker.post(move || {
            let handle = DeviceHandle::new(id.clone());
            match behavior {
                OpenBehavior::Succeed => {}
                OpenBehavior::Disconnect => {
                    debug!(device = %id, "Virtual camera disconnected while opening");
                    events.send(CameraEvent::Disconnected(handle));
                    return;
                }
                OpenBehavior::Error(code) => {
                    debug!(device = %id, code, "Virtual camera failed to open");
                    events.send(CameraEvent::Error(handle, code));
                    return;
                }
            }
            {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.open.insert(
                    id.clone(),
                    OpenDevice {
                        handle: handle.clone(),
                        events: events.clone(),
                        worker: job_worker,
                        stream: None,
                    },
                );
            }
            debug!(device = %id, serial = handle.serial(), "Virtual camera opened");
            events.send(CameraEvent::Opened(handle));
        });

        if posted {
            Ok(())
        } else {
            Err(PlatformError::Failed("camera worker is not running".into()))
        }
    }

    fn create_capture_session(
        &self,
        device: &DeviceHandle,
        config: SessionConfiguration,
        events: CameraEventSender,
        worker: &WorkerHandle,
    ) -> PlatformResult<()> {
        {
            let state = self.lock();
            match state.open.get(&device.device_id) {
                Some(open) if open.handle == *device => {}
                _ => return Err(PlatformError::Closed),
            }
        }

        let usable = !config.outputs.is_empty() && config.outputs.iter().all(|t| !t.is_released());
        let behavior = if usable {
            self.configure_behavior
        } else {
            warn!(device = %device.device_id, "Session outputs are missing or released");
            ConfigureBehavior::Fail
        };

        debug!(device = %device.device_id, outputs = config.outputs.len(), ?behavior, "Configuring virtual session");

        let device = device.clone();
        match behavior {
            ConfigureBehavior::Succeed => {
                worker.post(move || events.send(CameraEvent::Configured(SessionHandle::new(device))));
            }
            ConfigureBehavior::Fail => {
                worker.post(move || events.send(CameraEvent::ConfigureFailed(device)));
            }
            ConfigureBehavior::Never => {
                info!(device = %device.device_id, "Virtual session will never be configured");
            }
        }
        Ok(())
    }

    fn set_repeating_request(
        &self,
        session: &SessionHandle,
        request: &CaptureRequestTemplate,
        _worker: &WorkerHandle,
    ) -> PlatformResult<()> {
        if self.request_failure {
            return Err(PlatformError::Failed("repeating request rejected".into()));
        }

        let previous = {
            let mut state = self.lock();
            let open = match state.open.get_mut(&session.device.device_id) {
                Some(open) if open.handle == session.device => open,
                _ => return Err(PlatformError::Closed),
            };

            let stream = FrameLoopController::start(
                VIRTUAL_FRAME_THREAD_NAME,
                self.frame_interval,
                frame_producer(request.targets.clone()),
            )
            .map_err(|e| PlatformError::Failed(e.to_string()))?;
            let previous = open.stream.replace(stream);

            state.repeating_requests += 1;
            state.last_request = Some(request.clone());
            previous
        };
        // Join the replaced stream outside the lock
        drop(previous);

        info!(
            device = %session.device.device_id,
            af = ?request.af_mode,
            ae = ?request.ae_mode,
            "Virtual repeating request installed"
        );
        Ok(())
    }

    fn close_device(&self, device: &DeviceHandle) {
        let released = {
            let mut state = self.lock();
            let matches = state
                .open
                .get(&device.device_id)
                .is_some_and(|open| open.handle == *device);
            if !matches {
                debug!(device = %device.device_id, "Close of a device that is not open ignored");
                return;
            }
            state.closes += 1;
            state.open.remove(&device.device_id)
        };

        // Dropping the stream stops its thread
        drop(released);
        info!(device = %device.device_id, "Virtual camera closed");
    }
}

/// Frame loop body streaming a gradient into every target
fn frame_producer(targets: Vec<CaptureTarget>) -> impl FnMut() -> LoopAction + Send + 'static {
    let patterns: Vec<(CaptureTarget, Arc<[u8]>)> = targets
        .into_iter()
        .map(|target| {
            let pattern = gradient(target.buffer_size());
            (target, pattern)
        })
        .collect();
    let mut sequence = 0u64;

    move || {
        sequence += 1;
        let mut delivered = false;
        for (target, pattern) in &patterns {
            let size = target.buffer_size();
            let frame = CameraFrame {
                width: size.width,
                height: size.height,
                sequence,
                data: Arc::clone(pattern),
                captured_at: Instant::now(),
            };
            delivered |= target.queue_frame(frame);
        }

        if patterns.iter().all(|(target, _)| target.is_released()) {
            debug!(sequence, "All preview surfaces released, stopping frames");
            return LoopAction::Stop;
        }
        if !delivered {
            trace!(sequence, "Frame not delivered to any surface");
        }
        LoopAction::Continue
    }
}

/// RGBA gradient: red grows left to right, green top to bottom
fn gradient(size: Size) -> Arc<[u8]> {
    let (w, h) = (size.width.max(1), size.height.max(1));
    let mut data = Vec::with_capacity((w * h * FRAME_BYTES_PER_PIXEL) as usize);
    for y in 0..h {
        let g = (y * 255 / h) as u8;
        for x in 0..w {
            let r = (x * 255 / w) as u8;
            data.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    data.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::worker::WorkerThread;
    use crate::render::context::RecordingContext;
    use crate::render::texture::{FrameAvailableListener, TextureSurfaceProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn recv(rx: &mut mpsc::UnboundedReceiver<CameraEvent>) -> CameraEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            assert!(Instant::now() < deadline, "timed out waiting for event");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_default_devices() {
        let platform = VirtualCameraPlatform::with_default_devices();
        assert_eq!(platform.enumerate_devices().unwrap(), vec!["0", "1"]);

        let back = platform.characteristics("0").unwrap();
        assert_eq!(back.lens_facing, LensFacing::Back);
        assert_eq!(back.sensor_orientation, 90);
        assert_eq!(back.output_sizes.len(), VIRTUAL_BACK_SIZES.len());

        let front = platform.characteristics("1").unwrap();
        assert_eq!(front.lens_facing, LensFacing::Front);
        assert_eq!(front.sensor_orientation, 270);

        assert_eq!(
            platform.characteristics("9").unwrap_err(),
            PlatformError::NoSuchDevice("9".into())
        );
    }

    #[test]
    fn test_access_denied() {
        let worker = WorkerThread::start("test-worker").unwrap();
        let platform = VirtualCameraPlatform::with_default_devices().with_access_denied();
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(
            platform.enumerate_devices().unwrap_err(),
            PlatformError::AccessDenied
        );
        assert_eq!(
            platform
                .open("0", CameraEventSender::new(tx), &worker.handle())
                .unwrap_err(),
            PlatformError::AccessDenied
        );
    }

    #[test]
    fn test_open_delivers_on_worker_and_busy_while_open() {
        let worker = WorkerThread::start("test-worker").unwrap();
        let platform = VirtualCameraPlatform::with_default_devices();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = CameraEventSender::new(tx);

        platform.open("0", events.clone(), &worker.handle()).unwrap();
        let CameraEvent::Opened(handle) = recv(&mut rx) else {
            panic!("expected Opened");
        };
        assert_eq!(handle.device_id, "0");
        assert!(platform.is_open("0"));
        assert_eq!(
            platform.open("0", events, &worker.handle()).unwrap_err(),
            PlatformError::Busy("0".into())
        );

        platform.close_device(&handle);
        platform.close_device(&handle);
        assert_eq!(platform.close_count(), 1);
        assert!(!platform.is_open("0"));
    }

    #[test]
    fn test_repeating_request_streams_until_close() {
        let worker = WorkerThread::start("test-worker").unwrap();
        let platform = VirtualCameraPlatform::with_default_devices()
            .with_frame_interval(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = CameraEventSender::new(tx);

        platform.open("1", events.clone(), &worker.handle()).unwrap();
        let CameraEvent::Opened(device) = recv(&mut rx) else {
            panic!("expected Opened");
        };

        let mut ctx = RecordingContext::new();
        let mut provider = TextureSurfaceProvider::new();
        let texture = provider.create_external_texture(&mut ctx).unwrap();
        let frames = Arc::new(AtomicUsize::new(0));
        let frames_clone = Arc::clone(&frames);
        let listener: Arc<dyn FrameAvailableListener> = Arc::new(move || {
            frames_clone.fetch_add(1, Ordering::SeqCst);
        });
        let mut surface = provider.bind_surface_texture(texture, listener).unwrap();
        surface.set_buffer_size(64, 48).unwrap();
        let target = surface.capture_target().unwrap();

        platform
            .create_capture_session(
                &device,
                SessionConfiguration {
                    mode: SessionMode::Regular,
                    outputs: vec![target.clone()],
                },
                events,
                &worker.handle(),
            )
            .unwrap();
        let CameraEvent::Configured(session) = recv(&mut rx) else {
            panic!("expected Configured");
        };

        platform
            .set_repeating_request(
                &session,
                &CaptureRequestTemplate::preview(target),
                &worker.handle(),
            )
            .unwrap();
        assert_eq!(platform.repeating_request_count(), 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        while frames.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(frames.load(Ordering::SeqCst) >= 3);
        assert!(provider.update_tex_image(&mut ctx).unwrap().is_some());

        platform.close_device(&device);
        assert!(!platform.is_open("1"));

        // No frames after the device is closed
        let after_close = frames.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(frames.load(Ordering::SeqCst), after_close);
    }

    #[test]
    fn test_disconnect_posts_event() {
        let worker = WorkerThread::start("test-worker").unwrap();
        let platform = VirtualCameraPlatform::with_default_devices();
        let (tx, mut rx) = mpsc::unbounded_channel();

        platform
            .open("0", CameraEventSender::new(tx), &worker.handle())
            .unwrap();
        let CameraEvent::Opened(handle) = recv(&mut rx) else {
            panic!("expected Opened");
        };

        platform.disconnect("0");
        let CameraEvent::Disconnected(gone) = recv(&mut rx) else {
            panic!("expected Disconnected");
        };
        assert_eq!(gone, handle);
    }

    #[test]
    fn test_gradient_matches_size() {
        let data = gradient(Size::new(4, 2));
        assert_eq!(data.len(), 4 * 2 * 4);
        assert_eq!(&data[0..4], &[0, 0, 128, 255]);
    }
}
