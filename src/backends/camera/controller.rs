// SPDX-License-Identifier: GPL-3.0-only

//! Camera session controller
//!
//! Owns the device lifecycle and the capture session of a single camera:
//!
//! ```text
//! Unopened ─► Opening ─► Opened ─► Configuring ─► Streaming
//!                                      │
//!                                      └─► ConfigureFailed
//!
//! any state ─► Closed   (disconnect, device error, close())
//! ```
//!
//! All platform callbacks arrive on the worker thread and are forwarded as
//! [`CameraEvent`]s over a channel; the controller applies them in
//! [`CameraSessionController::handle_event`]. Nothing here retries: every
//! failure is logged and ends the attempt.
//!
//! There is no timeout on session configuration. If the platform never calls
//! back, the controller stays in `Configuring` until closed.

use super::types::*;
use super::worker::WorkerHandle;
use super::CameraPlatform;
use crate::errors::{CameraError, CameraResult};
use crate::render::texture::CaptureTarget;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Open device plus its capture session
#[derive(Debug, Clone)]
pub struct CameraSession {
    pub device: DeviceHandle,
    pub lens_facing: LensFacing,
    /// Configured capture session, once the platform reported it
    pub capture_session: Option<SessionHandle>,
    /// Request built for this session, reused as the repeating request
    pub repeating_request: Option<CaptureRequestTemplate>,
}

/// Device lifecycle and capture session owner for one lens facing
pub struct CameraSessionController {
    platform: Arc<dyn CameraPlatform>,
    worker: WorkerHandle,
    lens_facing: LensFacing,
    events_tx: CameraEventSender,
    events_rx: mpsc::UnboundedReceiver<CameraEvent>,
    state: SessionState,
    /// Device id of the outstanding open attempt
    opening: Option<String>,
    session: Option<CameraSession>,
    repeating_submissions: u64,
}

impl CameraSessionController {
    /// Create a controller bound to an injected platform service and worker
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        worker: WorkerHandle,
        lens_facing: LensFacing,
    ) -> Self {
        info!(lens_facing = %lens_facing, worker = worker.name(), "Creating camera session controller");

        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            platform,
            worker,
            lens_facing,
            events_tx: CameraEventSender::new(tx),
            events_rx: rx,
            state: SessionState::Unopened,
            opening: None,
            session: None,
            repeating_submissions: 0,
        }
    }

    pub fn lens_facing(&self) -> LensFacing {
        self.lens_facing
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state.is_streaming()
    }

    /// Session of the currently open device
    pub fn session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    /// Repeating requests handed to the platform since creation
    pub fn repeating_submissions(&self) -> u64 {
        self.repeating_submissions
    }

    /// Devices facing `required` (or this controller's facing when `None`)
    ///
    /// Permission must be checked by the caller. Without it nothing is
    /// enumerated and the result is empty; enumeration failures are logged and
    /// also yield an empty list.
    pub fn list_candidate_devices(
        &self,
        permission: CapturePermission,
        required: Option<LensFacing>,
    ) -> Vec<DeviceDescriptor> {
        let required = required.unwrap_or(self.lens_facing);

        if !permission.is_granted() {
            debug!("Capture permission not granted, skipping enumeration");
            return Vec::new();
        }

        let ids = match self.platform.enumerate_devices() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Camera enumeration failed");
                return Vec::new();
            }
        };

        ids.into_iter()
            .filter_map(|id| match self.platform.characteristics(&id) {
                Ok(characteristics) => Some(DeviceDescriptor {
                    id,
                    characteristics,
                }),
                Err(e) => {
                    warn!(device = %id, error = %e, "Failed to read camera characteristics");
                    None
                }
            })
            .filter(|device| device.lens_facing() == required)
            .collect()
    }

    /// Begin opening `device_id`
    ///
    /// The outcome arrives later as an `Opened`, `Disconnected` or `Error`
    /// event. Only one open may be outstanding and only one device may be open.
    pub fn open(&mut self, device_id: &str) -> CameraResult<()> {
        // A close during Opening keeps the attempt outstanding until the
        // platform answers it
        if let Some(pending) = &self.opening {
            warn!(device = %device_id, pending = %pending, "Open requested while another open is outstanding");
            return Err(CameraError::OpenInProgress);
        }
        if self.session.is_some() {
            warn!(device = %device_id, "Open requested while a device is open");
            return Err(CameraError::DeviceBusy);
        }

        info!(device = %device_id, "Opening camera");

        match self
            .platform
            .open(device_id, self.events_tx.clone(), &self.worker)
        {
            Ok(()) => {
                self.opening = Some(device_id.to_string());
                self.transition(SessionState::Opening);
                Ok(())
            }
            Err(e) => {
                error!(device = %device_id, error = %e, "Camera open refused");
                Err(e.into())
            }
        }
    }

    /// Configure a capture session streaming into `target` at `resolution`
    ///
    /// Requires an opened device. The repeating request is submitted later, on
    /// the worker thread, when the platform reports the session configured.
    pub fn start_preview(
        &mut self,
        target: CaptureTarget,
        resolution: PreviewResolution,
    ) -> CameraResult<()> {
        if self.state != SessionState::Opened {
            return Err(CameraError::SessionConfig(format!(
                "cannot configure a session while {}",
                self.state
            )));
        }
        let Some(session) = self.session.as_mut() else {
            return Err(CameraError::SessionConfig("no open device".into()));
        };

        if target.is_released() {
            return Err(CameraError::SessionConfig("target surface was released".into()));
        }

        let buffer_size = target.buffer_size();
        if buffer_size != resolution {
            return Err(CameraError::SessionConfig(format!(
                "surface buffer is {} but preview resolution is {}",
                buffer_size, resolution
            )));
        }

        info!(device = %session.device.device_id, resolution = %resolution, "Configuring preview session");

        let request = CaptureRequestTemplate::preview(target.clone());
        let config = SessionConfiguration {
            mode: SessionMode::Regular,
            outputs: vec![target],
        };

        if let Err(e) = self.platform.create_capture_session(
            &session.device,
            config,
            self.events_tx.clone(),
            &self.worker,
        ) {
            error!(error = %e, "Capture session creation refused");
            return Err(CameraError::SessionConfig(e.to_string()));
        }

        session.repeating_request = Some(request);
        self.transition(SessionState::Configuring);
        Ok(())
    }

    /// Release the device; a no-op when nothing is open
    pub fn close(&mut self) {
        if self.state == SessionState::Opening {
            // The stray Opened event closes the device when it arrives
            info!(device = ?self.opening, "Closing while open is outstanding");
            self.transition(SessionState::Closed);
            return;
        }

        let Some(session) = self.session.take() else {
            debug!(state = %self.state, "Close with no open device ignored");
            return;
        };

        info!(device = %session.device.device_id, "Closing camera");
        self.platform.close_device(&session.device);
        self.transition(SessionState::Closed);
    }

    /// Still capture is not supported; the request is only logged
    pub fn capture_still(&self) {
        info!(state = %self.state, "Still capture requested, not supported");
    }

    /// Wait for the next camera event
    pub async fn next_event(&mut self) -> Option<CameraEvent> {
        self.events_rx.recv().await
    }

    /// Take a pending event without waiting
    pub fn try_next_event(&mut self) -> Option<CameraEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Apply every pending event, returning how many were handled
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_event() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply one event to the session state machine
    pub fn handle_event(&mut self, event: CameraEvent) -> SessionState {
        match event {
            CameraEvent::Opened(device) => self.on_opened(device),
            CameraEvent::Disconnected(device) => {
                if self.is_current(&device) {
                    warn!(device = %device.device_id, "Camera disconnected");
                    self.teardown(&device);
                } else if self.is_opening(&device) {
                    warn!(device = %device.device_id, "Camera disconnected while opening");
                    self.abandon_open(&device);
                } else {
                    debug!(device = %device.device_id, "Ignoring disconnect of stale device");
                }
            }
            CameraEvent::Error(device, code) => {
                if self.is_current(&device) {
                    error!(device = %device.device_id, code, "Camera device error");
                    self.teardown(&device);
                } else if self.is_opening(&device) {
                    error!(device = %device.device_id, code, "Camera failed to open");
                    self.abandon_open(&device);
                } else {
                    debug!(device = %device.device_id, code, "Ignoring error of stale device");
                }
            }
            CameraEvent::Configured(capture_session) => self.on_configured(capture_session),
            CameraEvent::ConfigureFailed(device) => {
                if self.is_current(&device) && self.state == SessionState::Configuring {
                    error!(device = %device.device_id, "Capture session configuration failed");
                    if let Some(session) = self.session.as_mut() {
                        session.repeating_request = None;
                    }
                    self.transition(SessionState::ConfigureFailed);
                } else {
                    debug!(device = %device.device_id, "Ignoring stale configure failure");
                }
            }
            CameraEvent::RequestSubmitted(capture_session) => {
                if self.is_current(&capture_session.device)
                    && self.state == SessionState::Configuring
                {
                    info!(device = %capture_session.device.device_id, "Preview streaming");
                    self.transition(SessionState::Streaming);
                }
            }
            CameraEvent::RequestFailed(capture_session, err) => {
                // Session state is left as it was
                error!(
                    device = %capture_session.device.device_id,
                    error = %err,
                    state = %self.state,
                    "Repeating request submission failed"
                );
            }
        }
        self.state
    }

    fn on_opened(&mut self, device: DeviceHandle) {
        let expected = self.state == SessionState::Opening
            && self.opening.as_deref() == Some(device.device_id.as_str());

        if !expected {
            warn!(device = %device.device_id, state = %self.state, "Closing stray opened device");
            self.platform.close_device(&device);
            if self.opening.as_deref() == Some(device.device_id.as_str()) {
                self.opening = None;
            }
            return;
        }

        info!(device = %device.device_id, "Camera opened");
        self.opening = None;
        self.session = Some(CameraSession {
            device,
            lens_facing: self.lens_facing,
            capture_session: None,
            repeating_request: None,
        });
        self.transition(SessionState::Opened);
    }

    fn on_configured(&mut self, capture_session: SessionHandle) {
        if !self.is_current(&capture_session.device) || self.state != SessionState::Configuring {
            debug!(device = %capture_session.device.device_id, state = %self.state, "Ignoring stale configured session");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(request) = session.repeating_request.clone() else {
            warn!("Session configured without a pending request");
            return;
        };

        info!(device = %capture_session.device.device_id, "Capture session configured");
        session.capture_session = Some(capture_session.clone());

        let platform = Arc::clone(&self.platform);
        let worker = self.worker.clone();
        let events = self.events_tx.clone();
        let posted = self.worker.post(move || {
            match platform.set_repeating_request(&capture_session, &request, &worker) {
                Ok(()) => events.send(CameraEvent::RequestSubmitted(capture_session)),
                Err(e) => events.send(CameraEvent::RequestFailed(
                    capture_session,
                    CameraError::RequestSubmission(e.to_string()),
                )),
            }
        });

        if posted {
            self.repeating_submissions += 1;
        }
    }

    /// Close the device and drop everything that references the surface
    fn teardown(&mut self, device: &DeviceHandle) {
        self.platform.close_device(device);
        self.session = None;
        self.transition(SessionState::Closed);
    }

    /// The outstanding open attempt ended without a usable device
    fn abandon_open(&mut self, device: &DeviceHandle) {
        self.platform.close_device(device);
        self.opening = None;
        if self.state == SessionState::Opening {
            self.transition(SessionState::Closed);
        }
    }

    fn is_opening(&self, device: &DeviceHandle) -> bool {
        self.session.is_none() && self.opening.as_deref() == Some(device.device_id.as_str())
    }

    fn is_current(&self, device: &DeviceHandle) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| &session.device == device)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state transition");
            self.state = next;
        }
    }
}

impl std::fmt::Debug for CameraSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionController")
            .field("lens_facing", &self.lens_facing)
            .field("state", &self.state)
            .field("device", &self.session.as_ref().map(|s| &s.device.device_id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_platform::{
        ConfigureBehavior, OpenBehavior, VirtualCameraPlatform,
    };
    use crate::backends::camera::worker::WorkerThread;
    use crate::render::texture::{SurfaceTexture, SurfaceTextureHandle};
    use std::time::Duration;

    struct Fixture {
        platform: Arc<VirtualCameraPlatform>,
        controller: CameraSessionController,
        _worker: WorkerThread,
    }

    fn fixture(platform: VirtualCameraPlatform) -> Fixture {
        let worker = WorkerThread::start("test-camera-worker").unwrap();
        let platform = Arc::new(platform.with_frame_interval(Duration::from_millis(5)));
        let controller =
            CameraSessionController::new(platform.clone(), worker.handle(), LensFacing::Back);
        Fixture {
            platform,
            controller,
            _worker: worker,
        }
    }

    async fn next_state(controller: &mut CameraSessionController) -> SessionState {
        let event = tokio::time::timeout(Duration::from_secs(2), controller.next_event())
            .await
            .expect("timed out waiting for camera event")
            .expect("event channel closed");
        controller.handle_event(event)
    }

    /// Capture target plus the consumer half that keeps it alive
    fn sized_target(size: Size) -> (CaptureTarget, SurfaceTexture) {
        let (mut surface, consumer) = SurfaceTextureHandle::detached();
        surface.set_buffer_size(size.width, size.height).unwrap();
        (surface.capture_target().unwrap(), consumer)
    }

    #[test]
    fn test_list_without_permission_is_empty() {
        let f = fixture(VirtualCameraPlatform::with_default_devices());
        let devices = f
            .controller
            .list_candidate_devices(CapturePermission::Denied, None);
        assert!(devices.is_empty());
        assert_eq!(f.platform.enumeration_count(), 0);
    }

    #[test]
    fn test_list_filters_by_lens_facing() {
        let f = fixture(VirtualCameraPlatform::with_default_devices());
        let back = f
            .controller
            .list_candidate_devices(CapturePermission::Granted, None);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].lens_facing(), LensFacing::Back);

        let front = f
            .controller
            .list_candidate_devices(CapturePermission::Granted, Some(LensFacing::Front));
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].lens_facing(), LensFacing::Front);
    }

    #[test]
    fn test_enumeration_failure_yields_empty() {
        let f = fixture(VirtualCameraPlatform::with_default_devices().with_access_denied());
        assert!(
            f.controller
                .list_candidate_devices(CapturePermission::Granted, None)
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_open_reaches_opened() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        assert_eq!(f.controller.state(), SessionState::Opening);

        assert_eq!(next_state(&mut f.controller).await, SessionState::Opened);
        assert_eq!(f.controller.session().unwrap().device.device_id, "0");
    }

    #[tokio::test]
    async fn test_second_open_is_refused() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        assert_eq!(f.controller.open("1"), Err(CameraError::OpenInProgress));

        next_state(&mut f.controller).await;
        assert_eq!(f.controller.open("1"), Err(CameraError::DeviceBusy));
    }

    #[test]
    fn test_open_unknown_device_is_unavailable() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        assert!(matches!(
            f.controller.open("42"),
            Err(CameraError::DeviceUnavailable(_))
        ));
        assert_eq!(f.controller.state(), SessionState::Unopened);
    }

    #[test]
    fn test_start_preview_requires_opened() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        let (target, _surface) = sized_target(Size::new(640, 480));
        let result = f.controller.start_preview(target, Size::new(640, 480));
        assert!(matches!(result, Err(CameraError::SessionConfig(_))));
        assert_eq!(f.controller.state(), SessionState::Unopened);
    }

    #[tokio::test]
    async fn test_start_preview_rejects_mismatched_buffer() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        let (target, _surface) = sized_target(Size::new(640, 480));
        let result = f.controller.start_preview(target, Size::new(1280, 720));
        assert!(matches!(result, Err(CameraError::SessionConfig(_))));
        assert_eq!(f.controller.state(), SessionState::Opened);
    }

    #[tokio::test]
    async fn test_configured_session_streams_once() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        let size = Size::new(640, 480);
        let (target, _surface) = sized_target(size);
        f.controller.start_preview(target, size).unwrap();
        assert_eq!(f.controller.state(), SessionState::Configuring);

        // Configured, then RequestSubmitted
        assert_eq!(next_state(&mut f.controller).await, SessionState::Configuring);
        assert_eq!(next_state(&mut f.controller).await, SessionState::Streaming);

        assert_eq!(f.controller.repeating_submissions(), 1);
        assert_eq!(f.platform.repeating_request_count(), 1);

        let request = f.platform.last_repeating_request().unwrap();
        assert_eq!(request.af_mode, AfMode::ContinuousPicture);
        assert_eq!(request.ae_mode, AeMode::OnAutoFlash);
        assert_eq!(request.targets.len(), 1);
    }

    #[tokio::test]
    async fn test_configure_failure_is_distinct_state() {
        let mut f = fixture(
            VirtualCameraPlatform::with_default_devices()
                .with_configure_behavior(ConfigureBehavior::Fail),
        );
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        let size = Size::new(640, 480);
        let (target, _surface) = sized_target(size);
        f.controller.start_preview(target, size).unwrap();
        assert_eq!(
            next_state(&mut f.controller).await,
            SessionState::ConfigureFailed
        );
        assert_eq!(f.platform.repeating_request_count(), 0);
        assert!(!f.controller.is_streaming());
    }

    #[tokio::test]
    async fn test_request_failure_leaves_state() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices().with_request_failure());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        let size = Size::new(640, 480);
        let (target, _surface) = sized_target(size);
        f.controller.start_preview(target, size).unwrap();
        assert_eq!(next_state(&mut f.controller).await, SessionState::Configuring);

        let event = tokio::time::timeout(Duration::from_secs(2), f.controller.next_event())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            &event,
            CameraEvent::RequestFailed(_, CameraError::RequestSubmission(_))
        ));
        // RequestFailed is logged only
        assert_eq!(f.controller.handle_event(event), SessionState::Configuring);
        assert_eq!(f.controller.repeating_submissions(), 1);
    }

    #[tokio::test]
    async fn test_unanswered_configuration_never_streams() {
        let mut f = fixture(
            VirtualCameraPlatform::with_default_devices()
                .with_configure_behavior(ConfigureBehavior::Never),
        );
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        let size = Size::new(640, 480);
        let (target, _surface) = sized_target(size);
        f.controller.start_preview(target, size).unwrap();

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            f.controller.pump_events();
            assert_eq!(f.controller.state(), SessionState::Configuring);
            assert!(!f.controller.is_streaming());
        }
    }

    #[tokio::test]
    async fn test_double_close_is_noop() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        f.controller.close();
        assert_eq!(f.controller.state(), SessionState::Closed);
        assert_eq!(f.platform.close_count(), 1);

        f.controller.close();
        assert_eq!(f.controller.state(), SessionState::Closed);
        assert_eq!(f.platform.close_count(), 1);
    }

    #[test]
    fn test_close_before_open_is_noop() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.close();
        assert_eq!(f.controller.state(), SessionState::Unopened);
        assert_eq!(f.platform.close_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_session() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        f.platform.disconnect("0");
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(f.controller.session().is_none());

        // Closing afterwards does nothing
        f.controller.close();
        assert_eq!(f.platform.close_count(), 1);
    }

    #[tokio::test]
    async fn test_device_error_tears_down_session() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        next_state(&mut f.controller).await;

        f.platform.raise_error("0", 4);
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(f.controller.session().is_none());
    }

    #[tokio::test]
    async fn test_close_while_opening_closes_stray_device() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());
        f.controller.open("0").unwrap();
        f.controller.close();
        assert_eq!(f.controller.state(), SessionState::Closed);

        // The late Opened event must not resurrect the session
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(f.controller.session().is_none());
        assert_eq!(f.platform.close_count(), 1);
    }

    #[tokio::test]
    async fn test_error_while_opening_closes_and_allows_reopen() {
        let mut f = fixture(
            VirtualCameraPlatform::with_default_devices()
                .with_open_behavior(OpenBehavior::Error(3)),
        );
        f.controller.open("0").unwrap();
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(f.controller.session().is_none());
        assert!(!f.platform.is_open("0"));

        assert_eq!(f.controller.open("0"), Ok(()));
        assert_eq!(f.controller.state(), SessionState::Opening);
    }

    #[tokio::test]
    async fn test_disconnect_while_opening_closes_and_allows_reopen() {
        let mut f = fixture(
            VirtualCameraPlatform::with_default_devices()
                .with_open_behavior(OpenBehavior::Disconnect),
        );
        f.controller.open("0").unwrap();
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(f.controller.session().is_none());

        assert_eq!(f.controller.open("0"), Ok(()));
    }

    #[tokio::test]
    async fn test_close_while_opening_then_error_allows_reopen() {
        let mut f = fixture(
            VirtualCameraPlatform::with_default_devices()
                .with_open_behavior(OpenBehavior::Error(1)),
        );
        f.controller.open("0").unwrap();
        f.controller.close();
        assert_eq!(f.controller.open("0"), Err(CameraError::OpenInProgress));

        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert_eq!(f.controller.open("0"), Ok(()));
    }

    #[tokio::test]
    async fn test_reopen_waits_for_outstanding_open() {
        let mut f = fixture(VirtualCameraPlatform::with_default_devices());

        // Hold the worker so the first open stays outstanding
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        f.controller.worker.post(move || {
            let _ = release_rx.recv();
        });

        f.controller.open("0").unwrap();
        f.controller.close();
        assert_eq!(f.controller.state(), SessionState::Closed);
        assert_eq!(f.controller.open("0"), Err(CameraError::OpenInProgress));

        release_tx.send(()).unwrap();
        assert_eq!(next_state(&mut f.controller).await, SessionState::Closed);
        assert!(!f.platform.is_open("0"));
        assert_eq!(f.platform.close_count(), 1);

        f.controller.open("0").unwrap();
        assert_eq!(next_state(&mut f.controller).await, SessionState::Opened);
        assert!(f.platform.is_open("0"));

        let size = Size::new(640, 480);
        let (target, _surface) = sized_target(size);
        f.controller.start_preview(target, size).unwrap();
        assert_eq!(f.controller.state(), SessionState::Configuring);
    }
}
