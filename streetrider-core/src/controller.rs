//! Drive loop: runs the motion model once per display frame and pushes the
//! result to the host view.
//!
//! The host owns frame scheduling. Each call to [`DriveLoop::frame`] returns
//! a [`FrameSignal`] telling the host whether another frame is wanted.

use crate::audio::EngineCue;
use crate::dynamics::{self, DynamicsParameters, MotionState};
use crate::error::{DriveError, HostError, SettingsError};
use crate::input::InputSource;
use crate::pose::Pose;
use crate::projection::Projection;
use crate::settings::{Settings, SettingsPatch};
use crate::store::SettingsInbox;
use crate::vehicle::VehicleId;
use std::time::Duration;

/// Consecutive rejected frames before a host rejection is reported.
pub const REJECTION_REPORT_FRAMES: u32 = 120;

/// The camera/map the vehicle drives. Discovery of the underlying host
/// object happens before one of these is constructed.
pub trait HostCamera {
    fn current_pose(&self) -> Result<Pose, HostError>;

    fn zoom(&self) -> f64;

    fn apply_pose(&mut self, pose: Pose) -> Result<(), HostError>;
}

/// Rendering surface plus the loaded vehicle asset.
pub trait RenderSurface {
    fn is_ready(&self) -> bool;

    fn asset_ready(&self) -> bool;

    fn aspect(&self) -> f64;

    fn apply_projection(&mut self, projection: Projection);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Idle,
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    SurfaceNotReady,
    AssetLoading,
    HostRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSignal {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for AttachPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            interval: Duration::from_millis(200),
        }
    }
}

/// Attach window for hosts that cannot block: one `start` attempt per
/// [`DriveLoop::poll_attach`] call, spaced by the policy interval.
#[derive(Debug, Clone, Copy)]
pub struct PendingAttach {
    policy: AttachPolicy,
    attempts: u32,
    next_attempt_at: f64,
}

impl PendingAttach {
    pub fn new(policy: AttachPolicy, now_seconds: f64) -> Self {
        Self {
            policy,
            attempts: 0,
            next_attempt_at: now_seconds,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[derive(Debug)]
pub enum AttachPoll {
    Waiting,
    Started(Pose),
    Failed(DriveError),
}

/// Turns monotonic timestamps into per-frame elapsed seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous tick; 0 on the first tick or if time went
    /// backwards.
    pub fn tick(&mut self, now_seconds: f64) -> f64 {
        let elapsed = match self.last {
            Some(last) if now_seconds >= last => now_seconds - last,
            _ => 0.0,
        };
        self.last = Some(now_seconds);
        elapsed
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Everything that exists only while driving.
#[derive(Debug, Clone)]
pub struct Session {
    motion: MotionState,
    params: DynamicsParameters,
    state: DriveState,
    suspend_reason: Option<SuspendReason>,
    rejected_frames: u32,
    frames: u64,
    distance_m: f64,
}

impl Session {
    fn new(pose: Pose, params: DynamicsParameters) -> Self {
        Self {
            motion: MotionState::at_rest(pose),
            params,
            state: DriveState::Active,
            suspend_reason: None,
            rejected_frames: 0,
            frames: 0,
            distance_m: 0.0,
        }
    }

    pub fn motion(&self) -> &MotionState {
        &self.motion
    }

    pub fn params(&self) -> &DynamicsParameters {
        &self.params
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn suspend_reason(&self) -> Option<SuspendReason> {
        self.suspend_reason
    }

    /// Frames on which the motion model ran.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Meters travelled this session, forward or reverse.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    fn suspend(&mut self, reason: SuspendReason) {
        if self.suspend_reason != Some(reason) {
            log::debug!("drive session suspended: {reason:?}");
        }
        self.state = DriveState::Suspended;
        self.suspend_reason = Some(reason);
    }

    fn resume(&mut self) {
        if self.state == DriveState::Suspended {
            log::debug!("drive session resumed");
        }
        self.state = DriveState::Active;
        self.suspend_reason = None;
        self.rejected_frames = 0;
    }

    /// Counts a rejected frame; yields a diagnostic once the streak reaches
    /// [`REJECTION_REPORT_FRAMES`].
    fn record_rejection(&mut self, err: &HostError) -> Option<DriveError> {
        self.rejected_frames = self.rejected_frames.saturating_add(1);
        if self.rejected_frames == 1 {
            log::warn!("host rejected pose update: {err}");
        }
        if self.rejected_frames == REJECTION_REPORT_FRAMES {
            log::error!("host has rejected {REJECTION_REPORT_FRAMES} frames in a row: {err}");
            return Some(DriveError::HostRejected {
                frames: self.rejected_frames,
            });
        }
        None
    }
}

#[derive(Debug)]
pub struct FrameReport {
    pub signal: FrameSignal,
    pub state: DriveState,
    pub suspend_reason: Option<SuspendReason>,
    pub motion: Option<MotionState>,
    pub engine: Option<EngineCue>,
    pub horn: bool,
    pub vehicle_changed: Option<VehicleId>,
    pub diagnostic: Option<DriveError>,
    /// A queued settings update that failed validation at this boundary.
    pub settings_rejected: Option<SettingsError>,
}

impl FrameReport {
    fn idle(vehicle_changed: Option<VehicleId>) -> Self {
        Self {
            signal: FrameSignal::Stop,
            state: DriveState::Idle,
            suspend_reason: None,
            motion: None,
            engine: None,
            horn: false,
            vehicle_changed,
            diagnostic: None,
            settings_rejected: None,
        }
    }

    fn for_session(session: &Session, vehicle_changed: Option<VehicleId>, horn: bool) -> Self {
        Self {
            signal: FrameSignal::Continue,
            state: session.state,
            suspend_reason: session.suspend_reason,
            motion: Some(session.motion),
            engine: None,
            horn,
            vehicle_changed,
            diagnostic: None,
            settings_rejected: None,
        }
    }
}

pub struct DriveLoop<H, R> {
    host: H,
    surface: R,
    settings: Settings,
    next_settings: Option<Settings>,
    unreported_vehicle: Option<VehicleId>,
    rejected_settings: Option<SettingsError>,
    inbox: Option<SettingsInbox>,
    session: Option<Session>,
    clock: FrameClock,
}

impl<H: HostCamera, R: RenderSurface> DriveLoop<H, R> {
    pub fn new(host: H, surface: R, settings: Settings) -> Self {
        Self {
            host,
            surface,
            settings,
            next_settings: None,
            unreported_vehicle: None,
            rejected_settings: None,
            inbox: None,
            session: None,
            clock: FrameClock::new(),
        }
    }

    /// Settings updates pushed into `inbox` are picked up at frame
    /// boundaries.
    pub fn with_inbox(mut self, inbox: SettingsInbox) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn state(&self) -> DriveState {
        self.session
            .as_ref()
            .map_or(DriveState::Idle, |session| session.state)
    }

    pub fn is_driving(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    /// Idle -> Active at the host's current pose. Starting again while a
    /// session exists re-syncs to the host pose from rest.
    pub fn start(&mut self) -> Result<Pose, DriveError> {
        self.swap_settings();
        let pose = self.host.current_pose()?;
        let session = Session::new(pose, self.settings.dynamics());
        let restarted = self.session.replace(session).is_some();
        self.clock.reset();

        if restarted {
            log::info!("drive session re-synced to host pose {pose:?}");
        } else {
            log::info!(
                "drive session started at {:.6}, {:.6} heading {:.1}",
                pose.position.lat,
                pose.position.lng,
                pose.heading
            );
        }
        Ok(pose)
    }

    /// Calls [`start`](Self::start) until the host view is available, waiting
    /// `policy.interval` between attempts through `wait`.
    pub fn start_with_retry(
        &mut self,
        policy: AttachPolicy,
        mut wait: impl FnMut(Duration),
    ) -> Result<Pose, DriveError> {
        for attempt in 1..=policy.max_attempts {
            match self.start() {
                Ok(pose) => return Ok(pose),
                Err(DriveError::HostUnavailable(err)) => {
                    log::debug!("attach attempt {attempt}/{} failed: {err}", policy.max_attempts);
                    if attempt < policy.max_attempts {
                        wait(policy.interval);
                    }
                }
                Err(other) => return Err(other),
            }
        }

        log::error!(
            "host view not found after {} attempts; drive session not started",
            policy.max_attempts
        );
        Err(DriveError::AttachTimedOut {
            attempts: policy.max_attempts,
        })
    }

    /// Makes at most one `start` attempt when `pending` is due. Gives up with
    /// [`DriveError::AttachTimedOut`] once the policy's attempts are spent.
    pub fn poll_attach(&mut self, pending: &mut PendingAttach, now_seconds: f64) -> AttachPoll {
        if now_seconds < pending.next_attempt_at {
            return AttachPoll::Waiting;
        }
        pending.attempts += 1;

        match self.start() {
            Ok(pose) => AttachPoll::Started(pose),
            Err(DriveError::HostUnavailable(err)) => {
                let max_attempts = pending.policy.max_attempts;
                log::debug!("attach attempt {}/{max_attempts} failed: {err}", pending.attempts);
                if pending.attempts >= max_attempts {
                    log::error!(
                        "host view not found after {} attempts; drive session not started",
                        pending.attempts
                    );
                    return AttachPoll::Failed(DriveError::AttachTimedOut {
                        attempts: pending.attempts,
                    });
                }
                pending.next_attempt_at = now_seconds + pending.policy.interval.as_secs_f64();
                AttachPoll::Waiting
            }
            Err(other) => AttachPoll::Failed(other),
        }
    }

    /// Active/Suspended -> Idle. Returns the last vehicle pose.
    pub fn stop(&mut self) -> Option<Pose> {
        let session = self.session.take()?;
        let pose = session.motion.pose();
        log::info!(
            "drive session stopped after {} frames, {:.1} m",
            session.frames,
            session.distance_m
        );
        Some(pose)
    }

    /// Validates `patch` against the newest known settings and buffers the
    /// result for the next frame boundary.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<(), SettingsError> {
        let base = self.next_settings.as_ref().unwrap_or(&self.settings);
        let next = patch.apply_to(base).inspect_err(|err| {
            log::warn!("settings update rejected: {err}");
        })?;
        self.next_settings = Some(next);
        Ok(())
    }

    /// Measures elapsed time from `now_seconds` and runs one frame.
    pub fn frame_at(&mut self, now_seconds: f64, input: &impl InputSource) -> FrameReport {
        let elapsed = self.clock.tick(now_seconds);
        self.frame(elapsed, input)
    }

    pub fn frame(&mut self, elapsed_seconds: f64, input: &impl InputSource) -> FrameReport {
        let mut report = self.run_frame(elapsed_seconds, input);
        report.settings_rejected = self.rejected_settings.take();
        report
    }

    fn run_frame(&mut self, elapsed_seconds: f64, input: &impl InputSource) -> FrameReport {
        self.swap_settings();
        let vehicle_changed = self.unreported_vehicle.take();

        let Some(session) = self.session.as_mut() else {
            // Horn presses made while idle must not carry into a session.
            input.take_horn_presses();
            return FrameReport::idle(vehicle_changed);
        };
        let horn = input.take_horn_presses() > 0;

        if let Some(reason) = readiness(&self.surface) {
            session.suspend(reason);
            return FrameReport::for_session(session, vehicle_changed, horn);
        }

        if session.suspend_reason == Some(SuspendReason::HostRejected) {
            // Re-send the last pose; physics stays paused until it lands.
            let retried = self.host.apply_pose(session.motion.pose());
            let diagnostic = match retried {
                Ok(()) => {
                    session.resume();
                    None
                }
                Err(err) => session.record_rejection(&err),
            };
            let mut report = FrameReport::for_session(session, vehicle_changed, horn);
            report.diagnostic = diagnostic;
            return report;
        }
        session.resume();

        let previous = session.motion;
        let controls = input.snapshot();
        session.motion = dynamics::step(&previous, controls, &session.params, elapsed_seconds);
        session.frames += 1;
        session.distance_m += (session.motion.speed * elapsed_seconds.max(0.0)).abs();

        if let Err(err) = self.host.apply_pose(session.motion.pose()) {
            session.suspend(SuspendReason::HostRejected);
            let diagnostic = session.record_rejection(&err);
            let mut report = FrameReport::for_session(session, vehicle_changed, horn);
            report.diagnostic = diagnostic;
            return report;
        }

        let projection = Projection::from_zoom(self.host.zoom(), self.surface.aspect());
        self.surface.apply_projection(projection);

        let mut report = FrameReport::for_session(session, vehicle_changed, horn);
        report.engine = Some(EngineCue::for_speed(
            session.motion.speed,
            session.params.max_speed,
            self.settings.volume,
        ));
        report
    }

    /// Applies buffered settings in one step so a frame never sees a mix of
    /// old and new values.
    fn swap_settings(&mut self) {
        if let Some(patch) = self.inbox.as_ref().and_then(SettingsInbox::take) {
            if let Err(err) = self.update_settings(&patch) {
                self.rejected_settings = Some(err);
            }
        }

        let Some(next) = self.next_settings.take() else {
            return;
        };
        if next.vehicle_id != self.settings.vehicle_id {
            self.unreported_vehicle = Some(next.vehicle_id);
        }
        if let Some(session) = self.session.as_mut() {
            session.params = next.dynamics();
        }
        log::info!("settings applied: {:?}", next.dynamics());
        self.settings = next;
    }
}

fn readiness(surface: &impl RenderSurface) -> Option<SuspendReason> {
    if !surface.is_ready() {
        Some(SuspendReason::SurfaceNotReady)
    } else if !surface.asset_ready() {
        Some(SuspendReason::AssetLoading)
    } else {
        None
    }
}
