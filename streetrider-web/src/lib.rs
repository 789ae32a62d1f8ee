#[cfg(target_arch = "wasm32")]
use macroquad::miniquad;
use macroquad::file::load_string;
use macroquad::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use streetrider_core::audio::ENGINE_FADE_OUT_MILLIS;
use streetrider_core::settings::{KEY_MAX_SPEED, KEY_VEHICLE_ID, KEY_VOLUME};
use streetrider_core::{
    AttachPoll, AttachPolicy, AudioMix, ConfigStore, DriveLoop, DriveState, EngineCue,
    HostCamera, InputLatch, LatLng, MemoryConfigStore, MotionState, PendingAttach,
    RenderSurface, Settings, SettingsInbox, SuspendReason, VehicleId,
};

use crate::keys::code_name;
use crate::marker::{MapView, MarkerDrawConfig, draw_vehicle_marker};
use crate::overlay::OverlaySurface;
use crate::panorama::SimulatedPanorama;

mod keys;
mod marker;
mod overlay;
mod panorama;

const SETTINGS_PATH: &str = "assets/settings.json";
const START_POSITION: LatLng = LatLng {
    lat: 48.858_370,
    lng: 2.294_481,
};
const START_HEADING: f64 = 0.0;
const METERS_PER_PIXEL_AT_BASE_FOV: f64 = 0.5;
const GRID_METERS: f64 = 25.0;
const TRAIL_SPACING_METERS: f64 = 2.0;
const TRAIL_MAX_POINTS: usize = 600;
const HORN_FLASH_SECONDS: f64 = 0.4;
const VOLUME_STEP: f64 = 0.1;
const ZOOM_STEP: f64 = 0.5;

static PENDING_START: AtomicBool = AtomicBool::new(false);
static PENDING_STOP: AtomicBool = AtomicBool::new(false);
static DRIVING: AtomicBool = AtomicBool::new(false);

fn pending_settings() -> &'static Mutex<Vec<Map<String, Value>>> {
    static PENDING_SETTINGS: OnceLock<Mutex<Vec<Map<String, Value>>>> = OnceLock::new();
    PENDING_SETTINGS.get_or_init(|| Mutex::new(Vec::new()))
}

fn queue_settings(value: Value) {
    let Value::Object(values) = value else {
        return;
    };
    match pending_settings().lock() {
        Ok(mut pending) => pending.push(values),
        Err(poisoned) => poisoned.into_inner().push(values),
    }
}

fn take_pending_settings() -> Vec<Map<String, Value>> {
    match pending_settings().lock() {
        Ok(mut pending) => std::mem::take(&mut *pending),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_start() {
    log_command("rider: start");
    PENDING_START.store(true, Ordering::SeqCst);
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_stop() {
    log_command("rider: stop");
    PENDING_STOP.store(true, Ordering::SeqCst);
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_set_vehicle(index: u32) {
    let Some(vehicle) = VehicleId::ALL.get(index as usize) else {
        log_command(&format!("rider: no vehicle at index {index}"));
        return;
    };
    log_command(&format!("rider: vehicle {vehicle}"));
    queue_settings(json!({ KEY_VEHICLE_ID: vehicle.id() }));
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_set_volume(volume: f32) {
    log_command(&format!("rider: volume {volume}"));
    queue_settings(json!({ KEY_VOLUME: volume }));
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_set_max_speed(max_speed: f32) {
    log_command(&format!("rider: max speed {max_speed}"));
    queue_settings(json!({ KEY_MAX_SPEED: max_speed }));
}

#[unsafe(no_mangle)]
pub extern "C" fn rider_is_driving() -> i32 {
    if DRIVING.load(Ordering::SeqCst) { 1 } else { 0 }
}

fn log_command(label: &str) {
    #[cfg(target_arch = "wasm32")]
    miniquad::info!("{}", label);
    #[cfg(not(target_arch = "wasm32"))]
    log::info!("{}", label);
}

fn take_pending_start() -> bool {
    PENDING_START.swap(false, Ordering::SeqCst)
}

fn take_pending_stop() -> bool {
    PENDING_STOP.swap(false, Ordering::SeqCst)
}

/// Multiples of `step` within `half_extent` of `center`, ascending.
fn grid_lines(center: f64, step: f64, half_extent: f64) -> Vec<f64> {
    if step <= 0.0 || !half_extent.is_finite() {
        return Vec::new();
    }
    let first = ((center - half_extent) / step).ceil() as i64;
    let last = ((center + half_extent) / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn meters_per_pixel(fov_degrees: f64) -> f64 {
    METERS_PER_PIXEL_AT_BASE_FOV * fov_degrees / streetrider_core::projection::BASE_FOV_DEGREES
}

fn state_label(state: DriveState, reason: Option<SuspendReason>) -> String {
    match (state, reason) {
        (DriveState::Idle, _) => "idle (Enter to drive)".to_string(),
        (DriveState::Active, _) => "driving".to_string(),
        (DriveState::Suspended, Some(SuspendReason::SurfaceNotReady)) => {
            "paused: window not ready".to_string()
        }
        (DriveState::Suspended, Some(SuspendReason::AssetLoading)) => {
            "paused: loading vehicle".to_string()
        }
        (DriveState::Suspended, Some(SuspendReason::HostRejected)) => {
            "paused: panorama rejected update".to_string()
        }
        (DriveState::Suspended, None) => "paused".to_string(),
    }
}

/// Engine cue to show after a frame. Paused sessions fade the engine out;
/// an active frame without a cue keeps the previous one.
fn engine_for_frame(
    state: DriveState,
    cue: Option<EngineCue>,
    previous: Option<EngineCue>,
) -> Option<EngineCue> {
    match state {
        DriveState::Active => cue.or(previous),
        DriveState::Suspended => Some(EngineCue::FadeOut {
            millis: ENGINE_FADE_OUT_MILLIS,
        }),
        DriveState::Idle => None,
    }
}

fn engine_label(engine: Option<EngineCue>) -> String {
    match engine {
        Some(EngineCue::Playing { rate, volume }) => {
            format!("engine: rate {rate:.2} vol {volume:.2}")
        }
        Some(EngineCue::FadeOut { millis }) => format!("engine: fade out {millis} ms"),
        None => "engine: off".to_string(),
    }
}

struct StreetRider {
    drive: DriveLoop<SimulatedPanorama, OverlaySurface>,
    store: MemoryConfigStore,
    latch: InputLatch,
    attach: Option<PendingAttach>,
    trail: VecDeque<LatLng>,
    motion: Option<MotionState>,
    engine: Option<EngineCue>,
    suspend_reason: Option<SuspendReason>,
    status: Option<String>,
    horn_until: f64,
    fps: f32,
    fps_frame_count: u32,
    fps_last_update_time: f64,
}

impl StreetRider {
    fn new(settings: Settings) -> Self {
        let now = get_time();
        let panorama = SimulatedPanorama::new(START_POSITION, START_HEADING);
        let surface = OverlaySurface::new(settings.vehicle_id, now);

        let inbox = SettingsInbox::new();
        let mut store = MemoryConfigStore::with_settings(settings.clone());
        store.subscribe(inbox.listener());
        let drive = DriveLoop::new(panorama, surface, settings).with_inbox(inbox);

        Self {
            drive,
            store,
            latch: InputLatch::new(),
            attach: None,
            trail: VecDeque::new(),
            motion: None,
            engine: None,
            suspend_reason: None,
            status: None,
            horn_until: 0.0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_last_update_time: now,
        }
    }

    fn start(&mut self) {
        if self.attach.is_none() {
            self.attach = Some(PendingAttach::new(AttachPolicy::default(), get_time()));
        }
    }

    fn poll_attach(&mut self, now: f64) {
        let Some(pending) = self.attach.as_mut() else {
            return;
        };
        match self.drive.poll_attach(pending, now) {
            AttachPoll::Waiting => {}
            AttachPoll::Started(_) => {
                self.attach = None;
                self.latch.reset();
                self.status = None;
                self.trail.clear();
            }
            AttachPoll::Failed(err) => {
                self.attach = None;
                log::warn!("could not start driving: {err}");
                self.status = Some(err.to_string());
            }
        }
    }

    fn stop(&mut self) {
        self.attach = None;
        self.latch.reset();
        if self.drive.stop().is_some() {
            self.engine = None;
        }
    }

    fn toggle_driving(&mut self) {
        if self.drive.is_driving() || self.attach.is_some() {
            self.stop();
        } else {
            self.start();
        }
    }

    fn set_settings(&mut self, values: Map<String, Value>) {
        match self.store.set(values) {
            Ok(()) => self.status = None,
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn apply_pending_commands(&mut self) {
        if take_pending_stop() {
            self.stop();
        }
        if take_pending_start() {
            self.start();
        }
        for values in take_pending_settings() {
            self.set_settings(values);
        }
    }

    fn handle_keyboard(&mut self) {
        let bindings = self.drive.settings().controls.clone();

        for key in get_keys_released() {
            if let Some(code) = code_name(key) {
                self.latch.handle_key(code, false, &bindings);
            }
        }

        let driving = self.drive.is_driving();
        for key in get_keys_pressed() {
            match code_name(key).and_then(|code| bindings.action_for(code)) {
                Some(action) if driving => self.latch.press(action),
                Some(_) => {}
                None => self.handle_command_key(key),
            }
        }
    }

    fn handle_command_key(&mut self, key: KeyCode) {
        let vehicle_slot = match key {
            KeyCode::Key1 => Some(0),
            KeyCode::Key2 => Some(1),
            KeyCode::Key3 => Some(2),
            _ => None,
        };
        if let Some(vehicle) = vehicle_slot.and_then(|slot| VehicleId::ALL.get(slot)) {
            self.set_settings(object(json!({ KEY_VEHICLE_ID: vehicle.id() })));
            return;
        }

        match key {
            KeyCode::Enter => self.toggle_driving(),
            KeyCode::T => {
                self.drive.host_mut().toggle_attached();
            }
            KeyCode::Minus | KeyCode::Equal => {
                let delta = if key == KeyCode::Minus {
                    -VOLUME_STEP
                } else {
                    VOLUME_STEP
                };
                let volume = (self.store.settings().volume + delta).clamp(0.0, 1.0);
                self.set_settings(object(json!({ KEY_VOLUME: volume })));
            }
            _ => {}
        }
    }

    fn handle_mouse_wheel_zoom(&mut self) {
        let (_wheel_x, wheel_y) = mouse_wheel();
        if wheel_y == 0.0 {
            return;
        }
        self.drive
            .host_mut()
            .zoom_by(f64::from(wheel_y.signum()) * ZOOM_STEP);
    }

    fn update(&mut self) {
        let now = get_time();
        self.drive
            .surface_mut()
            .update(screen_width(), screen_height(), now);

        self.apply_pending_commands();
        self.handle_keyboard();
        self.handle_mouse_wheel_zoom();
        self.poll_attach(now);

        let report = self.drive.frame_at(now, &self.latch);
        if let Some(vehicle) = report.vehicle_changed {
            self.drive.surface_mut().begin_asset_load(vehicle, now);
        }
        if report.horn {
            self.horn_until = now + HORN_FLASH_SECONDS;
        }
        if let Some(diagnostic) = report.diagnostic {
            self.status = Some(diagnostic.to_string());
        }
        if let Some(err) = report.settings_rejected {
            self.status = Some(err.to_string());
        }
        self.engine = engine_for_frame(report.state, report.engine, self.engine);
        self.suspend_reason = report.suspend_reason;
        self.motion = report.motion;
        if let Some(motion) = self.motion {
            self.push_trail(motion.position);
        }

        DRIVING.store(self.drive.is_driving(), Ordering::SeqCst);
        self.update_fps_if_due();
    }

    fn push_trail(&mut self, position: LatLng) {
        let far_enough = self
            .trail
            .back()
            .is_none_or(|last| last.distance_to(position) >= TRAIL_SPACING_METERS);
        if !far_enough {
            return;
        }
        self.trail.push_back(position);
        while self.trail.len() > TRAIL_MAX_POINTS {
            self.trail.pop_front();
        }
    }

    fn update_fps_if_due(&mut self) {
        let now = get_time();
        self.fps_frame_count += 1;
        let elapsed = now - self.fps_last_update_time;
        if elapsed >= 1.0 {
            self.fps = self.fps_frame_count as f32 / elapsed as f32;
            self.fps_frame_count = 0;
            self.fps_last_update_time = now;
        }
    }

    fn vehicle_pose(&self) -> (LatLng, f64) {
        match self.motion {
            Some(motion) => (motion.position, motion.heading),
            None => {
                let pose = self.drive.host().pose();
                (pose.position, pose.heading)
            }
        }
    }

    fn fov_degrees(&self) -> f64 {
        self.drive
            .surface()
            .projection()
            .map_or(streetrider_core::projection::BASE_FOV_DEGREES, |projection| {
                projection.fov_degrees
            })
    }

    fn render(&self) {
        clear_background(Color::from_rgba(24, 28, 36, 255));

        let (position, heading) = self.vehicle_pose();
        let view = MapView::new(position, meters_per_pixel(self.fov_degrees()));
        let screen_center = vec2(screen_width() * 0.5, screen_height() * 0.5);

        self.render_grid(&view, screen_center);
        self.render_trail(&view, screen_center);

        let vehicle = self.drive.surface().vehicle();
        let mut marker = MarkerDrawConfig::for_vehicle(vehicle);
        if !self.drive.surface().asset_ready() {
            marker.fill_color = GRAY;
        }
        draw_vehicle_marker(heading, screen_center, &marker);

        self.render_hud(position, heading);
    }

    fn render_grid(&self, view: &MapView, screen_center: Vec2) {
        let grid_color = Color::from_rgba(60, 68, 84, 255);
        let half_width_m = f64::from(screen_width()) * 0.5 * view.meters_per_pixel;
        let half_height_m = f64::from(screen_height()) * 0.5 * view.meters_per_pixel;

        let lat_step = (GRID_METERS / streetrider_core::EARTH_RADIUS_METERS).to_degrees();
        let lng_step = lat_step / view.center.lat.to_radians().cos().abs().max(1e-6);
        let lat_extent = (half_height_m / streetrider_core::EARTH_RADIUS_METERS).to_degrees();
        let lng_extent = (half_width_m / streetrider_core::EARTH_RADIUS_METERS).to_degrees()
            / view.center.lat.to_radians().cos().abs().max(1e-6);

        for lat in grid_lines(view.center.lat, lat_step, lat_extent) {
            let y = view.to_screen(LatLng::new(lat, view.center.lng), screen_center).y;
            draw_line(0.0, y, screen_width(), y, 1.0, grid_color);
        }
        for lng in grid_lines(view.center.lng, lng_step, lng_extent) {
            let x = view.to_screen(LatLng::new(view.center.lat, lng), screen_center).x;
            draw_line(x, 0.0, x, screen_height(), 1.0, grid_color);
        }
    }

    fn render_trail(&self, view: &MapView, screen_center: Vec2) {
        let trail_color = Color::from_rgba(230, 190, 80, 200);
        let points: Vec<Vec2> = self
            .trail
            .iter()
            .map(|&position| view.to_screen(position, screen_center))
            .collect();
        for pair in points.windows(2) {
            draw_line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, 3.0, trail_color);
        }
    }

    fn render_hud(&self, position: LatLng, heading: f64) {
        let settings = self.drive.settings();
        let panorama = self.drive.host();
        let speed = self.motion.map_or(0.0, |motion| motion.speed);
        let odometer = self.drive.session().map_or(0.0, |session| session.distance_m());
        let mix = AudioMix::from_volume(settings.volume);
        let vehicle_line = if self.drive.surface().asset_ready() {
            format!("vehicle: {}", self.drive.surface().vehicle().display_name())
        } else {
            format!(
                "vehicle: {} (loading)",
                self.drive.surface().vehicle().display_name()
            )
        };

        let lines = [
            match self.attach {
                Some(pending) => format!(
                    "state: attaching to panorama (attempt {})",
                    pending.attempts() + 1
                ),
                None => format!("state: {}", state_label(self.drive.state(), self.suspend_reason)),
            },
            format!("speed: {:.1} km/h", speed * 3.6),
            format!("heading: {heading:.1} deg"),
            format!("position: {:.6}, {:.6}", position.lat, position.lng),
            format!("fov: {:.1} deg (zoom {:.1})", self.fov_degrees(), panorama.zoom()),
            engine_label(self.engine),
            vehicle_line,
            format!("odometer: {odometer:.0} m"),
            format!(
                "volume: {:.0}% (ambient {:.2})",
                settings.volume * 100.0,
                mix.ambient
            ),
            format!(
                "panorama: {}, {} updates (T to toggle)",
                if panorama.is_attached() {
                    "attached"
                } else {
                    "detached"
                },
                panorama.applied_updates()
            ),
        ];

        let mut y = 40.0;
        for line in &lines {
            draw_text(line, 20.0, y, 24.0, WHITE);
            y += 24.0;
        }

        if get_time() < self.horn_until {
            draw_text("HONK", 20.0, y + 8.0, 32.0, YELLOW);
            y += 32.0;
        }
        if let Some(status) = &self.status {
            draw_text(status, 20.0, y + 16.0, 24.0, Color::from_rgba(255, 110, 110, 255));
        }

        let fps_text = format!("fps: {:.0}", self.fps);
        draw_text(&fps_text, screen_width() - 120.0, 40.0, 24.0, WHITE);
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(values) => values,
        _ => Map::new(),
    }
}

async fn load_settings() -> Settings {
    match load_string(SETTINGS_PATH).await {
        Ok(json) => match Settings::from_json(&json) {
            Ok(settings) => {
                log::info!("loaded settings from {SETTINGS_PATH}");
                settings
            }
            Err(err) => {
                log::warn!("{SETTINGS_PATH} rejected, using defaults: {err}");
                Settings::default()
            }
        },
        Err(err) => {
            log::warn!("{SETTINGS_PATH} not loaded, using defaults: {err}");
            Settings::default()
        }
    }
}

pub async fn run() {
    install_panic_hook();
    let settings = load_settings().await;
    let mut rider = StreetRider::new(settings);

    loop {
        rider.update();
        rider.render();

        next_frame().await;
    }
}

#[cfg(target_arch = "wasm32")]
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let msg = info.to_string();
        if let Some(location) = info.location() {
            miniquad::error!("panic at {}:{}: {}", location.file(), location.line(), msg);
        } else {
            miniquad::error!("panic: {}", msg);
        }
    }));
}

#[cfg(not(target_arch = "wasm32"))]
fn install_panic_hook() {}
