pub mod audio;
pub mod controller;
pub mod dynamics;
pub mod error;
pub mod geo;
pub mod input;
pub mod pose;
pub mod projection;
pub mod settings;
pub mod store;
pub mod vehicle;

pub use audio::{AudioMix, EngineCue};
pub use controller::{
    AttachPoll, AttachPolicy, DriveLoop, DriveState, FrameClock, FrameReport, FrameSignal,
    HostCamera, PendingAttach, RenderSurface, Session, SuspendReason,
};
pub use dynamics::{DynamicsParameters, MotionState, step, turn_factor};
pub use error::{DriveError, HostError, SettingsError};
pub use geo::{EARTH_RADIUS_METERS, LatLng, normalize_heading};
pub use input::{Action, ControlInput, InputLatch, InputSource, KeyBindings};
pub use pose::Pose;
pub use projection::Projection;
pub use settings::{Settings, SettingsPatch};
pub use store::{ConfigStore, MemoryConfigStore, SettingsInbox, SubscriptionId};
pub use vehicle::VehicleId;
