//! Treasure-hunt gameplay engine.
//!
//! Geodesy, proximity banding, discovery and scoring, session state, and an
//! error resilience manager, composed by [`GameOrchestrator`] into a single
//! per-location-update loop.
//!
//! No I/O: location, persistence, map loading and device output are traits
//! in [`services`], implemented by the host.

pub mod config;
pub mod constants;
pub mod coordinate;
pub mod discovery;
pub mod error;
pub mod feedback;
pub mod geo;
pub mod orchestrator;
pub mod resilience;
pub mod services;
pub mod session;
pub mod time;
pub mod treasure;

pub use config::{GameConfig, LocationConfig, RecoveryTimeouts, ResiliencePolicy};
pub use constants::{
    EARTH_RADIUS_M, MAX_DISCOVERY_RADIUS_M, MAX_RECOVERY_ATTEMPTS, WEAK_SIGNAL_ACCURACY_M,
};
pub use coordinate::{Coordinate, LocationFix, ModelError};
pub use discovery::{
    RankedTreasure, check_discovery, find_nearest_undiscovered, nearest_undiscovered,
};
pub use error::{
    DegradationOption, ErrorCode, FallbackMechanism, GameError, PersistenceError, RecoveryAction,
    RecoveryError, Severity,
};
pub use feedback::{
    FeedbackIntensity, FeedbackOutput, GameSettings, PulseAnimation, PulseColor, SonarFeedback,
    provide_sonar_feedback,
};
pub use geo::{CompassPoint, bearing, distance, format_distance, relative_bearing};
pub use orchestrator::{
    DiscoveryEvent, GameOrchestrator, Guidance, Progress, SharedGame, TickOutcome, TickReport,
};
pub use resilience::{
    ErrorContext, ErrorHistory, ErrorRecord, ErrorResilienceManager, ErrorStatistics,
    HandleOutcome, NoopRecovery, RecoveryHandler, RecoveryReport,
};
pub use services::{
    InMemoryProgressStore, LocationSource, MapSource, ProgressStore, RecordingOutput,
    ScriptedLocationSource, StaticMapSource, load_validated_maps,
};
pub use session::GameSession;
pub use treasure::{Difficulty, MapId, Region, Treasure, TreasureId, TreasureMap, ValidationError};
