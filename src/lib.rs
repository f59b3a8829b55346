// Wire framing and the simulator listener
pub mod framing;
pub mod ingest;

// Producer -> consumer hand-off
pub mod dispatch;

// Timestep model and parsing
pub mod geometry;
pub mod timestep;

// Playback state machine and vehicle smoothing
pub mod interpolation;
pub mod playback;

// Renderer seam and the consumer loop
pub mod render;
pub mod visualizer;

// HTTP control surface and event stream
pub mod api;

pub mod config;
