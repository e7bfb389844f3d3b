//! VAST tracking injection.
//!
//! [`scan`] records where beacons can go, and [`TrackerInjector`] splices the
//! configured [`VastEvents`] in at those offsets.

pub mod events;
pub mod injector;
pub mod scanner;

pub use events::{TrackingEvent, VastEvents};
pub use injector::{BufferPool, EventKind, Injector, InsertionJob, TrackerInjector};
pub use scanner::{scan, AdRecord, CreativeKind, CreativeRecord};
