pub mod clock;
pub mod image;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use self::image::{CacheEntry, CacheStats, ImageCache};
pub use sweeper::{SweepFairing, SweepHandle, SweepScheduler};
