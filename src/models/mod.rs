pub mod prayer;
pub mod task;

pub use prayer::{PrayerKind, PrayerTime};
pub use task::{Frequency, RecurrenceEnd, RecurrenceRule, Task, TaskCategory};
