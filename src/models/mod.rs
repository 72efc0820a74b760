mod recurrence;
mod routine;
mod schedule;
mod schedule_log;

pub use recurrence::Recurrence;
pub use routine::{
    check_routine, Bedtime, NewRoutine, NewTag, RoutineEdit, RoutineSpec, Tag, TagEdit,
    MAX_ROUTINE_MINUTES,
};
pub use schedule::{
    Coordinates, ItemEdit, ItemRole, ItemTimeUpdate, LocationPair, Place, ScheduleItem, TravelMode,
};
pub use schedule_log::ScheduleLog;
