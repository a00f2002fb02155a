mod booking;
mod chat;
mod slot;
mod teacher;
mod user;

pub use booking::{
    Booking, BookingStatus, TeacherJoin, DEFAULT_STATUS_LABEL, FALLBACK_TEACHER_NAME,
};
pub use chat::{Chat, Message};
pub use slot::{Slot, SlotStatus};
pub use teacher::{Course, Teacher};
pub use user::{AuthUser, CurrentUser, Session, UserRole};
