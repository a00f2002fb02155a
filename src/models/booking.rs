use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder teacher name when neither the join nor the booking row has one.
pub const FALLBACK_TEACHER_NAME: &str = "Professeur";

/// Label shown on a freshly paid booking.
pub const DEFAULT_STATUS_LABEL: &str = "Payé";

/// A confirmed lesson booking.
///
/// Bookings denormalize a display snapshot of the teacher (name, style,
/// location, price, image) so the list screen renders without extra lookups.
/// Bulk reads embed the current teacher row via a relational projection;
/// [`Booking::hydrate`] folds that into the snapshot fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub student_id: String,
    pub teacher_id: i64,
    /// Set when the booking was created through the live slot flow.
    #[serde(default)]
    pub slot_id: Option<i64>,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: BookingStatus,
    #[serde(default = "default_status_label")]
    pub status_label: String,
    /// Teacher row embedded by the joined read. Never sent back.
    #[serde(default, rename = "teachers", skip_serializing)]
    pub joined_teacher: Option<TeacherJoin>,
}

fn default_status_label() -> String {
    DEFAULT_STATUS_LABEL.to_string()
}

/// The subset of teacher columns pulled in by the booking projection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TeacherJoin {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Booking {
    /// Fills the display snapshot from the embedded teacher row.
    ///
    /// Per-field precedence: joined teacher value, then the value already on
    /// the booking row, then a placeholder. The join itself is dropped.
    pub fn hydrate(mut self) -> Self {
        if let Some(join) = self.joined_teacher.take() {
            if let Some(name) = join.name {
                self.teacher_name = name;
            }
            if let Some(style) = join.style {
                self.style = style;
            }
            if let Some(location) = join.location {
                self.location = location;
            }
            if let Some(price) = join.price {
                self.price = price;
            }
            if join.image.is_some() {
                self.image = join.image;
            }
        }
        if self.teacher_name.is_empty() {
            self.teacher_name = FALLBACK_TEACHER_NAME.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Upcoming,
    Past,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Upcoming => write!(f, "upcoming"),
            BookingStatus::Past => write!(f, "past"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(BookingStatus::Upcoming),
            "past" => Ok(BookingStatus::Past),
            _ => Err(format!(
                "Invalid booking status '{}'. Valid options: upcoming, past",
                s
            )),
        }
    }
}
