use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A bookable lesson slot published by a teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: i64,
    // Older rows carry the camelCase key, current rows the snake_case one.
    // Both land in this field.
    #[serde(alias = "teacherId")]
    pub teacher_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: SlotStatus,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
        }
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            _ => Err(format!(
                "Invalid slot status '{}'. Valid options: available, booked",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_status_display() {
        assert_eq!(format!("{}", SlotStatus::Available), "available");
        assert_eq!(format!("{}", SlotStatus::Booked), "booked");
    }

    #[test]
    fn test_slot_status_from_str() {
        assert_eq!(
            SlotStatus::from_str("available").unwrap(),
            SlotStatus::Available
        );
        assert_eq!(SlotStatus::from_str("BOOKED").unwrap(), SlotStatus::Booked);
        assert!(SlotStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_slot_deserialize_snake_case_teacher_key() {
        let json = r#"{
            "id": 5,
            "teacher_id": 1,
            "date": "2025-03-10",
            "time": "14:00:00",
            "status": "available"
        }"#;
        let slot: Slot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.teacher_id, 1);
        assert_eq!(slot.date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(slot.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert!(slot.is_available());
    }

    #[test]
    fn test_slot_deserialize_camel_case_teacher_key() {
        let json = r#"{
            "id": 6,
            "teacherId": 2,
            "date": "2025-03-11",
            "time": "18:00:00",
            "status": "booked"
        }"#;
        let slot: Slot = serde_json::from_str(json).unwrap();
        assert_eq!(slot.teacher_id, 2);
        assert!(!slot.is_available());
    }
}
