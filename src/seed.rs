//! Demo fixture data.
//!
//! The teacher roster and slot cadence used to seed a fresh backend (via
//! `dc-admin seed`) and to pre-load the in-process store. Profile data is
//! French because the marketplace is.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};

use crate::models::{Course, Slot, SlotStatus, Teacher, UserRole};
use crate::remote::MemoryUser;

/// Days of slots generated from the start date.
pub const SEED_DAYS: i64 = 7;

pub fn fixture_teachers() -> Vec<Teacher> {
    vec![
        Teacher {
            id: 1,
            name: "Sophie Martin".to_string(),
            style: "Ballet Classique".to_string(),
            styles: vec![
                "Ballet".to_string(),
                "Pointes".to_string(),
                "Barre au sol".to_string(),
            ],
            location: "Paris 11e".to_string(),
            price: "30".to_string(),
            rating: 4.9,
            reviews: 128,
            bio: Some(
                "Danseuse formée à l'Opéra de Paris, je propose des cours \
                 adaptés à tous les niveaux."
                    .to_string(),
            ),
            experience: Some("10 ans d'expérience".to_string()),
            image: Some("https://i.pravatar.cc/150?img=47".to_string()),
            video_thumb: Some(
                "https://images.unsplash.com/photo-1518611012118-696072aa579a?w=400".to_string(),
            ),
            lat: Some(48.8630),
            lng: Some(2.3708),
            courses: vec![
                Course {
                    id: 1,
                    title: "Initiation au Ballet".to_string(),
                    style: "Ballet".to_string(),
                    level: "Débutant".to_string(),
                    price: "25".to_string(),
                    duration: "1h".to_string(),
                    rating: 4.8,
                    reviews: 36,
                },
                Course {
                    id: 2,
                    title: "Pointes avancées".to_string(),
                    style: "Ballet".to_string(),
                    level: "Avancé".to_string(),
                    price: "35".to_string(),
                    duration: "1h30".to_string(),
                    rating: 4.9,
                    reviews: 22,
                },
            ],
        },
        Teacher {
            id: 2,
            name: "Lucas Dubois".to_string(),
            style: "Hip Hop".to_string(),
            styles: vec![
                "Hip Hop".to_string(),
                "Breakdance".to_string(),
                "Popping".to_string(),
            ],
            location: "Paris 13e".to_string(),
            price: "25".to_string(),
            rating: 4.8,
            reviews: 85,
            bio: Some(
                "Danseur et chorégraphe, battles et shows à mon actif. \
                 Viens apprendre les bases ou perfectionner ton style."
                    .to_string(),
            ),
            experience: Some("8 ans d'expérience".to_string()),
            image: Some("https://i.pravatar.cc/150?img=12".to_string()),
            video_thumb: Some(
                "https://images.unsplash.com/photo-1535525153412-5a42439a210d?w=400".to_string(),
            ),
            lat: Some(48.8322),
            lng: Some(2.3561),
            courses: vec![Course {
                id: 3,
                title: "Hip Hop Foundations".to_string(),
                style: "Hip Hop".to_string(),
                level: "Débutant".to_string(),
                price: "20".to_string(),
                duration: "1h".to_string(),
                rating: 4.7,
                reviews: 41,
            }],
        },
        Teacher {
            id: 3,
            name: "Elena Rodriguez".to_string(),
            style: "Salsa & Bachata".to_string(),
            styles: vec![
                "Salsa".to_string(),
                "Bachata".to_string(),
                "Kizomba".to_string(),
            ],
            location: "Paris 5e".to_string(),
            price: "40".to_string(),
            rating: 5.0,
            reviews: 210,
            bio: Some(
                "Passionnée de danses latines depuis l'enfance, j'enseigne \
                 la salsa cubaine et la bachata sensual."
                    .to_string(),
            ),
            experience: Some("15 ans d'expérience".to_string()),
            image: Some("https://i.pravatar.cc/150?img=32".to_string()),
            video_thumb: Some(
                "https://images.unsplash.com/photo-1504609813442-a8924e83f76e?w=400".to_string(),
            ),
            lat: Some(48.8462),
            lng: Some(2.3443),
            courses: vec![Course {
                id: 4,
                title: "Salsa cubaine".to_string(),
                style: "Salsa".to_string(),
                level: "Intermédiaire".to_string(),
                price: "35".to_string(),
                duration: "1h".to_string(),
                rating: 5.0,
                reviews: 89,
            }],
        },
        Teacher {
            id: 4,
            name: "Marc V.".to_string(),
            style: "Contemporain".to_string(),
            styles: vec!["Contemporain".to_string(), "Modern Jazz".to_string()],
            location: "Paris 10e".to_string(),
            price: "35".to_string(),
            rating: 4.7,
            reviews: 64,
            bio: Some(
                "Interprète pour plusieurs compagnies, j'accompagne les \
                 danseurs dans leur recherche de mouvement."
                    .to_string(),
            ),
            experience: Some("12 ans d'expérience".to_string()),
            image: Some("https://i.pravatar.cc/150?img=68".to_string()),
            video_thumb: None,
            lat: Some(48.8760),
            lng: Some(2.3580),
            courses: Vec::new(),
        },
    ]
}

/// Weekly slot cadence: teacher 1 at 14:00 and 16:00, teacher 2 at 18:00,
/// teacher 3 at 10:00 and 19:00, every day for [`SEED_DAYS`] days.
pub fn fixture_slots(start: NaiveDate) -> Vec<Slot> {
    let cadence: [(i64, NaiveTime); 5] = [
        (1, NaiveTime::from_hms_opt(14, 0, 0).expect("valid time")),
        (1, NaiveTime::from_hms_opt(16, 0, 0).expect("valid time")),
        (2, NaiveTime::from_hms_opt(18, 0, 0).expect("valid time")),
        (3, NaiveTime::from_hms_opt(10, 0, 0).expect("valid time")),
        (3, NaiveTime::from_hms_opt(19, 0, 0).expect("valid time")),
    ];

    let mut slots = Vec::new();
    let mut id = 1;
    for day in 0..SEED_DAYS {
        let date = start + Duration::days(day);
        for (teacher_id, time) in cadence {
            slots.push(Slot {
                id,
                teacher_id,
                date,
                time,
                status: SlotStatus::Available,
            });
            id += 1;
        }
    }
    slots
}

/// First seeded slot day: tomorrow.
pub fn fixture_start_date() -> NaiveDate {
    let today = Utc::now().date_naive();
    today.succ_opt().unwrap_or(today)
}

/// Demo accounts for the in-process backend.
pub fn fixture_users() -> Vec<MemoryUser> {
    vec![
        MemoryUser {
            id: "s1".to_string(),
            email: "sarah@example.com".to_string(),
            password: "danse123".to_string(),
            name: "Sarah".to_string(),
            role: UserRole::Student,
        },
        MemoryUser {
            id: "t1".to_string(),
            email: "sophie@example.com".to_string(),
            password: "danse123".to_string(),
            name: "Sophie Martin".to_string(),
            role: UserRole::Teacher,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_teachers_shape() {
        let teachers = fixture_teachers();
        assert_eq!(teachers.len(), 4);

        let ids: Vec<i64> = teachers.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let sophie = &teachers[0];
        assert_eq!(sophie.name, "Sophie Martin");
        assert_eq!(sophie.rating, 4.9);
        assert_eq!(sophie.courses.len(), 2);
    }

    #[test]
    fn test_fixture_slots_cadence() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let slots = fixture_slots(start);

        assert_eq!(slots.len(), 35); // 7 days x 5 slots
        assert!(slots.iter().all(|s| s.status == SlotStatus::Available));
        assert_eq!(slots.first().unwrap().date, start);
        assert_eq!(
            slots.last().unwrap().date,
            start + Duration::days(SEED_DAYS - 1)
        );

        // Ids are dense and unique.
        let ids: Vec<i64> = slots.iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=35).collect::<Vec<i64>>());

        // Every slot references a fixture teacher.
        let teachers = fixture_teachers();
        assert!(slots
            .iter()
            .all(|s| teachers.iter().any(|t| t.id == s.teacher_id)));
    }

    #[test]
    fn test_fixture_users() {
        let users = fixture_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "s1");
        assert_eq!(users[0].role, UserRole::Student);
        assert_eq!(users[1].role, UserRole::Teacher);
    }
}
