use serde::{Deserialize, Serialize};

/// A dance teacher's marketplace profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    /// Headline style shown in lists, e.g. "Ballet Classique".
    pub style: String,
    #[serde(default)]
    pub styles: Vec<String>,
    pub location: String,
    /// Display price per hour. Source data is a string ("30", "CHF 30").
    pub price: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews: i64,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub video_thumb: Option<String>,
    // Legacy seed rows used capitalized coordinate keys.
    #[serde(default, alias = "Lat")]
    pub lat: Option<f64>,
    #[serde(default, alias = "Lng")]
    pub lng: Option<f64>,
    #[serde(default)]
    pub courses: Vec<Course>,
}

impl Teacher {
    /// Case-insensitive match against name, styles, and location.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.style.to_lowercase().contains(&query)
            || self.location.to_lowercase().contains(&query)
            || self
                .styles
                .iter()
                .any(|s| s.to_lowercase().contains(&query))
    }

    pub fn course(&self, course_id: i64) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }
}

/// A course offered by a teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub style: String,
    pub level: String,
    pub price: String,
    pub duration: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_teacher() -> Teacher {
        Teacher {
            id: 1,
            name: "Sophie Martin".to_string(),
            style: "Ballet Classique".to_string(),
            styles: vec!["Ballet".to_string(), "Pointes".to_string()],
            location: "Paris 11e".to_string(),
            price: "30".to_string(),
            rating: 4.9,
            reviews: 128,
            bio: None,
            experience: None,
            image: None,
            video_thumb: None,
            lat: None,
            lng: None,
            courses: vec![Course {
                id: 101,
                title: "Débutant - Les bases".to_string(),
                style: "Ballet".to_string(),
                level: "Débutant".to_string(),
                price: "25".to_string(),
                duration: "1h".to_string(),
                rating: 4.8,
                reviews: 42,
            }],
        }
    }

    #[test]
    fn test_teacher_matches_name_case_insensitive() {
        let teacher = sample_teacher();
        assert!(teacher.matches("sophie"));
        assert!(teacher.matches("MARTIN"));
        assert!(!teacher.matches("lucas"));
    }

    #[test]
    fn test_teacher_matches_style_and_location() {
        let teacher = sample_teacher();
        assert!(teacher.matches("ballet"));
        assert!(teacher.matches("pointes"));
        assert!(teacher.matches("paris 11"));
    }

    #[test]
    fn test_teacher_course_lookup() {
        let teacher = sample_teacher();
        assert_eq!(teacher.course(101).unwrap().title, "Débutant - Les bases");
        assert!(teacher.course(999).is_none());
    }

    #[test]
    fn test_teacher_deserialize_legacy_coordinate_keys() {
        let json = r#"{
            "id": 3,
            "name": "Elena Rodriguez",
            "style": "Salsa & Bachata",
            "location": "Paris 5e",
            "price": "40",
            "rating": 5.0,
            "reviews": 210,
            "Lat": 48.8462,
            "Lng": 2.3372
        }"#;
        let teacher: Teacher = serde_json::from_str(json).unwrap();
        assert_eq!(teacher.lat, Some(48.8462));
        assert_eq!(teacher.lng, Some(2.3372));
        assert!(teacher.courses.is_empty());
        assert!(teacher.styles.is_empty());
    }
}
