//! Lesson metadata and the endpoint that lists a course's lessons.

use crate::error::ClientError;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};

/// One lesson of a course, as listed by the lesson endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub title: String,
    #[serde(deserialize_with = "number_or_string")]
    pub number: u32,
    #[serde(default)]
    pub description: String,
    /// Display length, e.g. `"12:40"`.
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub feedback: String,
    pub video_id: String,
    #[serde(default)]
    pub is_private: bool,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Fetches the ordered lesson list for a course.
#[derive(Debug, Clone)]
pub struct LessonFetcher {
    client: Client,
    url: String,
}

impl LessonFetcher {
    /// Create a new fetcher for the lessons endpoint at `url`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// One GET, no retry. Order of the returned array is kept.
    pub async fn fetch(&self, course_id: &str) -> Result<Vec<Lesson>, ClientError> {
        tracing::debug!("Fetching lessons for course {}", course_id);

        let res = self
            .client
            .get(&self.url)
            .query(&[("courseId", course_id)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::Status {
                status: res.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let lessons: Vec<Lesson> = res.json().await?;
        tracing::info!("Fetched {} lessons for {}", lessons.len(), course_id);
        Ok(lessons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lesson_with_defaults() {
        let json = r#"{"title":"Wiring the PIR sensor","number":"2","videoId":"abc123"}"#;
        let lesson: Lesson = serde_json::from_str(json).unwrap();
        assert_eq!(lesson.number, 2);
        assert!(!lesson.is_private);
        assert!(lesson.feedback.is_empty());
    }

    #[test]
    fn parses_private_lesson() {
        let json = r#"{
            "title": "Camera setup",
            "number": 3,
            "description": "Mount the camera",
            "length": "08:12",
            "feedback": "https://forms.example/3",
            "videoId": "vid-3",
            "isPrivate": true
        }"#;
        let lesson: Lesson = serde_json::from_str(json).unwrap();
        assert!(lesson.is_private);
        assert_eq!(lesson.video_id, "vid-3");
        assert_eq!(lesson.length, "08:12");
    }

    #[test]
    fn rejects_non_numeric_number() {
        let json = r#"{"title":"x","number":"two","videoId":"v"}"#;
        assert!(serde_json::from_str::<Lesson>(json).is_err());
    }
}
