use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::FeedbackCreate;
use sqlx::FromRow;

/// A stored row of the `feedbacks` table.
///
/// `comment` is the only nullable column; rows written by other clients may
/// leave it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub user_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub class_predicted: String,
    pub created_at: NaiveDate,
}

impl Feedback {
    pub fn from_create(feedback: FeedbackCreate, created_at: NaiveDate) -> Self {
        Self {
            user_name: feedback.user_name,
            rating: feedback.rating,
            comment: Some(feedback.comment),
            class_predicted: feedback.class_predicted,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_serializes_date_as_iso_day() {
        let feedback = Feedback::from_create(
            FeedbackCreate {
                user_name: "Ana".into(),
                rating: 5,
                comment: "bom".into(),
                class_predicted: "plastico".into(),
            },
            NaiveDate::from_ymd_opt(2024, 11, 3).unwrap(),
        );

        let value = serde_json::to_value(&feedback).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "user_name": "Ana",
                "rating": 5,
                "comment": "bom",
                "class_predicted": "plastico",
                "created_at": "2024-11-03"
            })
        );
    }

    #[test]
    fn test_missing_comment_serializes_as_null() {
        let feedback = Feedback {
            user_name: "Caio".into(),
            rating: 3,
            comment: None,
            class_predicted: "vidro".into(),
            created_at: NaiveDate::from_ymd_opt(2024, 11, 4).unwrap(),
        };

        let value = serde_json::to_value(&feedback).unwrap();
        assert_eq!(value["comment"], serde_json::Value::Null);
        assert_eq!(value["user_name"], "Caio");
    }
}
