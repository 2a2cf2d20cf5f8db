use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Waste material predicted by the classifier.
///
/// Variants are declared in the order of the network's output logits, so
/// `ClassLabel::ALL[i]` is the label for logit `i`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum ClassLabel {
    #[serde(rename = "vidro")]
    #[strum(serialize = "vidro")]
    Glass,
    #[serde(rename = "metal")]
    #[strum(serialize = "metal")]
    Metal,
    #[serde(rename = "papel")]
    #[strum(serialize = "papel")]
    Paper,
    #[serde(rename = "plastico")]
    #[strum(serialize = "plastico")]
    Plastic,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 4] = [
        ClassLabel::Glass,
        ClassLabel::Metal,
        ClassLabel::Paper,
        ClassLabel::Plastic,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassifyResponse {
    pub class: ClassLabel,
}

/// Body of `POST /feedbacks/`. Every field is required; `rating` is not range checked.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeedbackCreate {
    pub user_name: String,
    pub rating: i32,
    pub comment: String,
    pub class_predicted: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}
