use amulet_core::{Msg, Outcome};
use chrono::{DateTime, Utc};

/// One post after classification, sent from a worker to the state owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPost {
    pub text: String,
    pub outcome: Outcome,
    pub observed_at: DateTime<Utc>,
}

impl From<ClassifiedPost> for Msg {
    fn from(post: ClassifiedPost) -> Self {
        Msg::PostClassified {
            text: post.text,
            outcome: post.outcome,
            observed_at: post.observed_at,
        }
    }
}
