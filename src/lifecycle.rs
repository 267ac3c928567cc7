use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::policy::Role;

/// PostStatus
///
/// Lifecycle tag on a rental listing. Only `Approved` posts are visible to the
/// public; `Pending` posts wait for exactly one moderation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Post already reviewed by an admin (status: {0})")]
    AlreadyReviewed(PostStatus),

    #[error("Status must be 'approved' or 'rejected', got '{0}'")]
    InvalidTarget(PostStatus),
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
        }
    }

    /// Posts by moderators skip the queue.
    pub fn initial_for(role: Role) -> Self {
        if role.is_moderator() {
            PostStatus::Approved
        } else {
            PostStatus::Pending
        }
    }

    pub fn is_public(&self) -> bool {
        *self == PostStatus::Approved
    }

    /// review
    ///
    /// Applies a moderation decision. The only legal moves are
    /// `Pending -> Approved` and `Pending -> Rejected`; a post that has already
    /// been decided rejects every further attempt, including a repeat of the
    /// same decision.
    pub fn review(self, target: PostStatus) -> Result<PostStatus, LifecycleError> {
        if target == PostStatus::Pending {
            return Err(LifecycleError::InvalidTarget(target));
        }
        match self {
            PostStatus::Pending => Ok(target),
            decided => Err(LifecycleError::AlreadyReviewed(decided)),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown post status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for PostStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "approved" => Ok(PostStatus::Approved),
            "rejected" => Ok(PostStatus::Rejected),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for PostStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
