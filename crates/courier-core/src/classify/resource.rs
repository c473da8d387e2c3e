//! Resource context for not-found messages.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Lesson,
    PracticeFarm,
    Course,
    Profile,
    Comment,
}

impl ResourceKind {
    pub fn not_found_message(self) -> &'static str {
        match self {
            ResourceKind::Lesson => "This lesson no longer exists or was moved.",
            ResourceKind::PracticeFarm => {
                "This practice farm was deleted or you no longer have access to it."
            }
            ResourceKind::Course => "This course is no longer available.",
            ResourceKind::Profile => "This profile could not be found.",
            ResourceKind::Comment => "This comment was removed.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Lesson => "lesson",
            ResourceKind::PracticeFarm => "practice-farm",
            ResourceKind::Course => "course",
            ResourceKind::Profile => "profile",
            ResourceKind::Comment => "comment",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(ResourceKind::Lesson),
            "practice-farm" => Ok(ResourceKind::PracticeFarm),
            "course" => Ok(ResourceKind::Course),
            "profile" => Ok(ResourceKind::Profile),
            "comment" => Ok(ResourceKind::Comment),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}
