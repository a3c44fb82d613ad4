use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self, Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForumCategory {
    Chinese,
    Mathematics,
    General,
    Help,
}

impl ForumCategory {
    pub const ALL: [ForumCategory; 4] = [
        ForumCategory::Chinese,
        ForumCategory::Mathematics,
        ForumCategory::General,
        ForumCategory::Help,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForumCategory::Chinese => "Chinese",
            ForumCategory::Mathematics => "Mathematics",
            ForumCategory::General => "General",
            ForumCategory::Help => "Help",
        }
    }
}

impl fmt::Display for ForumCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForumCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        ForumCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!(
                    "invalid category '{trimmed}'. Allowed categories: Chinese, Mathematics, General, Help"
                )
            })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub url: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub uploaded_by_teacher: bool,
    pub teacher_email: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub url: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub uploaded_by_teacher: bool,
    pub teacher_email: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = user_roles)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_roles)]
pub struct NewUserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = forum_topics)]
pub struct ForumTopic {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub user_id: Uuid,
    pub reply_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = forum_topics)]
pub struct NewForumTopic {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub user_id: Uuid,
    pub reply_count: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = forum_replies)]
#[diesel(belongs_to(ForumTopic, foreign_key = topic_id))]
pub struct ForumReply {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = forum_replies)]
pub struct NewForumReply {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}
