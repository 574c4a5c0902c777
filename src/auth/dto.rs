use serde::{Deserialize, Serialize};

use super::tokens::TokenPair;
use crate::users::repo::User;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal_type: Option<String>,
    pub calorie_goal: Option<f64>,
    pub protein_goal: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `User` serializes without its password hash.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: User,
}
