//! Connected account endpoints (/social/accounts)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AuthUser};
use crate::AppState;
use crate::domain::accounts;
use crate::models::SocialAccount;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/social/accounts",
        get(list_accounts).delete(disconnect_account),
    )
}

/// Connected account DTO
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub platform: String,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub page_id: Option<String>,
    pub token_expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // access/refresh tokens intentionally omitted - they never leave the server
}

impl AccountResponse {
    fn from_account(account: SocialAccount, now: DateTime<Utc>) -> Self {
        let token_expired = account
            .token_expires_at
            .map(|t| t < now)
            .unwrap_or(false);
        Self {
            id: account.id,
            platform: account.platform,
            platform_user_id: account.platform_user_id,
            platform_username: account.platform_username,
            page_id: account.page_id,
            token_expired,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ListAccountsResponse {
    accounts: Vec<AccountResponse>,
}

/// GET /social/accounts - list the caller's connected accounts
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ListAccountsResponse>, StatusCode> {
    let now = Utc::now();
    let accounts = accounts::list_accounts(&state.db, user_id)
        .await
        .log_500("List accounts error")?
        .into_iter()
        .map(|a| AccountResponse::from_account(a, now))
        .collect();

    Ok(Json(ListAccountsResponse { accounts }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectQuery {
    account_id: Option<i64>,
}

#[derive(Serialize)]
struct DisconnectResponse {
    success: bool,
    deleted_id: i64,
}

/// DELETE /social/accounts?accountId= - disconnect one account.
/// Posts that referenced it keep their content; only the account link drops.
async fn disconnect_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<DisconnectQuery>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let account_id = query
        .account_id
        .ok_or_else(|| ApiError::bad_request("Missing accountId"))?;

    let deleted = accounts::delete_account(&state.db, account_id, user_id)
        .await
        .log_500("Disconnect account error")?;

    if !deleted {
        return Err(ApiError::not_found("Account not found"));
    }

    println!("[accounts] User {} disconnected account {}", user_id, account_id);

    Ok(Json(DisconnectResponse {
        success: true,
        deleted_id: account_id,
    }))
}
