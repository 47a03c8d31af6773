//! Customer profile route handlers. A customer only ever sees themselves.

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::error::{ApiJson, Result};
use crate::middleware::RequireCustomer;
use crate::models::Customer;
use crate::routes::Message;
use crate::services::customers::{CustomerService, ProfileUpdate};
use crate::state::AppState;

/// Editable profile fields; anything else in the body is ignored.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub address: Option<String>,
    pub area_code: Option<i32>,
}

/// GET /api/v1/customers
pub async fn show(RequireCustomer(customer): RequireCustomer) -> Json<Customer> {
    Json(customer)
}

/// PATCH /api/v1/customers
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> Result<Json<Customer>> {
    let updated = CustomerService::new(state.repo())
        .update(
            &customer,
            ProfileUpdate {
                password: req.password,
                user_name: req.user_name,
                first_name: req.first_name,
                last_name: req.last_name,
                phone_number: req.phone_number,
                organization: req.organization,
                address: req.address,
                area_code: req.area_code,
            },
        )
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/customers
pub async fn delete(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Message>> {
    CustomerService::new(state.repo()).delete(&customer).await?;
    Ok(Message::new("Customer deleted"))
}
