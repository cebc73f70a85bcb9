use stripe::{Client, CreateCustomer, Customer};
use uuid::Uuid;

use crate::error::{AppError, Res};

/// Metadata key carrying the internal user id on Stripe objects.
/// Webhook events are correlated back to users through this entry.
pub const USER_ID_METADATA_KEY: &str = "prepdeck_user_id";

pub fn create_client(secret_key: &str) -> Client {
    Client::new(secret_key)
}

pub async fn create_customer(
    client: &Client,
    email: &str,
    name: &str,
    user_id: Uuid,
) -> Res<Customer> {
    let params = CreateCustomer {
        email: Some(email),
        name: Some(name),
        metadata: Some(
            [(USER_ID_METADATA_KEY.to_string(), user_id.to_string())]
                .into_iter()
                .collect(),
        ),
        ..Default::default()
    };

    Customer::create(client, params)
        .await
        .map_err(AppError::from)
}
