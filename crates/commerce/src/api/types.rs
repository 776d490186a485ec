//! Wire request/response shapes for the shop service.
//!
//! These mirror the service's JSON exactly (including its camelCase field
//! names and decimal-string prices) and are converted to domain types at the
//! module boundary. Unknown response fields are ignored so catalog entries
//! can grow server-side without breaking old clients.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use blossom_core::{CategoryId, ClientId, FlowerId, OrderId, Price};

use crate::catalog::{CatalogItem, CatalogSnapshot, Category};
use crate::checkout::Order;
use crate::session::{Profile, Registration};

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub client: ClientDto,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(rename = "firstName")]
    pub first_name: &'a str,
    #[serde(rename = "lastName")]
    pub last_name: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
}

impl<'a> From<&'a Registration> for RegisterRequest<'a> {
    fn from(registration: &'a Registration) -> Self {
        Self {
            email: registration.email.as_str(),
            password: registration.password.expose_secret(),
            first_name: &registration.first_name,
            last_name: &registration.last_name,
            phone: &registration.phone,
            address: &registration.address,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateProfileRequest<'a> {
    pub email: &'a str,
    #[serde(rename = "firstName")]
    pub first_name: Option<&'a str>,
    #[serde(rename = "lastName")]
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
}

impl<'a> From<&'a Profile> for UpdateProfileRequest<'a> {
    fn from(profile: &'a Profile) -> Self {
        Self {
            email: &profile.email,
            first_name: profile.first_name.as_deref(),
            last_name: profile.last_name.as_deref(),
            phone: profile.phone.as_deref(),
            address: profile.address.as_deref(),
        }
    }
}

/// The `client` object the auth endpoints return. Every field except `email`
/// may be null for a sparsely filled account.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientDto {
    #[serde(default)]
    pub id: Option<ClientId>,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ClientDto {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            address: self.address,
            image: self.image,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogResponse {
    pub flowers: Vec<FlowerDto>,
    #[serde(default)]
    pub categories: Vec<CategoryDto>,
}

impl CatalogResponse {
    pub fn into_snapshot(self) -> CatalogSnapshot {
        CatalogSnapshot {
            items: self.flowers.into_iter().map(FlowerDto::into_item).collect(),
            categories: self
                .categories
                .into_iter()
                .map(|c| Category {
                    id: c.id,
                    name: c.name.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// A catalog flower. The service sends more botanical detail than the
/// commerce core needs; only the commerce-relevant fields are kept.
#[derive(Debug, Deserialize)]
pub(crate) struct FlowerDto {
    pub id: FlowerId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "categoryId")]
    pub category_id: Option<CategoryId>,
}

impl FlowerDto {
    pub fn into_item(self) -> CatalogItem {
        CatalogItem {
            id: self.id,
            name: self.name,
            price: self.price,
            image: self.image.unwrap_or_default(),
            category: self.category_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryDto {
    pub id: CategoryId,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct OrderRequest<'a> {
    pub customer_name: &'a str,
    pub address: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub total: Price,
    pub order_items: Vec<OrderItemRequest<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderItemRequest<'a> {
    pub flower_id: FlowerId,
    pub name: &'a str,
    pub image: &'a str,
    pub quantity: u32,
    pub price: Price,
}

pub(crate) fn order_request(order: &Order) -> OrderRequest<'_> {
    OrderRequest {
        customer_name: &order.customer_name,
        address: &order.address,
        phone: &order.phone,
        email: order.email.as_str(),
        total: order.total,
        order_items: order
            .lines
            .iter()
            .map(|line| OrderItemRequest {
                flower_id: line.item_id,
                name: &line.name,
                image: &line.image,
                quantity: line.quantity,
                price: line.unit_price,
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderCreatedResponse {
    pub order_id: OrderId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_response_tolerates_extra_fields() {
        let json = r#"{
            "flowers": [
                {"id": 1, "name": "Rose", "scientific_name": "Rosa", "color": "red",
                 "blooming_season": "spring", "petal_count": 30, "height": "40.00",
                 "image": "/media/flower_images/rose.jpg", "care_instructions": "water",
                 "price": "5.00", "availability": true, "categoryId": 2}
            ],
            "categories": [{"id": 2, "name": "Bouquets"}]
        }"#;

        let response: CatalogResponse = serde_json::from_str(json).unwrap();
        let snapshot = response.into_snapshot();

        assert_eq!(snapshot.items.len(), 1);
        let item = &snapshot.items[0];
        assert_eq!(item.id, FlowerId::new(1));
        assert_eq!(item.name, "Rose");
        assert_eq!(item.price, Price::from_cents(500));
        assert_eq!(item.category, Some(CategoryId::new(2)));
        assert_eq!(snapshot.categories[0].name, "Bouquets");
    }

    #[test]
    fn test_client_dto_nullable_fields() {
        let json = r#"{"email": "a@a.com", "first_name": null, "last_name": null,
                       "phone": null, "address": null, "image": null}"#;
        let dto: ClientDto = serde_json::from_str(json).unwrap();
        let profile = dto.into_profile();
        assert_eq!(profile.email, "a@a.com");
        assert!(profile.first_name.is_none());
        assert!(profile.id.is_none());
    }

    #[test]
    fn test_order_request_shape() {
        use blossom_core::Email;
        use crate::checkout::OrderLine;

        let order = Order {
            customer_name: "Ada Lovelace".to_string(),
            address: "1 Garden Way".to_string(),
            phone: "123".to_string(),
            email: Email::parse("a@a.com").unwrap(),
            lines: vec![OrderLine {
                item_id: FlowerId::new(5),
                name: "Tulip".to_string(),
                image: "/media/tulip.jpg".to_string(),
                quantity: 2,
                unit_price: Price::from_cents(1250),
            }],
            total: Price::from_cents(2500),
        };

        let value = serde_json::to_value(order_request(&order)).unwrap();
        assert_eq!(value["customer_name"], "Ada Lovelace");
        assert_eq!(value["total"], "25.00");
        assert_eq!(value["order_items"][0]["flower_id"], 5);
        assert_eq!(value["order_items"][0]["price"], "12.50");
    }
}
