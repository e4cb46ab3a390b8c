use std::str::FromStr;

use axum_store::schema::{order_products, orders};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::basket::models::line_total;
use crate::product::models::Product;
use crate::utils::FormErrors;
use crate::utils::sql::text_enum_sql;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    InProgress,
    InDelivery,
    Delivered,
    Canceled,
}

#[derive(Error, Debug)]
#[error("unknown order status {0:?}")]
pub struct UnknownStatus(String);

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "in_progress" => Ok(OrderStatus::InProgress),
            "in_delivery" => Ok(OrderStatus::InDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

text_enum_sql!(OrderStatus);

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Order {
    pub id: i32,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub status: OrderStatus,
}

/// Replaces every editable column of an order, `user_id` included.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = orders)]
#[diesel(treat_none_as_null = true)]
pub struct OrderChanges {
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize)]
#[diesel(table_name = order_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderProduct {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub amount: i32,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = order_products)]
pub struct NewOrderProduct {
    pub order_id: i32,
    pub product_id: i32,
    pub amount: i32,
}

#[derive(Deserialize, Validate, Debug)]
pub struct OrderProductForm {
    pub product_id: i32,
    #[validate(range(min = 1, message = "Amount must be at least 1."))]
    pub amount: i32,
}

/// Where a contact form was submitted from; only the wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSource {
    Basket,
    Manual,
}

impl ContactSource {
    fn required(&self, what: &str) -> String {
        match self {
            ContactSource::Basket => format!("You must log in or provide your {what}."),
            ContactSource::Manual => format!("You must select a user or provide their {what}."),
        }
    }
}

pub const EMPTY_BASKET: &str = "The basket is empty.";

/// Contact fields of an order. Blank fields are allowed only when the order
/// is tied to a user.
#[derive(Deserialize, Validate, Debug, Default, Clone)]
pub struct ContactForm {
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(
        custom(function = "email_if_given"),
        length(max = 254, message = "Ensure this value has at most 254 characters.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Ensure this value has at most 20 characters."))]
    pub phone: String,
}

fn email_if_given(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if !email.is_empty() && !email.validate_email() {
        return Err(ValidationError::new("email").with_message("Enter a valid email address.".into()));
    }
    Ok(())
}

impl ContactForm {
    /// Field rules plus the ones that depend on whether a user is attached.
    pub fn check(&self, has_user: bool, source: ContactSource) -> FormErrors {
        let mut errors = FormErrors::default();

        if !has_user {
            for (field, value, what) in [
                ("first_name", &self.first_name, "first name"),
                ("email", &self.email, "email"),
                ("phone", &self.phone, "phone"),
            ] {
                if value.trim().is_empty() {
                    errors.add(field, source.required(what));
                }
            }
        }

        if let Err(invalid) = self.validate() {
            let invalid = FormErrors::from(invalid);
            for (field, messages) in invalid.fields {
                for message in messages {
                    errors.add(&field, message);
                }
            }
        }

        errors
    }

    pub fn into_new_order(self, user_id: Option<Uuid>) -> NewOrder {
        NewOrder {
            user_id,
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            email: self.email.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            status: OrderStatus::New,
        }
    }

    pub fn into_changes(self, user_id: Option<Uuid>) -> OrderChanges {
        OrderChanges {
            user_id,
            first_name: self.first_name.trim().to_owned(),
            last_name: self.last_name.trim().to_owned(),
            email: self.email.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
        }
    }
}

/// Order form used by staff: an optional user plus contact fields.
#[derive(Deserialize, Debug, Default)]
pub struct ManualOrderForm {
    pub user_id: Option<Uuid>,
    #[serde(flatten)]
    pub contact: ContactForm,
}

#[derive(Debug, Serialize)]
pub struct OrderLine {
    pub id: i32,
    pub product: Product,
    pub amount: i32,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<OrderLine>,
    pub total: BigDecimal,
}

impl OrderDetail {
    pub fn new(order: Order, rows: Vec<(OrderProduct, Product)>) -> Self {
        let mut total = BigDecimal::from(0);

        let products = rows
            .into_iter()
            .map(|(line, product)| {
                let line_sum = line_total(&product.price, line.amount);
                total += &line_sum;
                OrderLine {
                    id: line.id,
                    product,
                    amount: line.amount,
                    total: line_sum,
                }
            })
            .collect();

        Self {
            order,
            products,
            total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub message: &'static str,
    pub order: Order,
    pub lines: Vec<OrderProduct>,
}
