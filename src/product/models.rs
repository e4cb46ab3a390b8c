use axum_store::schema::products;
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Identifiable, Serialize)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub price: BigDecimal,
    pub photo: Option<String>,
    pub in_order: bool,
}

#[derive(Insertable, Deserialize, Validate, Debug)]
#[diesel(table_name = products)]
pub struct NewProduct {
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Ensure this value has at most 100 characters.")
    )]
    pub name: String,
    #[validate(
        custom(function = "not_blank"),
        length(max = 50, message = "Ensure this value has at most 50 characters.")
    )]
    pub category: String,
    #[validate(custom(function = "valid_price"))]
    pub price: BigDecimal,
    pub photo: Option<String>,
    #[serde(default = "default_in_order")]
    pub in_order: bool,
}

fn default_in_order() -> bool {
    true
}

#[derive(Deserialize, AsChangeset, Validate, Debug, Default)]
#[diesel(table_name = products)]
pub struct UpdateProduct {
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Ensure this value has at most 100 characters.")
    )]
    pub name: Option<String>,
    #[validate(
        custom(function = "not_blank"),
        length(max = 50, message = "Ensure this value has at most 50 characters.")
    )]
    pub category: Option<String>,
    #[validate(custom(function = "valid_price"))]
    pub price: Option<BigDecimal>,
    pub photo: Option<String>,
    pub in_order: Option<bool>,
}

impl UpdateProduct {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.photo.is_none()
            && self.in_order.is_none()
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

// price is NUMERIC(10,2)
const PRICE_MAX_INTEGER_DIGITS: u32 = 8;
const PRICE_MAX_DECIMAL_PLACES: i64 = 2;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message("This field is required.".into()));
    }
    Ok(())
}

fn valid_price(price: &BigDecimal) -> Result<(), ValidationError> {
    if *price < BigDecimal::from(0) {
        return Err(ValidationError::new("min_value").with_message("Price cannot be negative.".into()));
    }

    if *price >= BigDecimal::from(10u64.pow(PRICE_MAX_INTEGER_DIGITS)) {
        return Err(ValidationError::new("max_whole_digits").with_message(
            format!(
                "Ensure that there are no more than {PRICE_MAX_INTEGER_DIGITS} digits before the decimal point."
            )
            .into(),
        ));
    }

    let (_, scale) = price.normalized().as_bigint_and_exponent();
    if scale > PRICE_MAX_DECIMAL_PLACES {
        return Err(ValidationError::new("max_decimal_places").with_message(
            format!("Ensure that there are no more than {PRICE_MAX_DECIMAL_PLACES} decimal places.").into(),
        ));
    }

    Ok(())
}
