use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Returns `(page, per_page, offset)` with defaults and bounds applied.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

// Query structs repeat `page`/`per_page` instead of flattening `Pagination`:
// serde_urlencoded hands flattened fields over as strings, which breaks integers.

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CustomerQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Case-insensitive partial match on the name.
    pub name: Option<String>,
    /// Case-insensitive partial match on the email.
    pub email: Option<String>,
}

impl CustomerQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub section: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// `true` keeps products in stock, `false` keeps the sold-out ones.
    pub available: Option<bool>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub section: Option<String>,
    pub order_id: Option<Uuid>,
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_applies_defaults() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        assert_eq!(Pagination::new(0, 0).normalize(), (1, 1, 0));
        assert_eq!(Pagination::new(3, 500).normalize(), (3, 100, 200));
    }

    #[test]
    fn normalize_saturates_huge_pages() {
        assert_eq!(
            Pagination::new(i64::MAX, 100).normalize(),
            (i64::MAX, 100, i64::MAX)
        );
        assert_eq!(Pagination::new(i64::MIN, 10).normalize(), (1, 10, 0));
    }

    #[test]
    fn huge_page_in_query_string_is_accepted() {
        let query: CustomerQuery = parse_query("page=9223372036854775807&per_page=100");
        let (_, _, offset) = query.pagination().normalize();
        assert_eq!(offset, i64::MAX);
    }

    #[test]
    fn query_strings_parse_numbers_and_dates() {
        let query: OrderListQuery = parse_query(
            "page=2&per_page=5&start_date=2025-05-01&status=pending",
        );
        assert_eq!(query.pagination().normalize(), (2, 5, 5));
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2025, 5, 1));

        let products: ProductQuery = parse_query("available=false&min_price=100");
        assert_eq!(products.available, Some(false));
        assert_eq!(products.min_price, Some(100));
    }

    fn parse_query<T: serde::de::DeserializeOwned>(raw: &str) -> T {
        let uri: axum::http::Uri = format!("/x?{raw}").parse().unwrap();
        axum::extract::Query::<T>::try_from_uri(&uri).unwrap().0
    }
}
