//! Response envelopes returned by the gateway.
//!
//! Endpoints answer either `{ success, data, pagination? }` or a bare
//! payload, and fixture lists may nest under `data.fixtures`. Responses
//! are normalized once here so callers never unwrap by hand.

use common::{Error, Fixture};
use serde::{Deserialize, Serialize};

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub has_next_page: Option<bool>,
}

impl Pagination {
    pub fn has_more(&self) -> bool {
        match self.has_next_page {
            Some(next) => next,
            None => self.page > 0 && self.page < self.total_pages,
        }
    }
}

/// Either an envelope or the bare payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Envelope {
        success: bool,
        #[serde(default = "Option::default")]
        data: Option<T>,
        #[serde(default)]
        pagination: Option<Pagination>,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload, turning `success: false` into an API error.
    pub fn into_parts(self) -> Result<(T, Option<Pagination>), Error> {
        match self {
            ApiResponse::Bare(data) => Ok((data, None)),
            ApiResponse::Envelope {
                success: false,
                message,
                ..
            } => Err(Error::Api {
                status: 200,
                message: message.unwrap_or_else(|| "request was not successful".into()),
            }),
            ApiResponse::Envelope {
                data: None,
                message,
                ..
            } => Err(Error::Other(format!(
                "envelope without data{}",
                message.map(|m| format!(": {m}")).unwrap_or_default()
            ))),
            ApiResponse::Envelope {
                data: Some(data),
                pagination,
                ..
            } => Ok((data, pagination)),
        }
    }
}

/// Fixture lists arrive either wrapped in `{ fixtures }` or as an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixtureList {
    Wrapped { fixtures: Vec<Fixture> },
    List(Vec<Fixture>),
}

impl FixtureList {
    pub fn into_vec(self) -> Vec<Fixture> {
        match self {
            FixtureList::Wrapped { fixtures } => fixtures,
            FixtureList::List(fixtures) => fixtures,
        }
    }
}

/// One normalized page of a list endpoint.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.pagination.as_ref().is_some_and(Pagination::has_more)
    }
}

impl ApiResponse<Vec<common::League>> {
    pub fn into_page(self) -> Result<Page<common::League>, Error> {
        let (items, pagination) = self.into_parts()?;
        Ok(Page { items, pagination })
    }
}

impl ApiResponse<FixtureList> {
    pub fn into_page(self) -> Result<Page<Fixture>, Error> {
        let (list, pagination) = self.into_parts()?;
        Ok(Page {
            items: list.into_vec(),
            pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_fixture_array() {
        let raw = json!([{ "id": "F1", "date": "2025-06-14T19:00:00Z" }]);
        let resp: ApiResponse<FixtureList> = serde_json::from_value(raw).unwrap();
        let page = resp.into_page().unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more());
    }

    #[test]
    fn test_envelope_with_nested_fixtures() {
        let raw = json!({
            "success": true,
            "data": { "fixtures": [{ "_id": "F1" }, { "_id": "F2" }] },
            "pagination": { "page": 1, "limit": 2, "total": 3, "totalPages": 2 }
        });
        let resp: ApiResponse<FixtureList> = serde_json::from_value(raw).unwrap();
        let page = resp.into_page().unwrap();
        assert_eq!(page.items[1].id, "F2");
        assert!(page.has_more());
    }

    #[test]
    fn test_unsuccessful_envelope_is_error() {
        let raw = json!({ "success": false, "message": "league not found" });
        let resp: ApiResponse<FixtureList> = serde_json::from_value(raw).unwrap();
        match resp.into_page() {
            Err(Error::Api { message, .. }) => assert_eq!(message, "league not found"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_has_next_page_overrides_counts() {
        let pagination = Pagination {
            page: 1,
            total_pages: 5,
            has_next_page: Some(false),
            ..Default::default()
        };
        assert!(!pagination.has_more());
    }
}
