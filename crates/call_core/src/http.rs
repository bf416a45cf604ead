use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CallId, ContactId},
    error::ApiError,
    protocol::{
        BookingStatusRequest, BookingStatusResponse, DispatchRequest, DispatchResponse,
        PlaceDetailsResponse,
    },
};
use tracing::{debug, info};
use url::Url;

use crate::{ApiCallError, BookingStatusApi, CallDispatcher, PhoneResolver};

const INITIATE_CALL_PATH: &str = "api/assistant-initiate-call";
const BOOKING_STATUS_PATH: &str = "api/appointment-booked-status";
const NOTIFICATIONS_PATH: &str = "ws/notifications";
const PLACE_DETAILS_PATH: &str = "maps/api/place/details/json";
const PLACE_DETAILS_FIELDS: &str = "name,formatted_phone_number";

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn normalize_base(raw: &str) -> Result<Url, ApiCallError> {
    let mut base = Url::parse(raw.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Maps an http(s) API base to the notifications socket, e.g.
/// `https://host/` to `wss://host/ws/notifications`.
pub fn notifications_url(api_base: &str) -> Result<String, ApiCallError> {
    let base = normalize_base(api_base)?;
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ApiCallError::Rejected(format!(
                "api base url must start with http:// or https://, got {other}://"
            )))
        }
    };
    let mut url = base.join(NOTIFICATIONS_PATH)?;
    url.set_scheme(scheme)
        .map_err(|_| ApiCallError::Rejected(format!("cannot use {scheme} for {base}")))?;
    Ok(url.to_string())
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, ApiCallError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiError>(&body)
            .ok()
            .and_then(|err| err.message())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(ApiCallError::Status {
            status: status.as_u16(),
            detail,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ApiCallError::Decode(err.to_string()))
}

/// Client for the calling backend: dispatch and booking status.
#[derive(Debug, Clone)]
pub struct CallApiClient {
    http: Client,
    base_url: Url,
}

impl CallApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiCallError> {
        Ok(Self {
            http: Client::new(),
            base_url: normalize_base(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl CallDispatcher for CallApiClient {
    async fn dispatch_call(&self, request: &DispatchRequest) -> Result<CallId, ApiCallError> {
        let url = self.base_url.join(INITIATE_CALL_PATH)?;
        debug!(url = %url, name_of_org = %request.name_of_org, "initiating call");
        let response = self.http.post(url).json(request).send().await?;
        let body: DispatchResponse = decode_response(response).await?;
        info!(call_id = %body.call_id, "call initiated");
        Ok(body.call_id)
    }
}

#[async_trait]
impl BookingStatusApi for CallApiClient {
    async fn fetch_booking_status(
        &self,
        call_id: &CallId,
    ) -> Result<BookingStatusResponse, ApiCallError> {
        let url = self.base_url.join(BOOKING_STATUS_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&BookingStatusRequest {
                call_id: call_id.clone(),
            })
            .send()
            .await?;
        decode_response(response).await
    }
}

/// Google Places details lookup for a contact's phone number.
#[derive(Debug, Clone)]
pub struct PlacesClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl PlacesClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ApiCallError> {
        Ok(Self {
            http: Client::new(),
            base_url: normalize_base(base_url)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PhoneResolver for PlacesClient {
    async fn resolve_phone_number(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<String>, ApiCallError> {
        let mut url = self.base_url.join(PLACE_DETAILS_PATH)?;
        url.query_pairs_mut()
            .append_pair("fields", PLACE_DETAILS_FIELDS)
            .append_pair("key", &self.api_key)
            .append_pair("place_id", contact_id.as_str());

        let response = self.http.get(url).send().await?;
        let body: PlaceDetailsResponse = decode_response(response).await?;
        if let Some(status) = body.status.as_deref() {
            if status != "OK" {
                return Err(ApiCallError::Rejected(status.to_string()));
            }
        }
        Ok(body
            .result
            .and_then(|details| details.formatted_phone_number)
            .filter(|number| !number.trim().is_empty()))
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
