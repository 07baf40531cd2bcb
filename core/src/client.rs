//! Typed endpoints over the request pipeline.
//!
//! # Design
//! `CourierApi` borrows a `Pipeline` and exposes one method per endpoint.
//! Each method builds a `RequestDescriptor`, runs it through the pipeline
//! (so token refresh applies uniformly) and decodes the envelope. Session
//! bookkeeping that the sign-in and sign-out flows own lives here too.

use serde_json::json;

use crate::descriptor::{query_string, QueryValue, RequestDescriptor};
use crate::error::ApiError;
use crate::http::Transport;
use crate::pipeline::Pipeline;
use crate::storage::{CredentialProvider, SessionKey};
use crate::types::{
    Account, Contact, ContactList, NewContact, Package, PackageQuery, Page, SendOtpRequest,
    SendOtpResponse, SignInRequest, SignInResponse,
};

pub struct CourierApi<'p, T, C> {
    pipeline: &'p Pipeline<T, C>,
}

impl<'p, T: Transport, C: CredentialProvider> CourierApi<'p, T, C> {
    pub fn new(pipeline: &'p Pipeline<T, C>) -> Self {
        Self { pipeline }
    }

    pub fn send_otp(&self, phone_number: &str) -> Result<SendOtpResponse, ApiError> {
        let descriptor = RequestDescriptor::post("/otp").json(&SendOtpRequest {
            phone_number: phone_number.to_string(),
        })?;
        self.pipeline.call(&descriptor).decode()
    }

    /// Exchange a verification code for a session and persist it.
    pub fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse, ApiError> {
        let descriptor = RequestDescriptor::post("/sign-in").json(request)?;
        let response: SignInResponse = self.pipeline.call(&descriptor).decode()?;

        if let Err(e) = self
            .pipeline
            .credentials()
            .store_session(&response.access_token, &response.user_id)
        {
            tracing::warn!(error = %e, "failed to persist session after sign-in");
        }
        tracing::info!(
            user_id = %response.user_id,
            accounts = response.accounts.len(),
            "signed in"
        );
        Ok(response)
    }

    /// Remember which customer/agent the user is acting as.
    pub fn select_account(&self, account: &Account) {
        let credentials = self.pipeline.credentials();
        let stored = credentials
            .set(SessionKey::CustomerId, &account.customer_id)
            .and_then(|_| credentials.set(SessionKey::AgentId, &account.agent_id));
        if let Err(e) = stored {
            tracing::warn!(error = %e, "failed to persist selected account");
        }
    }

    /// End the session on the server, then forget it locally.
    ///
    /// Without a stored user id there is nothing to revoke and only local
    /// state is cleared. A server-side failure leaves local state intact.
    pub fn sign_out(&self) -> Result<(), ApiError> {
        let credentials = self.pipeline.credentials();
        let user_id = credentials.user_id().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "credential read failed");
            None
        });

        if let Some(user_id) = user_id {
            let path = self.pipeline.config().sign_out_path.as_str();
            let descriptor = RequestDescriptor::post(path).data(json!({ "userId": user_id }));
            self.pipeline.call(&descriptor).into_result()?;
        }

        if let Err(e) = credentials.clear() {
            tracing::warn!(error = %e, "failed to clear session after sign-out");
        }
        tracing::info!("signed out");
        Ok(())
    }

    pub fn list_packages(
        &self,
        customer_id: &str,
        query: &PackageQuery,
    ) -> Result<Page<Package>, ApiError> {
        let statuses = (!query.statuses.is_empty()).then(|| {
            QueryValue::from(
                query
                    .statuses
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect::<Vec<_>>(),
            )
        });
        let qs = query_string([
            ("status", statuses),
            ("page", query.page.map(QueryValue::from)),
            ("size", query.size.map(QueryValue::from)),
            ("branchId", query.branch_id.clone().map(QueryValue::from)),
        ]);
        self.pipeline
            .request(with_query(format!("/customers/{customer_id}/packages"), &qs))
            .decode()
    }

    pub fn list_contacts(
        &self,
        customer_id: &str,
        is_default: Option<bool>,
    ) -> Result<ContactList, ApiError> {
        let qs = query_string([("isDefault", is_default.map(QueryValue::from))]);
        self.pipeline
            .request(with_query(format!("/customers/{customer_id}/contacts"), &qs))
            .decode()
    }

    pub fn create_contact(&self, contact: &NewContact) -> Result<Contact, ApiError> {
        let url = format!("/customers/{}/contacts", contact.customer_id);
        let descriptor = RequestDescriptor::post(url).json(contact)?;
        self.pipeline.call(&descriptor).decode()
    }
}

fn with_query(path: String, qs: &str) -> String {
    if qs.is_empty() {
        path
    } else {
        format!("{path}?{qs}")
    }
}
