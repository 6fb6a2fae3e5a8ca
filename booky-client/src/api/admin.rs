//! Admin dashboard endpoints.

use booky_core::{AdminLoan, AdminOverview, AdminUser, LoanFilter, LoanId, LoanStatus, Page};
use serde::Serialize;

use super::payload::{array_under, decode, decode_each, page_of, unwrap_data, RemoteLoan, RemoteOverview, RemoteUser};
use super::transport::RestClient;
use crate::error::ApiClientError;
use crate::session::Credentials;

#[derive(Debug, Serialize)]
struct LoanListParams {
    page: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<LoanStatus>,
}

#[derive(Debug, Serialize)]
struct UserListParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
    page: u32,
}

impl RestClient {
    pub async fn admin_overview(&self, creds: Option<&Credentials>) -> Result<AdminOverview, ApiClientError> {
        let body = self.get_json::<()>("/admin/overview", creds, None).await?;
        Ok(decode::<RemoteOverview>(unwrap_data(&body), "admin overview")?.into_overview())
    }

    /// Loans across all users. Overdue loans come from their own endpoint.
    pub async fn admin_loans(
        &self,
        creds: Option<&Credentials>,
        page: u32,
        limit: u32,
        filter: LoanFilter,
    ) -> Result<Page<AdminLoan>, ApiClientError> {
        let path = match filter {
            LoanFilter::Overdue => "/admin/loans/overdue",
            _ => "/admin/loans",
        };
        let params = LoanListParams {
            page,
            limit,
            status: filter.status_param(),
        };
        let body = self.get_json(path, creds, Some(&params)).await?;
        let data = unwrap_data(&body);
        let loans = decode_each(
            array_under(data, &["overdue", "loans", "items"]),
            "loan",
            RemoteLoan::into_admin_loan,
        );
        Ok(page_of(loans, data.get("pagination"), Some(page), Some(limit)))
    }

    pub async fn admin_users(
        &self,
        creds: Option<&Credentials>,
        q: Option<&str>,
        page: u32,
    ) -> Result<Page<AdminUser>, ApiClientError> {
        let params = UserListParams {
            q: q.map(str::trim).filter(|q| !q.is_empty()),
            page,
        };
        let body = self.get_json("/admin/users", creds, Some(&params)).await?;
        let data = unwrap_data(&body);
        let users = decode_each(
            array_under(data, &["items", "users"]),
            "user",
            RemoteUser::into_admin_user,
        );
        let pagination = data.get("pagination").or(Some(data));
        Ok(page_of(users, pagination, Some(page), None))
    }

    pub async fn admin_mark_returned(
        &self,
        creds: Option<&Credentials>,
        loan_id: LoanId,
    ) -> Result<(), ApiClientError> {
        self.patch_json(
            &format!("/admin/loans/{}", loan_id),
            creds,
            &serde_json::json!({ "status": LoanStatus::Returned }),
        )
        .await?;
        Ok(())
    }
}
