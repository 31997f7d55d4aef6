//! Everything outside chat and tickets: sign-in, the business catalog, the
//! problem/solution knowledge base, technicians, and uploads.
//!
//! A successful [`ServerApi::verify_code`] signs the shared [`HttpClient`]
//! in, so every facade built on the same client picks up the token.

use records::input::{
    BusinessPatch, EmployeePatch, EquipmentPatch, NewBusiness, NewEmployee, NewEquipment, NewProblem, NewReview,
    NewSolution, NewTechnician, RequestCode, SolutionPatch, TechnicianPatch, VerifyCode,
};
use records::{Business, Employee, Equipment, Problem, SignIn, Solution, Technician, TechnicianReview, Upload, User};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::error::ClientError;
use super::http::HttpClient;
use super::logged;

/// Filters for [`ServerApi::list_problems`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Serialize)]
struct BusinessQuery {
    business_id: Uuid,
}

#[derive(Serialize)]
struct SpecialtyQuery<'a> {
    specialty: &'a str,
}

#[derive(Serialize)]
struct KeyQuery<'a> {
    key: &'a str,
}

#[derive(Debug, Clone)]
pub struct ServerApi {
    http: HttpClient,
}

impl ServerApi {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let result = self.http.send_empty(self.http.request(Method::GET, "/healthz")).await;
        logged("health", result)
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Ask the server to email a one-time access code.
    pub async fn request_code(&self, email: &str) -> Result<(), ClientError> {
        let body = RequestCode { email: email.trim().to_owned() };
        let result = self
            .http
            .send_empty(self.http.request(Method::POST, "/api/auth/email/request-code").json(&body))
            .await;
        logged("request_code", result)
    }

    /// Exchange an access code for a session token and sign in.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<SignIn, ClientError> {
        let body = VerifyCode { email: email.trim().to_owned(), code: code.trim().to_owned() };
        let signed: SignIn = logged("verify_code", self.http.post("/api/auth/email/verify-code", &body).await)?;
        self.http.sign_in(signed.token.clone());
        info!(user_id = %signed.user.id, "signed in");
        Ok(signed)
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        logged("me", self.http.get("/api/auth/me").await)
    }

    /// Revoke the token server-side and forget it locally.
    ///
    /// The local token is dropped even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.http.send_empty(self.http.request(Method::POST, "/api/auth/logout")).await;
        self.http.sign_out();
        logged("logout", result)
    }

    // =========================================================================
    // BUSINESSES & EMPLOYEES
    // =========================================================================

    pub async fn list_businesses(&self) -> Result<Vec<Business>, ClientError> {
        logged("list_businesses", self.http.get("/api/businesses").await)
    }

    pub async fn get_business(&self, id: Uuid) -> Result<Business, ClientError> {
        logged("get_business", self.http.get(&format!("/api/businesses/{id}")).await)
    }

    pub async fn create_business(&self, input: &NewBusiness) -> Result<Business, ClientError> {
        logged("create_business", self.http.post("/api/businesses", input).await)
    }

    pub async fn update_business(&self, id: Uuid, patch: &BusinessPatch) -> Result<Business, ClientError> {
        logged("update_business", self.http.patch(&format!("/api/businesses/{id}"), patch).await)
    }

    pub async fn delete_business(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_business", self.http.delete(&format!("/api/businesses/{id}")).await)
    }

    pub async fn list_employees(&self, business_id: Uuid) -> Result<Vec<Employee>, ClientError> {
        logged("list_employees", self.http.get(&format!("/api/businesses/{business_id}/employees")).await)
    }

    pub async fn add_employee(&self, business_id: Uuid, input: &NewEmployee) -> Result<Employee, ClientError> {
        logged(
            "add_employee",
            self.http.post(&format!("/api/businesses/{business_id}/employees"), input).await,
        )
    }

    pub async fn update_employee(&self, id: Uuid, patch: &EmployeePatch) -> Result<Employee, ClientError> {
        logged("update_employee", self.http.patch(&format!("/api/employees/{id}"), patch).await)
    }

    pub async fn delete_employee(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_employee", self.http.delete(&format!("/api/employees/{id}")).await)
    }

    // =========================================================================
    // EQUIPMENT
    // =========================================================================

    pub async fn list_equipment(&self, business_id: Option<Uuid>) -> Result<Vec<Equipment>, ClientError> {
        let result = match business_id {
            Some(business_id) => self.http.get_query("/api/equipment", &BusinessQuery { business_id }).await,
            None => self.http.get("/api/equipment").await,
        };
        logged("list_equipment", result)
    }

    pub async fn get_equipment(&self, id: Uuid) -> Result<Equipment, ClientError> {
        logged("get_equipment", self.http.get(&format!("/api/equipment/{id}")).await)
    }

    pub async fn create_equipment(&self, input: &NewEquipment) -> Result<Equipment, ClientError> {
        logged("create_equipment", self.http.post("/api/equipment", input).await)
    }

    pub async fn update_equipment(&self, id: Uuid, patch: &EquipmentPatch) -> Result<Equipment, ClientError> {
        logged("update_equipment", self.http.patch(&format!("/api/equipment/{id}"), patch).await)
    }

    pub async fn delete_equipment(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_equipment", self.http.delete(&format!("/api/equipment/{id}")).await)
    }

    // =========================================================================
    // PROBLEMS & SOLUTIONS
    // =========================================================================

    pub async fn list_problems(&self, query: &ProblemQuery) -> Result<Vec<Problem>, ClientError> {
        logged("list_problems", self.http.get_query("/api/problems", query).await)
    }

    pub async fn get_problem(&self, id: Uuid) -> Result<Problem, ClientError> {
        logged("get_problem", self.http.get(&format!("/api/problems/{id}")).await)
    }

    pub async fn create_problem(&self, input: &NewProblem) -> Result<Problem, ClientError> {
        logged("create_problem", self.http.post("/api/problems", input).await)
    }

    pub async fn delete_problem(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_problem", self.http.delete(&format!("/api/problems/{id}")).await)
    }

    pub async fn list_solutions(&self, problem_id: Uuid) -> Result<Vec<Solution>, ClientError> {
        logged("list_solutions", self.http.get(&format!("/api/problems/{problem_id}/solutions")).await)
    }

    pub async fn add_solution(&self, problem_id: Uuid, input: &NewSolution) -> Result<Solution, ClientError> {
        logged(
            "add_solution",
            self.http.post(&format!("/api/problems/{problem_id}/solutions"), input).await,
        )
    }

    pub async fn update_solution(&self, id: Uuid, patch: &SolutionPatch) -> Result<Solution, ClientError> {
        logged("update_solution", self.http.patch(&format!("/api/solutions/{id}"), patch).await)
    }

    pub async fn delete_solution(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_solution", self.http.delete(&format!("/api/solutions/{id}")).await)
    }

    // =========================================================================
    // TECHNICIANS
    // =========================================================================

    pub async fn list_technicians(&self, specialty: Option<&str>) -> Result<Vec<Technician>, ClientError> {
        let result = match specialty {
            Some(specialty) => self.http.get_query("/api/technicians", &SpecialtyQuery { specialty }).await,
            None => self.http.get("/api/technicians").await,
        };
        logged("list_technicians", result)
    }

    pub async fn get_technician(&self, id: Uuid) -> Result<Technician, ClientError> {
        logged("get_technician", self.http.get(&format!("/api/technicians/{id}")).await)
    }

    pub async fn create_technician(&self, input: &NewTechnician) -> Result<Technician, ClientError> {
        logged("create_technician", self.http.post("/api/technicians", input).await)
    }

    pub async fn update_technician(&self, id: Uuid, patch: &TechnicianPatch) -> Result<Technician, ClientError> {
        logged("update_technician", self.http.patch(&format!("/api/technicians/{id}"), patch).await)
    }

    pub async fn delete_technician(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_technician", self.http.delete(&format!("/api/technicians/{id}")).await)
    }

    pub async fn list_reviews(&self, technician_id: Uuid) -> Result<Vec<TechnicianReview>, ClientError> {
        logged("list_reviews", self.http.get(&format!("/api/technicians/{technician_id}/reviews")).await)
    }

    pub async fn add_review(&self, technician_id: Uuid, input: &NewReview) -> Result<TechnicianReview, ClientError> {
        logged(
            "add_review",
            self.http.post(&format!("/api/technicians/{technician_id}/reviews"), input).await,
        )
    }

    // =========================================================================
    // UPLOADS
    // =========================================================================

    /// Upload one file as `multipart/form-data`.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
        folder: Option<&str>,
    ) -> Result<Upload, ClientError> {
        let part = Part::bytes(bytes).file_name(file_name.to_owned()).mime_str(content_type);
        let part = logged("upload", part.map_err(ClientError::from))?;
        let mut form = Form::new().part("file", part);
        if let Some(folder) = folder {
            form = form.text("folder", folder.to_owned());
        }
        logged("upload", self.http.post_multipart("/api/uploads", form).await)
    }

    pub async fn download_url(&self, key: &str) -> Result<Upload, ClientError> {
        logged("download_url", self.http.get_query("/api/uploads/url", &KeyQuery { key }).await)
    }

    pub async fn delete_upload(&self, key: &str) -> Result<(), ClientError> {
        let request = self.http.request(Method::DELETE, "/api/uploads").query(&KeyQuery { key });
        logged("delete_upload", self.http.send_empty(request).await)
    }
}

#[cfg(test)]
#[path = "server_api_test.rs"]
mod tests;
