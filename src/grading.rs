// Request plumbing shared by every endpoint.
use crate::connection::{build_client, read_json, send_http_request, CancelToken, HttpMethod};
use crate::credentials::{AssessmentCredentials, ClientConfig};
use crate::error::{GradingError, Result};

// Wire models of the grading API.
use crate::mapping::{ActivityRubricMapping, RubricImport, SetMappingRequest};
use crate::rubric::Rubric;
use crate::session::{GradingSession, ServiceHealth};
use crate::submission::{
    AssessmentSubmission, GradeRequest, NewSubmission, ReviewRequest, SubmissionStatus,
};

// Rubric files are uploaded as multipart forms.
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::path::Path;
use std::sync::Arc;

/// Operations offered by the grading API.
///
/// Every mutating operation returns the canonical entity the server stored, so callers
/// can replace their local copy with it instead of echoing their own input.
pub trait AssessmentApi {
    fn list_rubrics(&self, activity_id: Option<u64>) -> Result<Vec<Rubric>>;
    fn get_rubric(&self, id: u64) -> Result<Rubric>;
    fn create_rubric(&self, rubric: &Rubric) -> Result<Rubric>;
    fn update_rubric(&self, id: u64, rubric: &Rubric) -> Result<Rubric>;
    fn delete_rubric(&self, id: u64) -> Result<()>;

    fn list_submissions(
        &self,
        activity_id: Option<u64>,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<AssessmentSubmission>>;
    fn get_submission(&self, id: u64) -> Result<AssessmentSubmission>;
    fn create_submission(&self, submission: &NewSubmission) -> Result<AssessmentSubmission>;
    fn grade_submission(&self, id: u64, request: &GradeRequest) -> Result<AssessmentSubmission>;
    fn review_submission(&self, id: u64, request: &ReviewRequest)
        -> Result<AssessmentSubmission>;

    fn import_rubric(&self, file_name: &str, content: Vec<u8>, activity_code: &str)
        -> Result<RubricImport>;
    fn list_mappings(&self) -> Result<Vec<ActivityRubricMapping>>;
    fn set_mapping(&self, request: &SetMappingRequest) -> Result<ActivityRubricMapping>;

    /// Reports whether the AI grading service is configured. Needs no session.
    fn health_check(&self) -> Result<ServiceHealth>;
    /// Audit log of AI calls, newest first. The server returns at most 100 entries.
    fn list_grading_sessions(&self, activity_id: Option<u64>) -> Result<Vec<GradingSession>>;
}

/// HTTP client for the grading API.
///
/// Cloning is cheap: clones share the connection pool and credentials. A clone made with
/// [`GradingClient::with_cancel`] carries its own [`CancelToken`], which lets a page or
/// command abandon all of its requests at once.
///
/// Example:
/// ```no_run
/// use assessment_grading_connector::{AssessmentApi, AssessmentCredentials, ClientConfig, GradingClient};
///
/// let credentials = AssessmentCredentials::from_cookie_header(
///     "https://school.example.com/api/grading",
///     "csrftoken=abc; sessionid=xyz",
/// );
/// let client = GradingClient::new(credentials, ClientConfig::default()).unwrap();
/// let rubrics = client.list_rubrics(None).unwrap();
/// println!("{} rubrics", rubrics.len());
/// ```
#[derive(Clone)]
pub struct GradingClient {
    credentials: Arc<AssessmentCredentials>,
    client: Client,
    cancel: CancelToken,
}

impl GradingClient {
    pub fn new(credentials: AssessmentCredentials, config: ClientConfig) -> Result<Self> {
        if credentials.url_grading.trim().is_empty() {
            return Err(GradingError::Credentials(
                "The grading API URL is empty".to_string(),
            ));
        }
        Ok(GradingClient {
            credentials: Arc::new(credentials),
            client: build_client(&config)?,
            cancel: CancelToken::new(),
        })
    }

    /// Loads credentials from the environment, keyring or terminal and builds a client.
    pub fn from_stored_credentials(config: ClientConfig) -> Result<Self> {
        GradingClient::new(AssessmentCredentials::credentials()?, config)
    }

    /// A clone of this client whose requests are governed by `cancel`.
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        GradingClient {
            credentials: Arc::clone(&self.credentials),
            client: self.client.clone(),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn credentials(&self) -> &AssessmentCredentials {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.url_grading, path)
    }

    fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<reqwest::blocking::Response> {
        send_http_request(
            &self.client,
            method,
            &self.url(path),
            &self.credentials,
            params,
            &self.cancel,
        )
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<T> {
        read_json(self.send(HttpMethod::Get, path, params)?)
    }

    fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body).map_err(|e| GradingError::validation(e.to_string()))?;
        read_json(self.send(HttpMethod::Post(body), path, Vec::new())?)
    }

    /// Uploads a rubric file from disk and maps it to `activity_code`.
    ///
    /// Arguments:
    /// - `path`: JSON rubric file. Its file name becomes the upload's file name.
    /// - `activity_code`: Activity the imported rubric is mapped to, e.g. `013.03-c02`.
    ///
    /// Returns:
    /// - `Ok(RubricImport)`: The stored mapping and the title of the created rubric.
    /// - `Err(GradingError::Validation)` if the file cannot be read or the code is blank.
    pub fn import_rubric_file(&self, path: &Path, activity_code: &str) -> Result<RubricImport> {
        let file_name = path
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or_else(|| GradingError::validation("Invalid file name"))?;
        let content = std::fs::read(path).map_err(|e| {
            GradingError::validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        self.import_rubric(file_name, content, activity_code)
    }
}

// Activity 0 means "no filter" on the server, so it is never sent.
fn filter_params(activity_id: Option<u64>, status: Option<SubmissionStatus>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(activity_id) = activity_id.filter(|id| *id != 0) {
        params.push(("activity_id".to_string(), activity_id.to_string()));
    }
    if let Some(status) = status {
        params.push(("status".to_string(), status.as_str().to_string()));
    }
    params
}

impl AssessmentApi for GradingClient {
    fn list_rubrics(&self, activity_id: Option<u64>) -> Result<Vec<Rubric>> {
        self.get("/rubrics/", filter_params(activity_id, None))
    }

    fn get_rubric(&self, id: u64) -> Result<Rubric> {
        self.get(&format!("/rubrics/{}/", id), Vec::new())
    }

    fn create_rubric(&self, rubric: &Rubric) -> Result<Rubric> {
        self.post("/rubrics/", rubric)
    }

    fn update_rubric(&self, id: u64, rubric: &Rubric) -> Result<Rubric> {
        let body = serde_json::to_value(rubric).map_err(|e| GradingError::validation(e.to_string()))?;
        read_json(self.send(HttpMethod::Put(body), &format!("/rubrics/{}/", id), Vec::new())?)
    }

    fn delete_rubric(&self, id: u64) -> Result<()> {
        self.send(HttpMethod::Delete, &format!("/rubrics/{}/", id), Vec::new())?;
        Ok(())
    }

    fn list_submissions(
        &self,
        activity_id: Option<u64>,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<AssessmentSubmission>> {
        self.get("/submissions/", filter_params(activity_id, status))
    }

    fn get_submission(&self, id: u64) -> Result<AssessmentSubmission> {
        self.get(&format!("/submissions/{}/", id), Vec::new())
    }

    fn create_submission(&self, submission: &NewSubmission) -> Result<AssessmentSubmission> {
        self.post("/submissions/", submission)
    }

    fn grade_submission(&self, id: u64, request: &GradeRequest) -> Result<AssessmentSubmission> {
        self.post(&format!("/submissions/{}/grade/", id), request)
    }

    fn review_submission(
        &self,
        id: u64,
        request: &ReviewRequest,
    ) -> Result<AssessmentSubmission> {
        self.post(&format!("/submissions/{}/review/", id), request)
    }

    fn import_rubric(
        &self,
        file_name: &str,
        content: Vec<u8>,
        activity_code: &str,
    ) -> Result<RubricImport> {
        if activity_code.trim().is_empty() {
            return Err(GradingError::validation("Activity code is required"));
        }
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new()
            .part("file", part)
            .text("activity_code", activity_code.to_string());
        read_json(self.send(HttpMethod::Multipart(form), "/rubrics/import/", Vec::new())?)
    }

    fn list_mappings(&self) -> Result<Vec<ActivityRubricMapping>> {
        self.get("/rubrics/mappings/", Vec::new())
    }

    fn set_mapping(&self, request: &SetMappingRequest) -> Result<ActivityRubricMapping> {
        if request.activity_code.trim().is_empty() {
            return Err(GradingError::validation("Activity code is required"));
        }
        self.post("/rubrics/mappings/set/", request)
    }

    fn health_check(&self) -> Result<ServiceHealth> {
        let health: ServiceHealth = self.get("/health/", Vec::new())?;
        if !health.configured {
            log::warn!("Grading service at {} is not configured", self.credentials.url_grading);
        }
        Ok(health)
    }

    fn list_grading_sessions(&self, activity_id: Option<u64>) -> Result<Vec<GradingSession>> {
        self.get("/sessions/", filter_params(activity_id, None))
    }
}
