//! End-to-end resume analysis workflow.
//!
//! Flow: validate → upload resume → rasterize first page → upload the
//! preview → persist record (empty feedback) → request AI feedback →
//! parse → overwrite record with feedback.
//!
//! Steps are strictly sequential; each one's output feeds the next.
//! A step whose delegated call returns an unusable result aborts with a
//! fixed per-step status; a step that fails outright propagates to the
//! outer boundary, which embeds the message into the terminal status.
//! The record persisted at the halfway point deliberately stays in
//! place with empty feedback when a later step fails; see DESIGN.md.

pub mod prompts;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::capability::FileLike;
use crate::models::feedback::{parse_feedback, FeedbackParseError};
use crate::models::record::ResumeRecord;
use crate::ops::{OpError, RemoteOps};
use crate::rasterize::{PdfiumRasterizer, Rasterizer};
use self::prompts::feedback_instructions;

/// User-supplied inputs for one analysis run.
#[derive(Clone)]
pub struct AnalyzeParams {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub file: Option<Arc<dyn FileLike>>,
}

/// Checked in a fixed order; the first missing input wins and no later
/// check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("company name is required")]
    MissingCompanyName,

    #[error("job title is required")]
    MissingJobTitle,

    #[error("job description is required")]
    MissingJobDescription,

    #[error("a resume file is required")]
    MissingFile,
}

/// Steps that abort on an unusable (but not failed) delegated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    UploadResume,
    ConvertToImage,
    UploadImage,
    Analyze,
}

impl PipelineStep {
    pub fn failure_message(self) -> &'static str {
        match self {
            PipelineStep::UploadResume => "Failed to upload file",
            PipelineStep::ConvertToImage => "Failed to convert PDF to image",
            PipelineStep::UploadImage => "Failed to upload image",
            PipelineStep::Analyze => "Failed to analyze resume",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("an analysis is already in progress")]
    Busy,

    #[error("{}", .0.failure_message())]
    Step(PipelineStep),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Feedback(#[from] FeedbackParseError),

    #[error("AI response contained no feedback text")]
    EmptyFeedback,

    #[error("failed to serialize record: {0}")]
    Record(#[from] serde_json::Error),
}

pub struct AnalysisPipeline {
    ops: Arc<RemoteOps>,
    rasterizer: Arc<dyn Rasterizer>,
    status_tx: watch::Sender<String>,
    // Keeps the channel open so updates land even before anyone observes.
    status_rx: watch::Receiver<String>,
    in_progress: AtomicBool,
}

impl AnalysisPipeline {
    pub fn new(ops: Arc<RemoteOps>) -> Self {
        Self::with_rasterizer(ops, Arc::new(PdfiumRasterizer))
    }

    pub fn with_rasterizer(ops: Arc<RemoteOps>, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let (status_tx, status_rx) = watch::channel(String::new());
        Self {
            ops,
            rasterizer,
            status_tx,
            status_rx,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Observer handle for status transitions.
    pub fn status(&self) -> watch::Receiver<String> {
        self.status_rx.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn update(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        let _ = self.status_tx.send(text);
    }

    fn validate(params: &AnalyzeParams) -> Result<(), ValidationError> {
        if params.company_name.trim().is_empty() {
            return Err(ValidationError::MissingCompanyName);
        }
        if params.job_title.trim().is_empty() {
            return Err(ValidationError::MissingJobTitle);
        }
        if params.job_description.trim().is_empty() {
            return Err(ValidationError::MissingJobDescription);
        }
        if params.file.is_none() {
            return Err(ValidationError::MissingFile);
        }
        Ok(())
    }

    /// Runs the full workflow. Validation failures surface before any
    /// status update or delegated call. Every later failure — explicit
    /// step abort or propagated error — becomes a terminal `Error: …`
    /// status, and the in-progress flag clears on every exit path.
    pub async fn run(&self, params: AnalyzeParams) -> Result<Uuid, PipelineError> {
        Self::validate(&params)?;
        let _guard =
            InProgressGuard::acquire(&self.in_progress).ok_or(PipelineError::Busy)?;

        let result = self.run_inner(&params).await;
        match &result {
            Ok(id) => {
                self.update("Analysis complete");
                info!("stored analysis {id}");
            }
            Err(e) => self.update(format!("Error: {e}")),
        }
        result
    }

    async fn run_inner(&self, params: &AnalyzeParams) -> Result<Uuid, PipelineError> {
        // Unreachable after validate; kept total rather than unwrapped.
        let file = params.file.clone().ok_or(ValidationError::MissingFile)?;

        // Step 1: upload the original resume.
        self.update("Uploading the file...");
        let Some(resume_fd) = self.ops.fs_upload(vec![file.clone()]).await? else {
            return Err(PipelineError::Step(PipelineStep::UploadResume));
        };

        // Step 2: rasterize the first page.
        self.update("Converting to image...");
        let conversion = self.rasterizer.rasterize(file.as_ref()).await;
        let Some(image_file) = conversion.file else {
            return Err(PipelineError::Step(PipelineStep::ConvertToImage));
        };

        // Step 3: upload the preview image.
        self.update("Uploading the image...");
        let image: Arc<dyn FileLike> = Arc::new(image_file);
        let Some(image_fd) = self.ops.fs_upload(vec![image]).await? else {
            return Err(PipelineError::Step(PipelineStep::UploadImage));
        };

        // Step 4: persist the record with empty feedback.
        self.update("Preparing data...");
        let id = Uuid::new_v4();
        let mut record = ResumeRecord {
            id,
            resume_path: resume_fd.path.clone(),
            image_path: image_fd.path,
            company_name: params.company_name.clone(),
            job_title: params.job_title.clone(),
            job_description: params.job_description.clone(),
            feedback: None,
            created_at: Utc::now(),
        };
        let key = ResumeRecord::kv_key(id);
        self.ops.kv_set(&key, &serde_json::to_string(&record)?).await?;

        // Step 5: request feedback for the stored resume.
        self.update("Analyzing...");
        let instructions = feedback_instructions(&params.job_title, &params.job_description);
        let Some(response) = self.ops.ai_feedback(&resume_fd.path, &instructions).await? else {
            return Err(PipelineError::Step(PipelineStep::Analyze));
        };

        // Step 6: parse. Invalid JSON propagates to the outer handler;
        // the step-4 record keeps its empty feedback.
        let text = response.text().ok_or(PipelineError::EmptyFeedback)?;
        let feedback = parse_feedback(text)?;

        // Step 7: overwrite with the analyzed record.
        record.feedback = Some(feedback);
        self.ops.kv_set(&key, &serde_json::to_string(&record)?).await?;

        Ok(id)
    }
}

/// Clears the in-progress flag on drop, whatever the exit path.
struct InProgressGuard<'a>(&'a AtomicBool);

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self(flag))
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
