// Prompt constants for the feedback request. The instruction travels as
// the text part of the chat message, next to the stored-file reference.

/// Expected JSON shape of the feedback payload. Kept in sync with
/// `models::feedback::Feedback`.
pub const FEEDBACK_FORMAT: &str = r#"{
  "overallScore": 0,
  "ATS": {
    "score": 0,
    "tips": [{"type": "good" | "improve", "tip": "short headline"}]
  },
  "toneAndStyle": {
    "score": 0,
    "tips": [{"type": "good" | "improve", "tip": "short headline", "explanation": "detailed rationale"}]
  },
  "content": {
    "score": 0,
    "tips": [{"type": "good" | "improve", "tip": "short headline", "explanation": "detailed rationale"}]
  },
  "structure": {
    "score": 0,
    "tips": [{"type": "good" | "improve", "tip": "short headline", "explanation": "detailed rationale"}]
  },
  "skills": {
    "score": 0,
    "tips": [{"type": "good" | "improve", "tip": "short headline", "explanation": "detailed rationale"}]
  }
}"#;

/// Instruction template. Replace `{job_title}`, `{job_description}` and
/// `{feedback_format}` before sending.
pub const FEEDBACK_INSTRUCTION_TEMPLATE: &str = r#"You are an expert in ATS (Applicant Tracking Systems) and resume analysis.
Analyze and rate the attached resume and suggest how to improve it.
The rating can be low if the resume is bad.
Be thorough and detailed; do not hesitate to point out mistakes or give low scores when deserved.
Every score must be an integer between 0 and 100.
Take the job description into account.
The job title is: {job_title}
The job description is: {job_description}
Provide the feedback using the following format:
{feedback_format}
Return the analysis as a JSON object, without any other text and without backticks.
Do not include any other text or comments."#;

/// Builds the instruction string for one job context.
pub fn feedback_instructions(job_title: &str, job_description: &str) -> String {
    FEEDBACK_INSTRUCTION_TEMPLATE
        .replace("{job_title}", job_title)
        .replace("{job_description}", job_description)
        .replace("{feedback_format}", FEEDBACK_FORMAT)
}
