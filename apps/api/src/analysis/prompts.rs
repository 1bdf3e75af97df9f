// Prompt constants for resume analysis.
// System prompts are shared from llm_client::prompts.

/// Name under which the analysis schema is registered with the model.
pub const ANALYSIS_SCHEMA_NAME: &str = "ResumeAnalysis";

/// Analysis prompt template. Replace `{resume_text}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are an expert HR professional and resume screener. Analyze the following resume text and provide a comprehensive evaluation in JSON format.

IMPORTANT: Provide all analysis content in English.

RESUME TEXT:
{resume_text}

Return strictly valid JSON:

{
  "candidateName": "...",
  "overallScore": 85,
  "scores": { "technical": 80, "experience": 85, "communication": 90, "cultureFit": 80 },
  "summary": "2–3 sentence profile",
  "strengths": ["..."],
  "weaknesses": ["..."],
  "recommendations": ["..."],
  "skills": ["..."],
  "experience": { "years": 5, "positions": ["..."], "companies": ["..."] },
  "education": [{ "degree": "...", "institution": "...", "year": "2019" }],
  "keyHighlights": ["..."],
  "redFlags": ["..."]
}"#;

pub fn build_analysis_prompt(resume_text: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE.replace("{resume_text}", resume_text)
}
