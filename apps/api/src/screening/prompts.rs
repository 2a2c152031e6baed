// Resume screening prompt templates.

/// Resume-vs-job-description evaluation. Replace `{job_description}` and `{resume}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Job Description:
{job_description}

Resume:
{resume}

Provide:
1) Suitability score out of 10
2) Key strengths
3) Missing skills/weaknesses
"#;
