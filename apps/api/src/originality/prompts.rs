// Originality judge prompt templates.

/// Judge prompt. Replace `{snippet}` and `{matches}` before sending.
pub const JUDGE_PROMPT_TEMPLATE: &str = r#"You are a code originality analyst.

Candidate code snippet:
"""{snippet}"""

Top matches from a public code search, with textual similarity (0.0 - 1.0):
{matches}

Decide whether the candidate snippet was copied from one of the matches.

Return a JSON object with this EXACT schema:
{
  "verdict": "Copied" | "Possibly Copied" | "No Match",
  "confidence": 0.0,
  "top_evidence": [{"url": "string", "similarity": 0.0}],
  "reasoning": "short explanation"
}

RULES:
1. confidence and similarity are numbers between 0.0 and 1.0
2. top_evidence only lists URLs from the matches above
3. Return ONLY the JSON object, nothing else, no code fences."#;
