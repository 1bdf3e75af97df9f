// Shared system prompts for the analysis model calls.
// The user-facing prompt template lives next to the analysis code.

/// System prompt used by the structured-output strategies (tool call, JSON schema).
pub const SCREENER_SYSTEM: &str = "You are an expert HR professional and resume screener.";

/// System prompt for the plain-text strategy, which has no schema enforcement.
pub const SCREENER_JSON_ONLY_SYSTEM: &str = "You are an expert HR professional and resume screener. \
    Respond with ONLY valid JSON that matches the requested shape. \
    Do not include any prose outside JSON.";
