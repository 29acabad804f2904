// Cross-cutting prompt fragments. Feature prompts live next to the feature
// (see ai/prompts.rs) and build on these.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that writes resume text on the user's behalf.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the provided resume and context. \
    Do NOT invent employers, titles, dates, certifications or numbers. \
    Where a metric would help but none is given, write the bullet so the user \
    can fill it in, using a placeholder such as [X%].";
