// Request boundary for resume screening.
// Multipart intake → text extraction → evaluation + originality pipeline.

pub mod evaluation;
pub mod extract;
pub mod handlers;
pub mod prompts;
