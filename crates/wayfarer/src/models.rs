//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai chat completion messages/tools, sent from the agent to the LLM
//! - openai streaming chunks, sent from the LLM back to the agent
//! - toolkit requests, sent from the agent to the toolkits providing capabilities
//!
//! We always immediately convert those wire formats into the internal structs
//! using to/from helpers, so the agent loop only ever sees these types.
pub mod content;
pub mod conversation;
pub mod message;
pub mod role;
pub mod tool;
