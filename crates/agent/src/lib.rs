//! Decision pipeline for single-turn order support requests.
//!
//! One request flows through a fixed sequence of gated stages:
//! 1. **Sentiment gate** (`sentiment`) - frustrated users short-circuit
//!    into an escalation reply before any tool is considered
//! 2. **Intent routing** (`router`) - NL → `track` / `cancel` / `none`
//! 3. **Policy check** (`zenbot_core::policy`) - cancellation eligibility
//! 4. **Tool invocation** (`tools`) - order tracking / cancellation API
//! 5. **Response synthesis** (`synthesizer`) - final natural-language reply
//!
//! Two engines implement the routing and synthesis seams: a generative
//! one backed by an OpenAI-compatible LLM server (`llm`) and a
//! deterministic keyword/template baseline. The generative components
//! are always wrapped in fallback decorators around their deterministic
//! counterparts, so an unreachable LLM backend degrades silently
//! instead of surfacing to the user.
//!
//! # Safety Principle
//!
//! The LLM picks tools and phrases replies. It NEVER decides policy
//! outcomes: cancellation eligibility is a pure deterministic function
//! in the core crate, and the grounding prompt states denials
//! explicitly so the model cannot contradict them.

pub mod llm;
pub mod pipeline;
pub mod router;
pub mod sentiment;
pub mod synthesizer;
pub mod tools;

pub use pipeline::{build_engine, EngineComponents, Pipeline};
