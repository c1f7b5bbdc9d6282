//! User story refinement engine.
//!
//! This crate provides:
//! - Similarity retrieval over a corpus of already-judged stories
//! - A TTL/LRU cache in front of retrieval and the LLM judge
//! - A per-user conversation state machine with navigation history
//! - Export of analyses as text or CSV
//!
//! # Quick Start
//!
//! ```ignore
//! use invest_core::{BotConfig, ClaudeJudge, Input, MemoryStore, StoryBot};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bot = StoryBot::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(ClaudeJudge::from_env()?),
//!         BotConfig::from_env()?,
//!     );
//!
//!     let reply = bot
//!         .handle(&"user-1".into(), Input::from("Как клиент, я хочу видеть баланс, чтобы планировать расходы"))
//!         .await;
//!     println!("{}", reply.screen().map(|s| s.text.as_str()).unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod cache;
pub mod config;
pub mod export;
pub mod judge;
pub mod maintenance;
pub mod menu;
pub mod normalize;
pub mod prompts;
pub mod retrieval;
pub mod session;
pub mod session_store;
pub mod similarity;
pub mod store;
pub mod testing;
pub mod validate;

// Primary public API
pub use bot::{BotError, Input, Reply, StateError, StatsSnapshot, StoryBot};
pub use config::{BotConfig, ConfigError, Thresholds};
pub use export::{ExportFile, ExportFormat};
pub use judge::{ClaudeJudge, Judge, JudgeError};
pub use maintenance::spawn_maintenance;
pub use menu::{Action, Menu, MenuItem, Screen};
pub use retrieval::{RetrievalConfig, RetrievalEngine, SimilarMatch, SimilarQuery};
pub use session::{BotState, SessionId};
pub use store::{ExampleId, MemoryStore, NewExample, SqliteStore, Store, StoreError};
pub use testing::{MockJudge, MockReply, TestHarness};
